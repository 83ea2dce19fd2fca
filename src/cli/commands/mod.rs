pub mod bulk;
pub mod config;
pub mod deletion;
pub mod template;

use std::sync::Arc;

use anyhow::Result;

use biometric_core::app::traits::{InMemoryCredentialStore, TracingEventSink};
use biometric_core::config::Config as CoreConfig;
use biometric_core::database;
use biometric_core::{Core, CoreDependencies};

/// Builds a `Core` for a single CLI invocation. The in-memory credential
/// store does not persist across process runs — a real deployment supplies
/// its own `CredentialStore`; `deletion-request` and `bulk` commands are
/// unaffected since those are backed by the database directly.
pub fn bootstrap() -> Result<Core> {
    let config = CoreConfig::load()?;
    let pool = database::create_pool(&config)?;
    database::run_migrations(&pool)?;

    let deps = CoreDependencies {
        credential_store: Arc::new(InMemoryCredentialStore::new()),
        event_sink: Arc::new(TracingEventSink),
        session_scratch: None,
        clock: None,
        random: None,
    };

    Core::new(config, pool, deps)
}
