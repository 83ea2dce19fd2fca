use std::sync::Arc;

use crate::app::traits::{ClockSource, CredentialStore, EventSink, InMemorySessionScratch, OsRandom, RandomSource, SessionScratch, SystemClock};
use crate::bulk::BulkOperationEngine;
use crate::concurrency::UserLockRegistry;
use crate::config::{Config, ConfigManager};
use crate::database::DbPool;
use crate::lifecycle::{DeletionRequestService, TemplateLifecycleManager};
use crate::liveness::LivenessEngine;
use crate::rpc::BwsClient;
use crate::workflows::{EnrollmentWorkflow, VerificationWorkflow};

/// Composition root (SPEC_FULL.md §9 design note): one `Core` per process,
/// holding every long-lived component the public operations are built from.
/// Host applications construct a `Core` once at startup via `Core::new` and
/// call into the workflows/lifecycle/bulk surfaces it exposes.
pub struct Core {
    pub config: Arc<ConfigManager>,
    pub bws: Arc<BwsClient>,
    pub enrollment: Arc<EnrollmentWorkflow>,
    pub verification: Arc<VerificationWorkflow>,
    pub liveness: Arc<LivenessEngine>,
    pub lifecycle: Arc<TemplateLifecycleManager>,
    pub deletion_requests: Arc<DeletionRequestService>,
    pub bulk: Arc<BulkOperationEngine>,
}

/// Host-supplied dependencies the core never implements itself (spec §6.1).
pub struct CoreDependencies {
    pub credential_store: Arc<dyn CredentialStore>,
    pub event_sink: Arc<dyn EventSink>,
    pub session_scratch: Option<Arc<dyn SessionScratch>>,
    pub clock: Option<Arc<dyn ClockSource>>,
    pub random: Option<Arc<dyn RandomSource>>,
}

impl Core {
    pub fn new(config: Config, pool: DbPool, deps: CoreDependencies) -> anyhow::Result<Self> {
        let clock: Arc<dyn ClockSource> = deps.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let random: Arc<dyn RandomSource> = deps.random.unwrap_or_else(|| Arc::new(OsRandom::new()));
        let scratch: Arc<dyn SessionScratch> = deps.session_scratch.unwrap_or_else(|| Arc::new(InMemorySessionScratch::new()));

        let locks = Arc::new(UserLockRegistry::new());
        let bws = Arc::new(BwsClient::new(config.bws.clone(), random.clone()));

        let liveness = Arc::new(LivenessEngine::new(
            config.liveness.clone(),
            bws.clone(),
            scratch,
            random.clone(),
            clock.clone(),
        ));

        let enrollment = Arc::new(EnrollmentWorkflow::new(
            config.verification.clone(),
            config.template.default_ttl,
            bws.clone(),
            deps.credential_store.clone(),
            deps.event_sink.clone(),
            locks.clone(),
            clock.clone(),
        ));

        let verification = Arc::new(VerificationWorkflow::new(
            config.verification.clone(),
            bws.clone(),
            deps.credential_store.clone(),
            deps.event_sink.clone(),
            liveness.clone(),
            locks.clone(),
            clock.clone(),
        ));

        let lifecycle = Arc::new(TemplateLifecycleManager::new(
            config.template.clone(),
            bws.clone(),
            deps.credential_store.clone(),
            deps.event_sink.clone(),
            clock.clone(),
        ));

        let deletion_requests = Arc::new(DeletionRequestService::new(
            pool.clone(),
            bws.clone(),
            deps.credential_store.clone(),
            deps.event_sink.clone(),
        ));

        let bulk = Arc::new(BulkOperationEngine::new(config.bulk.clone(), pool));

        let config_manager = Arc::new(ConfigManager::new(config)?);

        Ok(Core {
            config: config_manager,
            bws,
            enrollment,
            verification,
            liveness,
            lifecycle,
            deletion_requests,
            bulk,
        })
    }

    /// Spawns the periodic regional health probe (spec §4.1.2 failover,
    /// `health_probe_interval`) on a background task. Grounded on the
    /// teacher's `spawn_stats_task` in `app/jobs/queue_worker.rs`: a detached
    /// `tokio::spawn` looping on `tokio::time::interval`. The caller owns the
    /// returned handle; dropping or aborting it stops probing.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let bws = self.bws.clone();
        let period = self.config.current().bws.health_probe_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                bws.probe_preferred_region().await;
            }
        })
    }
}
