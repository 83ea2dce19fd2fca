use anyhow::Result;
use dotenv::dotenv;
use std::env;
use std::path::Path;
use std::sync::{Arc, RwLock};

pub mod app;
pub mod bulk;
pub mod bws;
pub mod database;
pub mod liveness;
pub mod logging;
pub mod template;
pub mod verification;

pub use app::AppConfig;
pub use bulk::BulkConfig;
pub use bws::BwsConfig;
pub use database::DatabaseConfig;
pub use liveness::LivenessConfig;
pub use logging::LoggingConfig;
pub use template::TemplateConfig;
pub use verification::VerificationConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub bws: BwsConfig,
    pub verification: VerificationConfig,
    pub liveness: LivenessConfig,
    pub bulk: BulkConfig,
    pub template: TemplateConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_dotenv();

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            bws: BwsConfig::from_env()?,
            verification: VerificationConfig::from_env()?,
            liveness: LivenessConfig::from_env()?,
            bulk: BulkConfig::from_env()?,
            template: TemplateConfig::from_env()?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::load()
    }

    fn load_dotenv() {
        let env_file = match env::var("APP_ENV").unwrap_or_else(|_| "local".to_string()).as_str() {
            "production" => ".env.production",
            "staging" => ".env.staging",
            "testing" => ".env.testing",
            _ => ".env",
        };

        if Path::new(env_file).exists() {
            dotenv::from_filename(env_file).ok();
        } else {
            dotenv().ok();
        }
    }

    pub fn is_production(&self) -> bool {
        self.app.is_production()
    }

    pub fn is_development(&self) -> bool {
        self.app.is_development()
    }

    pub fn is_testing(&self) -> bool {
        self.app.is_testing()
    }

    /// Rejects an update that would leave required fields empty (spec §6.4
    /// "loaded once ... exposed as an immutable snapshot").
    fn validate(&self) -> Result<()> {
        if self.bws.primary_endpoint.trim().is_empty() {
            anyhow::bail!("bws.primary_endpoint must not be empty");
        }
        if self.bws.signing_key.trim().is_empty() {
            anyhow::bail!("bws.signing_key must not be empty");
        }
        if !(0.0..=1.0).contains(&self.verification.default_match_threshold) {
            anyhow::bail!("verification.default_match_threshold must be within [0, 1]");
        }
        Ok(())
    }
}

/// Holds the current config snapshot behind a `RwLock<Arc<Config>>` so readers
/// never block each other and never observe a partially-applied update
/// (spec §2 item 1, §6.4). No `arc-swap` dependency exists in the retrieval
/// pack, so this mirrors the teacher's preference for plain std primitives.
pub struct ConfigManager {
    inner: RwLock<Arc<Config>>,
}

impl ConfigManager {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(ConfigManager {
            inner: RwLock::new(Arc::new(config)),
        })
    }

    pub fn current(&self) -> Arc<Config> {
        self.inner
            .read()
            .expect("config lock poisoned")
            .clone()
    }

    pub fn propose_update(&self, next: Config) -> Result<()> {
        next.validate()?;
        let mut guard = self.inner.write().expect("config lock poisoned");
        *guard = Arc::new(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        std::env::set_var("BWS_PRIMARY_ENDPOINT", "https://bws.example.test");
        std::env::set_var("BWS_SIGNING_KEY", "test-signing-key");
        Config::load().expect("config should load from env defaults")
    }

    #[test]
    fn manager_exposes_initial_snapshot() {
        let manager = ConfigManager::new(sample_config()).unwrap();
        assert_eq!(manager.current().bws.primary_endpoint, "https://bws.example.test");
    }

    #[test]
    fn propose_update_rejects_invalid_threshold() {
        let manager = ConfigManager::new(sample_config()).unwrap();
        let mut next = (*manager.current()).clone();
        next.verification.default_match_threshold = 1.5;
        assert!(manager.propose_update(next).is_err());
        assert_eq!(manager.current().verification.default_match_threshold, 0.015);
    }

    #[test]
    fn propose_update_swaps_on_success() {
        let manager = ConfigManager::new(sample_config()).unwrap();
        let mut next = (*manager.current()).clone();
        next.verification.default_match_threshold = 0.9;
        manager.propose_update(next).unwrap();
        assert_eq!(manager.current().verification.default_match_threshold, 0.9);
    }
}
