use anyhow::Result;
use std::env;
use std::time::Duration;

/// Template lifecycle tunables (spec §4.5).
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    pub default_ttl: Duration,
    pub expiring_soon_window: Duration,
    pub current_encoder_version: String,
    pub cleanup_batch_size: usize,
    /// `templateCleanupIntervalHours` (spec §6.4, default 24): cadence at
    /// which a host should call `TemplateLifecycleManager::cleanup_expired`
    /// per realm/tag. Left to the host to schedule since it needs a
    /// realm/tag to sweep, unlike the health probe `Core::
    /// spawn_background_tasks` drives directly.
    pub cleanup_interval: Duration,
}

impl TemplateConfig {
    pub fn from_env() -> Result<Self> {
        Ok(TemplateConfig {
            default_ttl: Duration::from_secs(env_parse("TEMPLATE_DEFAULT_TTL_SECONDS", 730 * 24 * 3600)),
            expiring_soon_window: Duration::from_secs(env_parse("TEMPLATE_EXPIRING_SOON_SECONDS", 30 * 24 * 3600)),
            current_encoder_version: env::var("TEMPLATE_CURRENT_ENCODER_VERSION")
                .unwrap_or_else(|_| "v3".to_string()),
            cleanup_batch_size: env_parse("TEMPLATE_CLEANUP_BATCH_SIZE", 500),
            cleanup_interval: Duration::from_secs(env_parse("TEMPLATE_CLEANUP_INTERVAL_HOURS", 24) * 3600),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
