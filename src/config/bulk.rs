use anyhow::Result;
use std::env;
use std::time::Duration;

/// Worker pool sizing for the bulk operation engine.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    pub max_concurrent_workers: usize,
    pub per_item_timeout: Duration,
    pub error_retention: Duration,
    pub max_batch_size: usize,
}

impl BulkConfig {
    pub fn from_env() -> Result<Self> {
        Ok(BulkConfig {
            max_concurrent_workers: env_parse("BULK_MAX_CONCURRENT_WORKERS", 8),
            per_item_timeout: Duration::from_millis(env_parse("BULK_PER_ITEM_TIMEOUT_MS", 10_000)),
            error_retention: Duration::from_secs(env_parse("BULK_ERROR_RETENTION_SECONDS", 30 * 24 * 3600)),
            max_batch_size: env_parse("BULK_MAX_BATCH_SIZE", 10_000),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
