use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Connection details and tunables for the BWS biometric RPC service (spec §4.1).
#[derive(Debug, Clone)]
pub struct BwsConfig {
    pub primary_endpoint: String,
    pub secondary_endpoints: Vec<String>,
    pub partition: String,
    pub signing_key: String,
    pub credential_ttl_seconds: u64,
    pub request_timeout: Duration,
    pub max_retry_attempts: u32,
    pub retry_initial_delay: Duration,
    pub retry_multiplier: f64,
    pub retry_jitter_fraction: f64,
    pub circuit_window_size: usize,
    pub circuit_min_calls: usize,
    pub circuit_failure_threshold: f64,
    pub circuit_open_duration: Duration,
    pub health_probe_interval: Duration,
    pub failover_unhealthy_after: u32,
    pub failover_recover_after: u32,
    /// `channelPoolSize` (default 5): channels per region. `HttpBwsTransport`
    /// delegates connection pooling to `reqwest`; this is surfaced as the
    /// `channel_pool_idle` gauge's capacity (spec §4.1.1, §4.7).
    pub channel_pool_size: usize,
    pub keep_alive_time: Duration,
    /// Per-operation default deadlines (spec §4.1: "enroll 7s, verify 4s,
    /// liveness 1s, status 3s, delete 3s"; §6.4 `enrollmentTimeoutSeconds`/
    /// `verificationTimeoutSeconds`). A caller-supplied deadline never
    /// extends these, only shortens them.
    pub enroll_timeout: Duration,
    pub verify_timeout: Duration,
    pub liveness_timeout: Duration,
    pub status_timeout: Duration,
    pub delete_timeout: Duration,
}

impl BwsConfig {
    pub fn from_env() -> Result<Self> {
        let secondary_endpoints = env::var("BWS_SECONDARY_ENDPOINTS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(BwsConfig {
            primary_endpoint: env::var("BWS_PRIMARY_ENDPOINT")
                .context("BWS_PRIMARY_ENDPOINT must be set")?,
            secondary_endpoints,
            partition: env::var("BWS_PARTITION").unwrap_or_else(|_| "default".to_string()),
            signing_key: env::var("BWS_SIGNING_KEY").context("BWS_SIGNING_KEY must be set")?,
            credential_ttl_seconds: env_parse("BWS_CREDENTIAL_TTL_SECONDS", 300),
            request_timeout: Duration::from_millis(env_parse("BWS_REQUEST_TIMEOUT_MS", 5_000)),
            max_retry_attempts: env_parse("BWS_MAX_RETRY_ATTEMPTS", 3),
            retry_initial_delay: Duration::from_millis(env_parse("BWS_RETRY_INITIAL_DELAY_MS", 100)),
            retry_multiplier: env_parse("BWS_RETRY_MULTIPLIER", 2.0),
            retry_jitter_fraction: env_parse("BWS_RETRY_JITTER_FRACTION", 0.25),
            circuit_window_size: env_parse("BWS_CIRCUIT_WINDOW_SIZE", 10),
            circuit_min_calls: env_parse("BWS_CIRCUIT_MIN_CALLS", 5),
            circuit_failure_threshold: env_parse("BWS_CIRCUIT_FAILURE_THRESHOLD", 0.5),
            circuit_open_duration: Duration::from_secs(env_parse("BWS_CIRCUIT_OPEN_SECONDS", 30)),
            health_probe_interval: Duration::from_secs(env_parse("BWS_HEALTH_PROBE_INTERVAL_SECONDS", 30)),
            failover_unhealthy_after: env_parse("BWS_FAILOVER_UNHEALTHY_AFTER", 3),
            failover_recover_after: env_parse("BWS_FAILOVER_RECOVER_AFTER", 2),
            channel_pool_size: env_parse("BWS_CHANNEL_POOL_SIZE", 5),
            keep_alive_time: Duration::from_secs(env_parse("BWS_KEEP_ALIVE_TIME_SECONDS", 30)),
            enroll_timeout: Duration::from_secs(env_parse("BWS_ENROLLMENT_TIMEOUT_SECONDS", 7)),
            verify_timeout: Duration::from_secs(env_parse("BWS_VERIFICATION_TIMEOUT_SECONDS", 4)),
            liveness_timeout: Duration::from_secs(env_parse("BWS_LIVENESS_TIMEOUT_SECONDS", 1)),
            status_timeout: Duration::from_secs(env_parse("BWS_STATUS_TIMEOUT_SECONDS", 3)),
            delete_timeout: Duration::from_secs(env_parse("BWS_DELETE_TIMEOUT_SECONDS", 3)),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
