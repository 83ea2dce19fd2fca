#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use biometric_core::app::models::{BiometricImage, Codec};
use biometric_core::app::traits::{ClockSource, EventSink, RandomSource};
use biometric_core::audit::AuditEvent;
use biometric_core::config::{
    AppConfig, BulkConfig, BwsConfig, Config, DatabaseConfig, LivenessConfig, LoggingConfig, TemplateConfig,
    VerificationConfig,
};
use biometric_core::database::{self, DbPool};
use biometric_core::rpc::transport::{BwsTransport, TransportError};
use biometric_core::rpc::types::{
    DeleteTemplateWireRequest, EnrollWireRequest, EnrollWireResponse, HealthWireResponse, LivenessWireRequest,
    LivenessWireResponse, SetTemplateTagsWireRequest, TemplateStatusWireRequest, TemplateStatusWireResponse,
    VerifyWireRequest, VerifyWireResponse,
};
use biometric_core::app::models::LivenessMode;

mockall::mock! {
    pub Transport {}

    #[async_trait]
    impl BwsTransport for Transport {
        async fn enroll(&self, bearer: &str, req: EnrollWireRequest) -> Result<EnrollWireResponse, TransportError>;
        async fn verify(&self, bearer: &str, req: VerifyWireRequest) -> Result<VerifyWireResponse, TransportError>;
        async fn delete_template(&self, bearer: &str, req: DeleteTemplateWireRequest) -> Result<(), TransportError>;
        async fn template_status(&self, bearer: &str, req: TemplateStatusWireRequest) -> Result<TemplateStatusWireResponse, TransportError>;
        async fn score_liveness(&self, bearer: &str, req: LivenessWireRequest) -> Result<LivenessWireResponse, TransportError>;
        async fn service_health(&self, bearer: &str) -> Result<HealthWireResponse, TransportError>;
        async fn set_template_tags(&self, bearer: &str, req: SetTemplateTagsWireRequest) -> Result<(), TransportError>;
    }
}

/// A `BwsConfig` with short timeouts and no secondary regions, so tests never
/// actually block on network I/O even though `BwsClient::with_transport`
/// still runs every call through the real retry/circuit-breaker machinery.
pub fn bws_config() -> BwsConfig {
    BwsConfig {
        primary_endpoint: "https://bws.example.test".to_string(),
        secondary_endpoints: vec![],
        partition: "integration-tests".to_string(),
        signing_key: "integration-test-signing-key".to_string(),
        credential_ttl_seconds: 300,
        request_timeout: Duration::from_secs(2),
        max_retry_attempts: 3,
        retry_initial_delay: Duration::from_millis(1),
        retry_multiplier: 2.0,
        retry_jitter_fraction: 0.1,
        circuit_window_size: 10,
        circuit_min_calls: 5,
        circuit_failure_threshold: 0.5,
        circuit_open_duration: Duration::from_millis(50),
        health_probe_interval: Duration::from_secs(30),
        failover_unhealthy_after: 3,
        failover_recover_after: 2,
        channel_pool_size: 5,
        keep_alive_time: Duration::from_millis(50),
        enroll_timeout: Duration::from_secs(2),
        verify_timeout: Duration::from_secs(2),
        liveness_timeout: Duration::from_secs(2),
        status_timeout: Duration::from_secs(2),
        delete_timeout: Duration::from_secs(2),
    }
}

pub fn verification_config() -> VerificationConfig {
    VerificationConfig {
        default_match_threshold: 0.85,
        min_enrollment_images: 1,
        max_enrollment_images: 5,
    }
}

pub fn liveness_config(default_mode: LivenessMode) -> LivenessConfig {
    LivenessConfig {
        enabled: true,
        passive_enabled: true,
        active_enabled: true,
        challenge_response_enabled: true,
        default_mode,
        challenge_ttl: Duration::from_secs(30),
        challenge_count: 2,
        min_alive_score: 0.8,
        risk_escalation_enabled: true,
        passive_max_overhead: Duration::from_secs(5),
        active_max_overhead: Duration::from_secs(5),
        challenge_response_max_overhead: Duration::from_secs(5),
    }
}

pub fn bulk_config() -> BulkConfig {
    BulkConfig {
        max_concurrent_workers: 4,
        per_item_timeout: Duration::from_secs(2),
        error_retention: Duration::from_secs(30 * 24 * 3600),
        max_batch_size: 100,
    }
}

pub fn template_config() -> TemplateConfig {
    TemplateConfig {
        default_ttl: Duration::from_secs(365 * 24 * 3600),
        expiring_soon_window: Duration::from_secs(30 * 24 * 3600),
        current_encoder_version: "v3".to_string(),
        cleanup_batch_size: 500,
        cleanup_interval: Duration::from_secs(24 * 3600),
    }
}

/// Full `Config` assembled from hardcoded test-safe values except
/// `database`, which comes from the environment the same way the teacher's
/// own `tests/activity_log_tests.rs` expects `DATABASE_URL`/`DB_*` to be set.
pub fn test_config() -> Config {
    Config {
        app: AppConfig {
            name: "biometric-core-tests".to_string(),
            env: "testing".to_string(),
            debug: true,
        },
        database: DatabaseConfig::from_env().expect("DATABASE_URL or DB_* env vars must be set to run integration tests"),
        logging: LoggingConfig {
            level: "info".to_string(),
            channel: "single".to_string(),
            path: "storage/logs/test.log".to_string(),
            max_files: 5,
            max_file_size: "10MB".to_string(),
        },
        bws: bws_config(),
        verification: verification_config(),
        liveness: liveness_config(LivenessMode::Passive),
        bulk: bulk_config(),
        template: template_config(),
    }
}

pub fn setup_test_db() -> DbPool {
    let config = test_config();
    let pool = database::create_pool(&config).expect("failed to create test db pool");
    database::run_migrations(&pool).expect("failed to run migrations");
    pool
}

pub fn sample_image() -> BiometricImage {
    let mut bytes = vec![0xFF, 0xD8, 0xFF];
    bytes.extend(std::iter::repeat(0u8).take(2048));
    BiometricImage {
        bytes,
        codec: Codec::Jpeg,
        movement_tag: None,
    }
}

/// `RandomSource` that replays a fixed sequence of indices (for
/// challenge-direction selection) and a fixed jitter value, so tests never
/// depend on real entropy.
pub struct ScriptedRandom {
    f64_value: f64,
    indices: Mutex<VecDeque<usize>>,
}

impl ScriptedRandom {
    pub fn new(f64_value: f64, indices: Vec<usize>) -> Self {
        ScriptedRandom {
            f64_value,
            indices: Mutex::new(indices.into()),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn gen_f64(&self) -> f64 {
        self.f64_value
    }

    fn gen_range_usize(&self, lo: usize, _hi: usize) -> usize {
        let mut indices = self.indices.lock().expect("scripted random lock poisoned");
        lo + indices.pop_front().unwrap_or(0)
    }
}

/// `ClockSource` whose wall-clock time is set explicitly, so liveness
/// challenge expiry can be tested without sleeping.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        FixedClock(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().expect("fixed clock lock poisoned") = now;
    }
}

impl ClockSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("fixed clock lock poisoned")
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("recording sink lock poisoned").clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: AuditEvent) {
        self.events.lock().expect("recording sink lock poisoned").push(event);
    }
}
