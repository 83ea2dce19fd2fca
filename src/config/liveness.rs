use anyhow::Result;
use std::env;
use std::time::Duration;

use crate::app::models::{LivenessMode, RiskLevel};

/// Liveness engine tunables (spec §4.4, §6.4).
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    pub enabled: bool,
    pub passive_enabled: bool,
    pub active_enabled: bool,
    pub challenge_response_enabled: bool,
    pub default_mode: LivenessMode,
    pub challenge_ttl: Duration,
    pub challenge_count: usize,
    /// `livenessConfidenceThreshold` (default 0.5).
    pub min_alive_score: f64,
    pub risk_escalation_enabled: bool,
    /// Per-mode overhead budgets (`livenessMaxOverheadMs` and its §4.4
    /// per-mode variants: passive 200ms, active 500ms, challenge-response
    /// 1000ms default). `combined` reuses the active budget.
    pub passive_max_overhead: Duration,
    pub active_max_overhead: Duration,
    pub challenge_response_max_overhead: Duration,
}

impl LivenessConfig {
    pub fn from_env() -> Result<Self> {
        let default_mode = match env::var("LIVENESS_DEFAULT_MODE").as_deref() {
            Ok("passive") => LivenessMode::Passive,
            Ok("active-smile") => LivenessMode::ActiveSmile,
            Ok("challenge-response") => LivenessMode::ChallengeResponse,
            Ok("combined") => LivenessMode::Combined,
            _ => RiskLevel::Medium.default_mode(),
        };

        Ok(LivenessConfig {
            enabled: env_parse("LIVENESS_ENABLED", true),
            passive_enabled: env_parse("LIVENESS_PASSIVE_ENABLED", true),
            active_enabled: env_parse("LIVENESS_ACTIVE_ENABLED", true),
            challenge_response_enabled: env_parse("LIVENESS_CHALLENGE_RESPONSE_ENABLED", true),
            default_mode,
            challenge_ttl: Duration::from_secs(env_parse("LIVENESS_CHALLENGE_TIMEOUT_SECONDS", 30)),
            challenge_count: env_parse("LIVENESS_CHALLENGE_COUNT", 2),
            min_alive_score: env_parse("LIVENESS_CONFIDENCE_THRESHOLD", 0.5),
            risk_escalation_enabled: env_parse("LIVENESS_ADAPTIVE_MODE", false),
            passive_max_overhead: Duration::from_millis(env_parse("LIVENESS_MAX_OVERHEAD_MS", 200)),
            active_max_overhead: Duration::from_millis(env_parse("LIVENESS_ACTIVE_MAX_OVERHEAD_MS", 500)),
            challenge_response_max_overhead: Duration::from_millis(env_parse(
                "LIVENESS_CHALLENGE_RESPONSE_MAX_OVERHEAD_MS",
                1000,
            )),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
