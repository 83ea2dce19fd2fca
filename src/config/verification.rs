use anyhow::Result;
use std::env;

/// Thresholds governing enrollment/verification decisions (spec §4.2, §4.3).
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub default_match_threshold: f64,
    pub min_enrollment_images: usize,
    pub max_enrollment_images: usize,
}

impl VerificationConfig {
    pub fn from_env() -> Result<Self> {
        Ok(VerificationConfig {
            default_match_threshold: env_parse("VERIFICATION_DEFAULT_THRESHOLD", 0.015),
            min_enrollment_images: env_parse("VERIFICATION_MIN_ENROLLMENT_IMAGES", 2),
            max_enrollment_images: env_parse("VERIFICATION_MAX_ENROLLMENT_IMAGES", 8),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
