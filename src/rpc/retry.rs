use std::future::Future;
use std::time::{Duration, Instant};

use crate::app::traits::RandomSource;
use crate::config::BwsConfig;
use crate::rpc::transport::TransportError;

/// Retries a transient-failing operation with exponential backoff and
/// jitter, bounded by the caller's deadline (spec §4.1: "max 3 attempts,
/// 100ms initial delay, 2.0x multiplier, +/-25% jitter, bounded by caller
/// deadline"). No `backoff` crate exists anywhere in the retrieval pack, so
/// this is hand-rolled the way the teacher hand-rolls its own
/// `RateLimiter` bucket math.
pub async fn retry_transient<F, Fut, T>(
    config: &BwsConfig,
    random: &dyn RandomSource,
    deadline: Instant,
    mut attempt: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut delay = config.retry_initial_delay;
    let mut last_err = None;

    for attempt_no in 1..=config.max_retry_attempts {
        if Instant::now() >= deadline {
            break;
        }
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(TransportError::Permanent(msg)) => return Err(TransportError::Permanent(msg)),
            Err(TransportError::NotFound) => return Err(TransportError::NotFound),
            Err(TransportError::Transient(msg)) => {
                last_err = Some(TransportError::Transient(msg));
                if attempt_no == config.max_retry_attempts {
                    break;
                }
                let jittered = jitter(delay, config.retry_jitter_fraction, random);
                let sleep_for = jittered.min(deadline.saturating_duration_since(Instant::now()));
                if sleep_for.is_zero() {
                    break;
                }
                tokio::time::sleep(sleep_for).await;
                delay = delay.mul_f64(config.retry_multiplier);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| TransportError::Transient("retry deadline exceeded".to_string())))
}

fn jitter(base: Duration, fraction: f64, random: &dyn RandomSource) -> Duration {
    let factor = 1.0 + (random.gen_f64() * 2.0 - 1.0) * fraction;
    base.mul_f64(factor.max(0.0))
}
