use std::sync::Arc;

use crate::app::models::{VerificationOutcome, VerificationRejectReason, VerificationRequest};
use crate::app::traits::{ClockSource, CredentialStore, EventSink};
use crate::audit::AuditEvent;
use crate::concurrency::UserLockRegistry;
use crate::config::VerificationConfig;
use crate::error::{CoreError, CoreResult};
use crate::liveness::LivenessEngine;
use crate::rpc::BwsClient;

/// Drives verification (spec §4.3): resolves a liveness mode, runs the
/// liveness check first, then matches against BWS only if liveness passed.
pub struct VerificationWorkflow {
    config: VerificationConfig,
    bws: Arc<BwsClient>,
    store: Arc<dyn CredentialStore>,
    sink: Arc<dyn EventSink>,
    liveness: Arc<LivenessEngine>,
    locks: Arc<UserLockRegistry>,
    clock: Arc<dyn ClockSource>,
}

impl VerificationWorkflow {
    pub fn new(
        config: VerificationConfig,
        bws: Arc<BwsClient>,
        store: Arc<dyn CredentialStore>,
        sink: Arc<dyn EventSink>,
        liveness: Arc<LivenessEngine>,
        locks: Arc<UserLockRegistry>,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        VerificationWorkflow {
            config,
            bws,
            store,
            sink,
            liveness,
            locks,
            clock,
        }
    }

    pub async fn verify(&self, request: VerificationRequest) -> CoreResult<VerificationOutcome> {
        let started = std::time::Instant::now();
        let _guard = self.locks.lock(&request.realm, &request.user_id).await;

        let record = self
            .store
            .get(&request.realm, &request.user_id)
            .await
            .map_err(|e| CoreError::Conflict(e.to_string()))?
            .ok_or(CoreError::NotEnrolled)?;

        let now = self.clock.now();
        if record.is_expired_at(now) {
            self.emit(&request, "failed", Some("expired".into()), started.elapsed()).await;
            return Err(CoreError::Expired);
        }

        let liveness_outcome = if self.liveness.is_enabled() {
            let mode = self.liveness.select_mode(request.liveness_mode, request.risk_level);
            let outcome = self.liveness.evaluate(&request.realm, &request.user_id, mode, &request.images).await?;

            if !outcome.alive {
                let rejected = VerificationOutcome {
                    matched: false,
                    score: 0.0,
                    threshold: self.threshold(&request),
                    liveness: Some(outcome),
                    error_kind: Some(VerificationRejectReason::LowQuality),
                };
                self.emit(&request, "rejected", Some("liveness check failed".into()), started.elapsed()).await;
                return Ok(rejected);
            }

            Some(outcome)
        } else {
            None
        };

        let threshold = self.threshold(&request);
        let verify = self
            .bws
            .verify(&request.realm, &request.user_id, record.template_id, &request.images, threshold, None)
            .await?;

        if verify.matched {
            let mut updated = record.clone();
            updated.last_verified_at = Some(now);
            self.store
                .put(&request.realm, &request.user_id, updated)
                .await
                .map_err(|e| CoreError::Conflict(e.to_string()))?;
        }

        let outcome = VerificationOutcome {
            matched: verify.matched,
            score: verify.score,
            threshold,
            liveness: liveness_outcome,
            error_kind: if verify.matched {
                None
            } else {
                Some(verify.reason.unwrap_or(VerificationRejectReason::BelowThreshold))
            },
        };

        self.emit(&request, if verify.matched { "success" } else { "rejected" }, None, started.elapsed()).await;

        Ok(outcome)
    }

    fn threshold(&self, request: &VerificationRequest) -> f64 {
        request.threshold_override.unwrap_or(self.config.default_match_threshold)
    }

    async fn emit(&self, request: &VerificationRequest, outcome: &'static str, reason: Option<String>, duration: std::time::Duration) {
        crate::metrics::record_verification(&request.realm, outcome, duration);
        let mut builder = AuditEvent::builder(&request.realm, &request.user_id, "verify", "system").outcome(outcome);
        if let Some(reason) = reason {
            builder = builder.reason(reason);
        }
        self.sink.emit(builder.build()).await;
    }
}
