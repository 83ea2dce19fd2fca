use base64::Engine;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app::models::{
    BiometricImage, EnrollAction, EnrollmentRejectReason, TemplateId, TemplateStatus, VerificationRejectReason,
};
use crate::app::traits::RandomSource;
use crate::config::BwsConfig;
use crate::error::CoreError;
use crate::rpc::circuit_breaker::CircuitBreaker;
use crate::rpc::pool::RegionPool;
use crate::rpc::retry::retry_transient;
use crate::rpc::signer::CredentialSigner;
use crate::rpc::transport::{BwsTransport, TransportError};
use crate::rpc::types::{
    DeleteTemplateWireRequest, EnrollWireRequest, LivenessWireRequest, SetTemplateTagsWireRequest,
    TemplateStatusWireRequest, VerifyWireRequest, WireImage,
};

pub struct EnrollOutcome {
    pub template_id: TemplateId,
    pub feature_vector_count: u32,
    pub encoder_version: String,
    pub action: EnrollAction,
}

pub struct VerifyOutcome {
    pub matched: bool,
    pub score: f64,
    /// Classified business-rejection reason BWS attached to the response,
    /// when the mismatch wasn't a plain below-threshold score (spec §4.3
    /// step 6, §7 `VerificationRejected`).
    pub reason: Option<VerificationRejectReason>,
}

/// Maps BWS's wire-level rejection strings onto the taxonomy the workflows
/// surface to callers (spec §7). Unrecognized strings fall back to the most
/// conservative classification rather than panicking — BWS is the other
/// side of a network boundary and may add reasons this client doesn't know
/// about yet.
fn classify_enrollment_reason(reason: &str) -> EnrollmentRejectReason {
    match reason {
        "no_face" | "NoFace" => EnrollmentRejectReason::NoFace,
        "multiple_faces" | "MultipleFaces" => EnrollmentRejectReason::MultipleFaces,
        "encoder_mismatch" | "EncoderMismatch" => EnrollmentRejectReason::EncoderMismatch,
        _ => EnrollmentRejectReason::LowQuality,
    }
}

fn classify_verification_reason(reason: &str) -> VerificationRejectReason {
    match reason {
        "no_face" | "NoFace" => VerificationRejectReason::NoFace,
        "below_threshold" | "BelowThreshold" => VerificationRejectReason::BelowThreshold,
        _ => VerificationRejectReason::LowQuality,
    }
}

/// Outcome of a `delete_template` call (spec §4.1: `Deleted | AlreadyAbsent`).
/// A not-found response from BWS is idempotent success, not an error (spec
/// §4.5: "on BWS not-found, the deletion is treated as idempotent success").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateDeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

pub struct ServiceHealth {
    pub available: bool,
    pub average_latency_ms: f64,
    pub error_rate_1m: f64,
}

/// The typed client surface named in spec §4.1: `enroll`, `verify`,
/// `delete_template`, `template_status`, `service_health`. Composes the
/// signer, region pool, per-operation circuit breakers, and retry helper —
/// callers never see the transport layer underneath.
pub struct BwsClient {
    config: BwsConfig,
    signer: CredentialSigner,
    pool: RegionPool,
    random: Arc<dyn RandomSource>,
    breakers: HashMap<&'static str, CircuitBreaker>,
}

const OPERATIONS: [&str; 7] = [
    "enroll",
    "verify",
    "delete_template",
    "template_status",
    "service_health",
    "score_liveness",
    "set_template_tags",
];

/// Bound on concurrent fan-out for the batch operations (spec §4.1: "bounded
/// concurrency"), independent of `BulkConfig` since these are synchronous
/// client calls rather than tracked bulk operations.
const BATCH_FAN_OUT: usize = 8;

impl BwsClient {
    pub fn new(config: BwsConfig, random: Arc<dyn RandomSource>) -> Self {
        let breakers = build_breakers(&config);
        let pool = RegionPool::new(&config);
        let signer = CredentialSigner::new(&config);
        crate::metrics::set_channel_pool_state(config.channel_pool_size as u64);

        BwsClient {
            config,
            signer,
            pool,
            random,
            breakers,
        }
    }

    /// Builds a client around a caller-supplied transport instead of the
    /// HTTP one `new` wires up, keeping every other piece (signer, circuit
    /// breakers, retry) identical. Exercised by tests and by hosts that
    /// speak to BWS over something other than HTTP.
    pub fn with_transport(config: BwsConfig, random: Arc<dyn RandomSource>, transport: Arc<dyn BwsTransport>) -> Self {
        let breakers = build_breakers(&config);
        let pool = RegionPool::single(transport);
        let signer = CredentialSigner::new(&config);
        crate::metrics::set_channel_pool_state(config.channel_pool_size as u64);

        BwsClient {
            config,
            signer,
            pool,
            random,
            breakers,
        }
    }

    pub async fn enroll(
        &self,
        realm: &str,
        user_id: &str,
        images: &[BiometricImage],
        tags: &[String],
        deadline: Option<Duration>,
    ) -> Result<EnrollOutcome, CoreError> {
        let req = EnrollWireRequest {
            realm: realm.to_string(),
            user_id: user_id.to_string(),
            images: images.iter().map(to_wire_image).collect(),
            tags: tags.to_vec(),
        };

        let response = self
            .call("enroll", deadline, |transport, bearer| {
                let req = req.clone();
                async move { transport.enroll(&bearer, req).await }
            })
            .await?;

        if let Some(reason) = response.rejected_reason {
            return Err(CoreError::EnrollmentRejected {
                reason: classify_enrollment_reason(&reason),
            });
        }

        let action = match response.action.as_str() {
            "created" => EnrollAction::Created,
            "upgraded" => EnrollAction::Upgraded,
            _ => EnrollAction::Updated,
        };

        Ok(EnrollOutcome {
            template_id: TemplateId::new(response.template_id),
            feature_vector_count: response.feature_vector_count,
            encoder_version: response.encoder_version,
            action,
        })
    }

    pub async fn verify(
        &self,
        realm: &str,
        user_id: &str,
        template_id: TemplateId,
        images: &[BiometricImage],
        threshold: f64,
        deadline: Option<Duration>,
    ) -> Result<VerifyOutcome, CoreError> {
        let req = VerifyWireRequest {
            realm: realm.to_string(),
            user_id: user_id.to_string(),
            template_id: template_id.get(),
            images: images.iter().map(to_wire_image).collect(),
            threshold,
        };

        let response = self
            .call("verify", deadline, |transport, bearer| {
                let req = req.clone();
                async move { transport.verify(&bearer, req).await }
            })
            .await?;

        // The core computes the match decision itself rather than trusting
        // BWS's own `matched` flag (spec §4.3 step 6: "compute matched =
        // score >= threshold"); `score == threshold` resolves to a match
        // (spec §8 boundary property).
        Ok(VerifyOutcome {
            matched: response.score >= threshold,
            score: response.score,
            reason: response.rejected_reason.as_deref().map(classify_verification_reason),
        })
    }

    pub async fn delete_template(
        &self,
        realm: &str,
        template_id: TemplateId,
        deadline: Option<Duration>,
    ) -> Result<TemplateDeleteOutcome, CoreError> {
        let req = DeleteTemplateWireRequest {
            realm: realm.to_string(),
            template_id: template_id.get(),
        };

        let found = self
            .call("delete_template", deadline, |transport, bearer| {
                let req = req.clone();
                async move {
                    match transport.delete_template(&bearer, req).await {
                        Ok(()) => Ok(true),
                        Err(TransportError::NotFound) => Ok(false),
                        Err(e) => Err(e),
                    }
                }
            })
            .await?;

        Ok(if found {
            TemplateDeleteOutcome::Deleted
        } else {
            TemplateDeleteOutcome::AlreadyAbsent
        })
    }

    pub async fn template_status(
        &self,
        realm: &str,
        template_id: TemplateId,
        include_thumbnails: bool,
        deadline: Option<Duration>,
    ) -> Result<TemplateStatus, CoreError> {
        let req = TemplateStatusWireRequest {
            realm: realm.to_string(),
            template_id: template_id.get(),
            include_thumbnails,
        };

        let response = self
            .call("template_status", deadline, |transport, bearer| {
                let req = req.clone();
                async move { transport.template_status(&bearer, req).await }
            })
            .await?;

        let thumbnails = response.thumbnails_base64.map(|list| {
            list.into_iter()
                .filter_map(|b64| base64::engine::general_purpose::STANDARD.decode(b64).ok())
                .map(crate::app::models::SecureThumbnail)
                .collect()
        });

        Ok(TemplateStatus {
            template_id,
            available: response.available,
            enrolled_at: response.enrolled_at,
            tags: response.tags,
            encoder_version: response.encoder_version,
            feature_vector_count: response.feature_vector_count,
            thumbnails_stored: response.thumbnails_stored,
            thumbnails,
        })
    }

    /// Fans `template_status` out over `BATCH_FAN_OUT` templates at a time
    /// (spec §4.1 `get_template_status_batch`), preserving `ids`' order in
    /// the result. Each element's outcome is independent: one failure
    /// doesn't abort the rest.
    pub async fn get_template_status_batch(
        &self,
        realm: &str,
        ids: &[TemplateId],
        include_thumbnails: bool,
        deadline: Option<Duration>,
    ) -> Vec<Result<TemplateStatus, CoreError>> {
        use futures::stream::{self, StreamExt};

        stream::iter(ids.iter().copied())
            .map(|id| async move { self.template_status(realm, id, include_thumbnails, deadline).await })
            .buffered(BATCH_FAN_OUT)
            .collect()
            .await
    }

    /// Fans `delete_template` out over `BATCH_FAN_OUT` templates at a time
    /// (spec §4.1 `delete_templates_batch`), returning one outcome per id in
    /// the same order as `ids`.
    pub async fn delete_templates_batch(
        &self,
        realm: &str,
        ids: &[TemplateId],
        deadline: Option<Duration>,
    ) -> Vec<(TemplateId, Result<TemplateDeleteOutcome, CoreError>)> {
        use futures::stream::{self, StreamExt};

        stream::iter(ids.iter().copied())
            .map(|id| async move { (id, self.delete_template(realm, id, deadline).await) })
            .buffered(BATCH_FAN_OUT)
            .collect()
            .await
    }

    pub async fn set_template_tags(
        &self,
        realm: &str,
        template_id: TemplateId,
        tags: &[String],
        deadline: Option<Duration>,
    ) -> Result<(), CoreError> {
        let req = SetTemplateTagsWireRequest {
            realm: realm.to_string(),
            template_id: template_id.get(),
            tags: tags.to_vec(),
        };

        self.call("set_template_tags", deadline, |transport, bearer| {
            let req = req.clone();
            async move { transport.set_template_tags(&bearer, req).await }
        })
        .await
    }

    pub async fn score_liveness(
        &self,
        realm: &str,
        user_id: &str,
        mode: &str,
        images: &[BiometricImage],
        deadline: Option<Duration>,
    ) -> Result<(bool, f64), CoreError> {
        let req = LivenessWireRequest {
            realm: realm.to_string(),
            user_id: user_id.to_string(),
            mode: mode.to_string(),
            images: images.iter().map(to_wire_image).collect(),
        };

        let response = self
            .call("score_liveness", deadline, |transport, bearer| {
                let req = req.clone();
                async move { transport.score_liveness(&bearer, req).await }
            })
            .await?;

        Ok((response.alive, response.score))
    }

    /// Also feeds the regional failover prober (SPEC_FULL.md §4.1
    /// supplement): this is the only call the prober issues.
    pub async fn service_health(&self, deadline: Option<Duration>) -> Result<ServiceHealth, CoreError> {
        let response = self
            .call("service_health", deadline, |transport, bearer| async move {
                transport.service_health(&bearer).await
            })
            .await?;

        Ok(ServiceHealth {
            available: response.available,
            average_latency_ms: response.average_latency_ms,
            error_rate_1m: response.error_rate_1m,
        })
    }

    pub async fn probe_preferred_region(&self) {
        let (label, transport) = self.pool.active().await;
        let bearer = match self.signer.current_token() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "failed to mint credential for health probe");
                return;
            }
        };
        let succeeded = transport.service_health(&bearer).await.is_ok();
        self.pool.record_probe(&label, succeeded).await;
    }

    async fn call<F, Fut, T>(&self, operation: &'static str, caller_deadline: Option<Duration>, mut make_call: F) -> Result<T, CoreError>
    where
        F: FnMut(Arc<dyn BwsTransport>, String) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let breaker = self.breakers.get(operation).expect("operation has a registered breaker");
        if !breaker.allow_request() {
            crate::metrics::set_circuit_state(operation, true);
            return Err(CoreError::CircuitOpen);
        }

        let bearer = self
            .signer
            .current_token()
            .map_err(|e| CoreError::RpcPermanent(e.to_string()))?;

        let (_, transport) = self.pool.active().await;
        let op_default = self.op_default_budget(operation);
        let budget = match caller_deadline {
            Some(caller) => caller.min(op_default),
            None => op_default,
        };
        let deadline = Instant::now() + budget;
        let random = self.random.clone();
        let started = Instant::now();

        let result = retry_transient(&self.config, random.as_ref(), deadline, || {
            make_call(transport.clone(), bearer.clone())
        })
        .await;

        let outcome = match result {
            Ok(value) => {
                breaker.record_success();
                crate::metrics::record_rpc_call(operation, "success", started.elapsed());
                Ok(value)
            }
            Err(TransportError::Transient(msg)) => {
                breaker.record_failure();
                crate::metrics::record_rpc_call(operation, "transient_error", started.elapsed());
                Err(CoreError::RpcTransient(msg))
            }
            Err(TransportError::Permanent(msg)) => {
                breaker.record_failure();
                crate::metrics::record_rpc_call(operation, "permanent_error", started.elapsed());
                Err(CoreError::RpcPermanent(msg))
            }
            Err(TransportError::NotFound) => {
                // Only reaches here if a caller doesn't translate NotFound itself
                // (delete_template does, below); treat it like any other
                // permanent rejection rather than tripping the breaker.
                crate::metrics::record_rpc_call(operation, "permanent_error", started.elapsed());
                Err(CoreError::RpcPermanent("resource not found".to_string()))
            }
        };

        crate::metrics::set_circuit_state(operation, breaker.is_open());
        outcome
    }

    /// Per-operation default deadline (spec §4.1: "enroll 7s, verify 4s,
    /// liveness 1s, status 3s, delete 3s"). A caller-supplied deadline can
    /// only shorten this, never extend it (`call` takes the min of the two).
    fn op_default_budget(&self, operation: &str) -> Duration {
        match operation {
            "enroll" => self.config.enroll_timeout,
            "verify" => self.config.verify_timeout,
            "score_liveness" => self.config.liveness_timeout,
            "template_status" => self.config.status_timeout,
            "delete_template" => self.config.delete_timeout,
            _ => self.config.request_timeout,
        }
    }
}

fn build_breakers(config: &BwsConfig) -> HashMap<&'static str, CircuitBreaker> {
    let mut breakers = HashMap::new();
    for op in OPERATIONS {
        breakers.insert(
            op,
            CircuitBreaker::new(
                config.circuit_window_size,
                config.circuit_min_calls,
                config.circuit_failure_threshold,
                config.circuit_open_duration,
            ),
        );
    }
    breakers
}

fn to_wire_image(image: &BiometricImage) -> WireImage {
    WireImage {
        data_base64: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
        codec: format!("{:?}", image.codec).to_lowercase(),
        movement_tag: image.movement_tag.map(|t| format!("{t:?}").to_lowercase()),
    }
}
