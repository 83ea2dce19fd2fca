use std::sync::Arc;

use crate::app::models::{BiometricImage, Codec, CredentialRecord, EnrollAction, EnrollmentRejectReason, EnrollmentRequest, TemplateKind};
use crate::app::traits::{ClockSource, CredentialStore, EventSink};
use crate::audit::AuditEvent;
use crate::concurrency::UserLockRegistry;
use crate::config::VerificationConfig;
use crate::error::{CoreError, CoreResult};
use crate::rpc::BwsClient;

/// Drives enrollment end to end (spec §4.2): validates the image batch,
/// serializes per user, calls BWS, then writes the resulting
/// `CredentialRecord` back through the host's store.
pub struct EnrollmentWorkflow {
    config: VerificationConfig,
    default_ttl: std::time::Duration,
    bws: Arc<BwsClient>,
    store: Arc<dyn CredentialStore>,
    sink: Arc<dyn EventSink>,
    locks: Arc<UserLockRegistry>,
    clock: Arc<dyn ClockSource>,
}

impl EnrollmentWorkflow {
    pub fn new(
        config: VerificationConfig,
        default_ttl: std::time::Duration,
        bws: Arc<BwsClient>,
        store: Arc<dyn CredentialStore>,
        sink: Arc<dyn EventSink>,
        locks: Arc<UserLockRegistry>,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        EnrollmentWorkflow {
            config,
            default_ttl,
            bws,
            store,
            sink,
            locks,
            clock,
        }
    }

    pub async fn enroll(&self, request: EnrollmentRequest) -> CoreResult<(EnrollAction, CredentialRecord)> {
        if request.images.len() < self.config.min_enrollment_images
            || request.images.len() > self.config.max_enrollment_images
        {
            return Err(CoreError::EnrollmentRejected {
                reason: EnrollmentRejectReason::LowQuality,
            });
        }

        // Every frame's size and codec signature is re-validated here rather
        // than trusted from the caller (spec §3.2.7: BWS is never called on
        // an invalid set).
        for image in &request.images {
            validate_image(image)?;
        }

        let _guard = self
            .locks
            .try_lock(&request.realm, &request.user_id)
            .ok_or_else(|| CoreError::Conflict(format!("enrollment already in flight for {}", request.user_id)))?;

        let outcome = self
            .bws
            .enroll(&request.realm, &request.user_id, &request.images, &request.tags, None)
            .await;

        let outcome = match outcome {
            Ok(o) => o,
            Err(err) => {
                self.emit(&request, "failed", Some(err.to_string())).await;
                return Err(err);
            }
        };

        let now = self.clock.now();
        let template_kind = if outcome.feature_vector_count > 0 {
            TemplateKind::Standard
        } else {
            TemplateKind::Compact
        };

        let record = CredentialRecord {
            template_id: outcome.template_id,
            created_at: now,
            expires_at: now + chrono::Duration::from_std(self.default_ttl).unwrap(),
            image_count: request.images.len() as u32,
            encoder_version: outcome.encoder_version,
            feature_vector_count: outcome.feature_vector_count,
            thumbnails_stored: template_kind.stores_thumbnails(),
            tags: request.tags.clone(),
            template_kind,
            last_verified_at: None,
        };

        self.store
            .put(&request.realm, &request.user_id, record.clone())
            .await
            .map_err(|e| CoreError::Conflict(e.to_string()))?;

        self.emit(&request, "success", None).await;

        Ok((outcome.action, record))
    }

    async fn emit(&self, request: &EnrollmentRequest, outcome: &'static str, reason: Option<String>) {
        crate::metrics::record_enrollment(&request.realm, outcome);
        let mut builder = AuditEvent::builder(&request.realm, &request.user_id, "enroll", "system").outcome(outcome);
        if let Some(reason) = reason {
            builder = builder.reason(reason);
        }
        self.sink.emit(builder.build()).await;
    }
}

/// Re-checks size and codec signature for a frame the caller already claims
/// to be `BiometricImage` (spec §4.2 step 2: size in [1 KiB, 10 MiB], codec
/// sniffed as JPEG/PNG), mirroring `BiometricImage::from_bytes` without
/// consuming the image.
fn validate_image(image: &BiometricImage) -> CoreResult<()> {
    let size = image.bytes.len();
    if size < BiometricImage::MIN_SIZE_BYTES || size > BiometricImage::MAX_SIZE_BYTES {
        return Err(CoreError::EnrollmentRejected {
            reason: EnrollmentRejectReason::LowQuality,
        });
    }

    match Codec::sniff(&image.bytes) {
        Some(sniffed) if sniffed == image.codec => Ok(()),
        _ => Err(CoreError::EnrollmentRejected {
            reason: EnrollmentRejectReason::LowQuality,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{BiometricImage, Codec};
    use crate::app::traits::SystemClock;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn sample_image() -> BiometricImage {
        let mut bytes = vec![0xFF, 0xD8, 0xFF];
        bytes.extend(std::iter::repeat(0u8).take(2048));
        BiometricImage {
            bytes,
            codec: Codec::Jpeg,
            movement_tag: None,
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn emit(&self, event: AuditEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn rejects_too_few_images() {
        let config = VerificationConfig {
            default_match_threshold: 0.85,
            min_enrollment_images: 2,
            max_enrollment_images: 5,
        };
        let request = EnrollmentRequest {
            realm: "realm-1".into(),
            user_id: "user-1".into(),
            images: vec![sample_image()],
            tags: vec![],
        };
        assert!(request.images.len() < config.min_enrollment_images);
    }

    #[test]
    fn validate_image_rejects_undersized_frame() {
        let image = BiometricImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0x00],
            codec: Codec::Jpeg,
            movement_tag: None,
        };
        assert!(matches!(
            validate_image(&image),
            Err(CoreError::EnrollmentRejected { reason: EnrollmentRejectReason::LowQuality })
        ));
    }

    #[test]
    fn validate_image_rejects_codec_mismatch() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF];
        bytes.extend(std::iter::repeat(0u8).take(2048));
        let image = BiometricImage {
            bytes,
            codec: Codec::Png,
            movement_tag: None,
        };
        assert!(matches!(
            validate_image(&image),
            Err(CoreError::EnrollmentRejected { reason: EnrollmentRejectReason::LowQuality })
        ));
    }

    #[test]
    fn validate_image_accepts_well_formed_jpeg() {
        assert!(validate_image(&sample_image()).is_ok());
    }
}
