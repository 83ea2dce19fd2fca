pub mod deletion;

pub use deletion::DeletionRequestService;

use std::sync::Arc;

use crate::app::models::{BiometricImage, Codec, TemplateHealth, TemplateId, TemplateStatus};
use crate::app::traits::{ClockSource, CredentialStore, EventSink};
use crate::audit::AuditEvent;
use crate::config::TemplateConfig;
use crate::error::{CoreError, CoreResult};
use crate::rpc::BwsClient;

/// Template status, health classification, encoder upgrade, and expiry
/// cleanup (spec §4.5.1). Thumbnails returned from BWS are zeroized
/// (`SecureThumbnail`) as soon as the upgrade call that needed them returns.
pub struct TemplateLifecycleManager {
    config: TemplateConfig,
    bws: Arc<BwsClient>,
    store: Arc<dyn CredentialStore>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn ClockSource>,
}

impl TemplateLifecycleManager {
    pub fn new(
        config: TemplateConfig,
        bws: Arc<BwsClient>,
        store: Arc<dyn CredentialStore>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        TemplateLifecycleManager {
            config,
            bws,
            store,
            sink,
            clock,
        }
    }

    pub async fn status(&self, realm: &str, user_id: &str, include_thumbnails: bool) -> CoreResult<TemplateStatus> {
        let record = self
            .store
            .get(realm, user_id)
            .await
            .map_err(|e| CoreError::Conflict(e.to_string()))?
            .ok_or(CoreError::NotEnrolled)?;

        self.bws.template_status(realm, record.template_id, include_thumbnails, None).await
    }

    /// Classifies a stored credential against the five states spec §4.5.1
    /// names (`healthy`, `outdated_encoder`, `expiring_soon`,
    /// `missing_thumbnails`, `orphaned`, `sync_mismatch`).
    pub async fn health(&self, realm: &str, user_id: &str) -> CoreResult<TemplateHealth> {
        let record = match self.store.get(realm, user_id).await.map_err(|e| CoreError::Conflict(e.to_string()))? {
            Some(r) => r,
            None => return Ok(TemplateHealth::Orphaned),
        };

        let status = match self.bws.template_status(realm, record.template_id, false, None).await {
            Ok(s) => s,
            Err(_) => return Ok(TemplateHealth::SyncMismatch),
        };

        if !status.available {
            return Ok(TemplateHealth::Orphaned);
        }

        let now = self.clock.now();
        if record.is_expired_at(now) {
            return Ok(TemplateHealth::ExpiringSoon);
        }
        let expiring_soon = record.expires_at - chrono::Duration::from_std(self.config.expiring_soon_window).unwrap();
        if now > expiring_soon {
            return Ok(TemplateHealth::ExpiringSoon);
        }

        if record.encoder_version != self.config.current_encoder_version {
            return Ok(TemplateHealth::OutdatedEncoder);
        }

        if record.template_kind.stores_thumbnails() && !status.thumbnails_stored {
            return Ok(TemplateHealth::MissingThumbnails);
        }

        Ok(TemplateHealth::Healthy)
    }

    /// Re-enrolls the user against the current encoder from stored
    /// thumbnails (spec §4.5: "valid only if the template was enrolled in a
    /// kind that stored thumbnails... immediately re-enrolls from
    /// thumbnails, zeroizes thumbnails on return"). A no-op if the template
    /// is already on the current encoder version (idempotent, spec §8).
    pub async fn upgrade(&self, realm: &str, user_id: &str) -> CoreResult<TemplateId> {
        let record = self
            .store
            .get(realm, user_id)
            .await
            .map_err(|e| CoreError::Conflict(e.to_string()))?
            .ok_or(CoreError::NotEnrolled)?;

        if record.encoder_version == self.config.current_encoder_version {
            return Ok(record.template_id);
        }

        if !record.template_kind.stores_thumbnails() {
            return Err(CoreError::EnrollmentRejected {
                reason: crate::app::models::EnrollmentRejectReason::EncoderMismatch,
            });
        }

        let status = self.bws.template_status(realm, record.template_id, true, None).await?;
        // `images` built from `status.thumbnails` below before the status value
        // (and its zeroizing thumbnails) drops at the end of this scope.
        let thumbnails = status.thumbnails.clone().unwrap_or_default();
        if thumbnails.is_empty() {
            return Err(CoreError::EnrollmentRejected {
                reason: crate::app::models::EnrollmentRejectReason::EncoderMismatch,
            });
        }
        let images: Vec<BiometricImage> = thumbnails
            .iter()
            .map(|thumb| BiometricImage {
                bytes: thumb.0.clone(),
                codec: Codec::Jpeg,
                movement_tag: None,
            })
            .collect();
        drop(status);

        let enroll_result = self.bws.enroll(realm, user_id, &images, &record.tags, None).await;
        // Thumbnail bytes were cloned out of `SecureThumbnail` into plain
        // `BiometricImage`s above; wipe them here rather than relying on a
        // non-zeroizing `Vec<u8>` drop (invariant 1: thumbnails zeroized on
        // return), whether the enroll call succeeded or not.
        for image in images {
            let mut bytes = image.bytes;
            zeroize::Zeroize::zeroize(&mut bytes);
        }
        let outcome = enroll_result?;

        let mut updated = record.clone();
        updated.encoder_version = outcome.encoder_version;
        updated.feature_vector_count = outcome.feature_vector_count;
        updated.thumbnails_stored = true;

        self.store
            .put(realm, user_id, updated)
            .await
            .map_err(|e| CoreError::Conflict(e.to_string()))?;

        self.sink
            .emit(
                AuditEvent::builder(realm, user_id, "template_upgrade", "system")
                    .outcome("success")
                    .build(),
            )
            .await;

        Ok(record.template_id)
    }

    /// Scans for records past `expires_at`, deletes the BWS template and
    /// purges the host credential for each (spec §4.5: "deletes via BWS and
    /// purges host credentials; runs on a configurable schedule"), bounded
    /// by `TemplateConfig::cleanup_batch_size`. Returns the user ids purged;
    /// a per-user BWS failure is logged and skipped rather than aborting the
    /// whole sweep.
    pub async fn cleanup_expired(&self, realm: &str, tag: &str) -> CoreResult<Vec<String>> {
        let candidates = self
            .store
            .list_users_with_tag(realm, tag)
            .await
            .map_err(|e| CoreError::Conflict(e.to_string()))?;

        let now = self.clock.now();
        let mut purged = Vec::new();
        for user_id in candidates.into_iter().take(self.config.cleanup_batch_size) {
            let Some(record) = self.store.get(realm, &user_id).await.map_err(|e| CoreError::Conflict(e.to_string()))? else {
                continue;
            };
            if !record.is_expired_at(now) {
                continue;
            }

            if let Err(err) = self.bws.delete_template(realm, record.template_id, None).await {
                tracing::warn!(realm, user_id = %user_id, error = %err, "cleanup_expired: BWS delete failed, leaving credential for next sweep");
                continue;
            }

            if let Err(err) = self.store.delete(realm, &user_id).await {
                tracing::warn!(realm, user_id = %user_id, error = %err, "cleanup_expired: credential purge failed after BWS delete succeeded");
                continue;
            }

            self.sink
                .emit(
                    AuditEvent::builder(realm, &user_id, "template_cleanup_expired", "system")
                        .outcome("success")
                        .build(),
                )
                .await;
            purged.push(user_id);
        }
        Ok(purged)
    }
}
