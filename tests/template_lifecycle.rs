mod common;

use std::sync::Arc;

use base64::Engine;
use chrono::Utc;

use biometric_core::app::models::{CredentialRecord, TemplateHealth, TemplateId, TemplateKind};
use biometric_core::app::traits::{InMemoryCredentialStore, OsRandom};
use biometric_core::error::CoreError;
use biometric_core::lifecycle::TemplateLifecycleManager;
use biometric_core::rpc::types::{EnrollWireResponse, TemplateStatusWireResponse};
use biometric_core::rpc::BwsClient;

use common::{bws_config, template_config, RecordingSink};

fn record_with(encoder_version: &str, kind: TemplateKind, expires_in_days: i64) -> CredentialRecord {
    CredentialRecord {
        template_id: TemplateId::new(42),
        created_at: Utc::now(),
        expires_at: Utc::now() + chrono::Duration::days(expires_in_days),
        image_count: 3,
        encoder_version: encoder_version.to_string(),
        feature_vector_count: 128,
        thumbnails_stored: kind.stores_thumbnails(),
        tags: vec!["vip".to_string()],
        template_kind: kind,
        last_verified_at: None,
    }
}

#[tokio::test]
async fn upgrade_is_a_noop_when_already_on_current_encoder() {
    let store = Arc::new(InMemoryCredentialStore::new());
    store.put("realm-1", "user-1", record_with("v3", TemplateKind::Standard, 365)).await.unwrap();

    let mock = common::MockTransport::new(); // no calls expected
    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(mock)));
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(common::FixedClock::new(Utc::now()));
    let manager = TemplateLifecycleManager::new(template_config(), bws, store, sink, clock);

    let result = manager.upgrade("realm-1", "user-1").await.unwrap();
    assert_eq!(result, TemplateId::new(42));
}

#[tokio::test]
async fn upgrade_rejects_templates_without_stored_thumbnails() {
    let store = Arc::new(InMemoryCredentialStore::new());
    store.put("realm-1", "user-1", record_with("v2", TemplateKind::Compact, 365)).await.unwrap();

    let mock = common::MockTransport::new();
    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(mock)));
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(common::FixedClock::new(Utc::now()));
    let manager = TemplateLifecycleManager::new(template_config(), bws, store, sink, clock);

    let result = manager.upgrade("realm-1", "user-1").await;
    assert!(matches!(result, Err(CoreError::EnrollmentRejected { .. })));
}

#[tokio::test]
async fn upgrade_re_enrolls_from_thumbnails_and_bumps_encoder_version() {
    let store = Arc::new(InMemoryCredentialStore::new());
    store.put("realm-1", "user-1", record_with("v2", TemplateKind::Standard, 365)).await.unwrap();

    let mut mock = common::MockTransport::new();
    mock.expect_template_status().times(1).returning(|_, req| {
        assert!(req.include_thumbnails);
        Ok(TemplateStatusWireResponse {
            available: true,
            enrolled_at: Utc::now(),
            tags: vec!["vip".to_string()],
            encoder_version: "v2".to_string(),
            feature_vector_count: 128,
            thumbnails_stored: true,
            thumbnails_base64: Some(vec![base64::engine::general_purpose::STANDARD.encode([0xFFu8, 0xD8, 0xFF])]),
        })
    });
    mock.expect_enroll().times(1).returning(|_, req| {
        assert_eq!(req.images.len(), 1);
        Ok(EnrollWireResponse {
            template_id: 42,
            feature_vector_count: 256,
            encoder_version: "v3".to_string(),
            action: "upgraded".to_string(),
            rejected_reason: None,
        })
    });

    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(mock)));
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(common::FixedClock::new(Utc::now()));
    let manager = TemplateLifecycleManager::new(template_config(), bws, store.clone(), sink.clone(), clock);

    manager.upgrade("realm-1", "user-1").await.unwrap();

    let updated = store.get("realm-1", "user-1").await.unwrap().unwrap();
    assert_eq!(updated.encoder_version, "v3");
    assert_eq!(updated.feature_vector_count, 256);
    assert!(sink.events().iter().any(|e| e.operation == "template_upgrade"));
}

#[tokio::test]
async fn health_classifies_orphaned_when_no_credential_exists() {
    let store = Arc::new(InMemoryCredentialStore::new());
    let mock = common::MockTransport::new();
    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(mock)));
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(common::FixedClock::new(Utc::now()));
    let manager = TemplateLifecycleManager::new(template_config(), bws, store, sink, clock);

    let health = manager.health("realm-1", "nobody").await.unwrap();
    assert_eq!(health, TemplateHealth::Orphaned);
}

#[tokio::test]
async fn health_flags_outdated_encoder_version() {
    let store = Arc::new(InMemoryCredentialStore::new());
    store.put("realm-1", "user-1", record_with("v1", TemplateKind::Standard, 365)).await.unwrap();

    let mut mock = common::MockTransport::new();
    mock.expect_template_status().times(1).returning(|_, _| {
        Ok(TemplateStatusWireResponse {
            available: true,
            enrolled_at: Utc::now(),
            tags: vec![],
            encoder_version: "v1".to_string(),
            feature_vector_count: 128,
            thumbnails_stored: true,
            thumbnails_base64: None,
        })
    });

    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(mock)));
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(common::FixedClock::new(Utc::now()));
    let manager = TemplateLifecycleManager::new(template_config(), bws, store, sink, clock);

    let health = manager.health("realm-1", "user-1").await.unwrap();
    assert_eq!(health, TemplateHealth::OutdatedEncoder);
}

#[tokio::test]
async fn cleanup_expired_purges_bws_and_host_record_for_expired_credentials() {
    let store = Arc::new(InMemoryCredentialStore::new());
    store.put("realm-1", "user-expired", record_with("v3", TemplateKind::Standard, -1)).await.unwrap();
    store.put("realm-1", "user-active", record_with("v3", TemplateKind::Standard, 365)).await.unwrap();

    let mut mock = common::MockTransport::new();
    mock.expect_delete_template().times(1).returning(|_, req| {
        assert_eq!(req.template_id, 42);
        Ok(())
    });

    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(mock)));
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(common::FixedClock::new(Utc::now()));
    let manager = TemplateLifecycleManager::new(template_config(), bws, store.clone(), sink, clock);

    let purged = manager.cleanup_expired("realm-1", "vip").await.unwrap();

    assert_eq!(purged, vec!["user-expired".to_string()]);
    assert!(store.get("realm-1", "user-expired").await.unwrap().is_none());
    assert!(store.get("realm-1", "user-active").await.unwrap().is_some());
}
