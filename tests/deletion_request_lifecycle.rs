mod common;

use std::sync::Arc;

use chrono::Utc;
use serial_test::serial;

use biometric_core::app::models::{CredentialRecord, DeletionRequestState, TemplateId, TemplateKind};
use biometric_core::app::traits::{InMemoryCredentialStore, OsRandom};
use biometric_core::error::CoreError;
use biometric_core::lifecycle::deletion::DeletionRequestService;
use biometric_core::rpc::types::DeleteTemplateWireRequest;
use biometric_core::rpc::BwsClient;

use common::{bws_config, RecordingSink};

fn sample_record() -> CredentialRecord {
    CredentialRecord {
        template_id: TemplateId::new(99),
        created_at: Utc::now(),
        expires_at: Utc::now() + chrono::Duration::days(365),
        image_count: 1,
        encoder_version: "v3".to_string(),
        feature_vector_count: 128,
        thumbnails_stored: false,
        tags: vec![],
        template_kind: TemplateKind::Standard,
        last_verified_at: None,
    }
}

fn deleting_transport() -> common::MockTransport {
    let mut mock = common::MockTransport::new();
    mock.expect_delete_template()
        .times(1)
        .returning(|_, _req: DeleteTemplateWireRequest| Ok(()));
    mock
}

#[tokio::test]
#[serial]
async fn happy_path_create_approve_process_completes_and_erases_credential() {
    let pool = common::setup_test_db();
    let store = Arc::new(InMemoryCredentialStore::new());
    store.put("realm-1", "user-1", sample_record()).await.unwrap();

    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(deleting_transport())));
    let sink = Arc::new(RecordingSink::default());
    let service = DeletionRequestService::new(pool, bws, store.clone(), sink.clone());

    let request = service.create("realm-1", "user-1", "user-1", Some("GDPR request".to_string())).await.unwrap();
    assert_eq!(request.state, DeletionRequestState::Pending);

    let approved = service.approve(&request.id.to_string(), "operator-1", None).await.unwrap();
    assert_eq!(approved.state, DeletionRequestState::Approved);

    let completed = service.process(&request.id.to_string(), "operator-1").await.unwrap();
    assert_eq!(completed.state, DeletionRequestState::Completed);
    assert!(completed.completed_at.is_some());

    assert!(store.get("realm-1", "user-1").await.unwrap().is_none());

    let events = sink.events();
    assert_eq!(events.last().unwrap().operation, "deletion_process");
    assert_eq!(events.last().unwrap().outcome, "success");
}

#[tokio::test]
#[serial]
async fn processing_treats_bws_not_found_as_idempotent_success() {
    let pool = common::setup_test_db();
    let store = Arc::new(InMemoryCredentialStore::new());
    store.put("realm-1", "user-already-gone", sample_record()).await.unwrap();

    let mut mock = common::MockTransport::new();
    mock.expect_delete_template()
        .times(1)
        .returning(|_, _req: DeleteTemplateWireRequest| Err(biometric_core::rpc::transport::TransportError::NotFound));

    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(mock)));
    let sink = Arc::new(RecordingSink::default());
    let service = DeletionRequestService::new(pool, bws, store.clone(), sink);

    let request = service.create("realm-1", "user-already-gone", "user-already-gone", None).await.unwrap();
    service.approve(&request.id.to_string(), "operator-1", None).await.unwrap();

    let completed = service.process(&request.id.to_string(), "operator-1").await.unwrap();
    assert_eq!(completed.state, DeletionRequestState::Completed);
    assert!(store.get("realm-1", "user-already-gone").await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn processing_without_approval_is_an_invalid_transition() {
    let pool = common::setup_test_db();
    let store = Arc::new(InMemoryCredentialStore::new());
    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(common::MockTransport::new())));
    let sink = Arc::new(RecordingSink::default());
    let service = DeletionRequestService::new(pool, bws, store, sink);

    let request = service.create("realm-1", "user-2", "user-2", None).await.unwrap();

    let result = service.process(&request.id.to_string(), "operator-1").await;
    assert!(matches!(result, Err(CoreError::Conflict(_))));
}

#[tokio::test]
#[serial]
async fn decline_and_cancel_move_to_terminal_states() {
    let pool = common::setup_test_db();
    let store = Arc::new(InMemoryCredentialStore::new());
    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(common::MockTransport::new())));
    let sink = Arc::new(RecordingSink::default());
    let service = DeletionRequestService::new(pool, bws, store, sink);

    let declined_req = service.create("realm-1", "user-3", "user-3", None).await.unwrap();
    let declined = service.decline(&declined_req.id.to_string(), "operator-1", Some("not eligible".to_string())).await.unwrap();
    assert_eq!(declined.state, DeletionRequestState::Declined);

    let cancelled_req = service.create("realm-1", "user-4", "user-4", None).await.unwrap();
    let cancelled = service.cancel(&cancelled_req.id.to_string(), "user-4").await.unwrap();
    assert_eq!(cancelled.state, DeletionRequestState::Cancelled);
}

#[tokio::test]
#[serial]
async fn list_filters_by_state() {
    let pool = common::setup_test_db();
    let store = Arc::new(InMemoryCredentialStore::new());
    let bws = Arc::new(BwsClient::with_transport(bws_config(), Arc::new(OsRandom::new()), Arc::new(common::MockTransport::new())));
    let sink = Arc::new(RecordingSink::default());
    let service = DeletionRequestService::new(pool, bws, store, sink);

    let realm = "realm-list-filter";
    let pending = service.create(realm, "user-5", "user-5", None).await.unwrap();
    let approved_req = service.create(realm, "user-6", "user-6", None).await.unwrap();
    service.approve(&approved_req.id.to_string(), "operator-1", None).await.unwrap();

    let all = service.list(realm, None).unwrap();
    assert_eq!(all.len(), 2);

    let only_pending = service.list(realm, Some(DeletionRequestState::Pending)).unwrap();
    assert_eq!(only_pending.len(), 1);
    assert_eq!(only_pending[0].id, pending.id);

    let only_approved = service.list(realm, Some(DeletionRequestState::Approved)).unwrap();
    assert_eq!(only_approved.len(), 1);
    assert_eq!(only_approved[0].user_id, "user-6");
}
