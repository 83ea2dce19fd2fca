mod common;

use std::sync::Arc;
use std::time::Duration;

use biometric_core::app::models::{
    EnrollAction, EnrollmentRequest, LivenessMode, VerificationRejectReason, VerificationRequest,
};
use biometric_core::app::traits::{InMemoryCredentialStore, InMemorySessionScratch, OsRandom, SystemClock};
use biometric_core::concurrency::UserLockRegistry;
use biometric_core::error::CoreError;
use biometric_core::liveness::LivenessEngine;
use biometric_core::rpc::types::{EnrollWireResponse, LivenessWireResponse, VerifyWireResponse};
use biometric_core::rpc::BwsClient;
use biometric_core::workflows::{EnrollmentWorkflow, VerificationWorkflow};

use common::{bws_config, liveness_config, sample_image, verification_config, MockTransport, RecordingSink};

fn build_workflows(mock: MockTransport) -> (EnrollmentWorkflow, VerificationWorkflow, Arc<RecordingSink>) {
    let random = Arc::new(OsRandom::new());
    let bws = Arc::new(BwsClient::with_transport(bws_config(), random.clone(), Arc::new(mock)));
    let store = Arc::new(InMemoryCredentialStore::new());
    let sink = Arc::new(RecordingSink::default());
    let locks = Arc::new(UserLockRegistry::new());
    let clock = Arc::new(SystemClock);
    let scratch = Arc::new(InMemorySessionScratch::new());

    let enrollment = EnrollmentWorkflow::new(
        verification_config(),
        Duration::from_secs(365 * 24 * 3600),
        bws.clone(),
        store.clone(),
        sink.clone(),
        locks.clone(),
        clock.clone(),
    );

    let liveness = Arc::new(LivenessEngine::new(
        liveness_config(LivenessMode::Passive),
        bws.clone(),
        scratch,
        random,
        clock.clone(),
    ));

    let verification = VerificationWorkflow::new(
        verification_config(),
        bws,
        store,
        sink.clone(),
        liveness,
        locks,
        clock,
    );

    (enrollment, verification, sink)
}

#[tokio::test]
async fn enroll_then_verify_matches_above_threshold() {
    let mut mock = MockTransport::new();
    mock.expect_enroll().times(1).returning(|_, _| {
        Ok(EnrollWireResponse {
            template_id: 42,
            feature_vector_count: 128,
            encoder_version: "v3".to_string(),
            action: "created".to_string(),
            rejected_reason: None,
        })
    });
    mock.expect_score_liveness()
        .times(1)
        .returning(|_, _| Ok(LivenessWireResponse { alive: true, score: 0.95 }));
    mock.expect_verify()
        .times(1)
        .returning(|_, _| Ok(VerifyWireResponse { matched: true, score: 0.93, rejected_reason: None }));

    let (enrollment, verification, sink) = build_workflows(mock);

    let (action, record) = enrollment
        .enroll(EnrollmentRequest {
            realm: "realm-1".to_string(),
            user_id: "user-1".to_string(),
            images: vec![sample_image()],
            tags: vec!["vip".to_string()],
        })
        .await
        .expect("enrollment should succeed");

    assert_eq!(action, EnrollAction::Created);
    assert_eq!(record.template_id.get(), 42);

    let outcome = verification
        .verify(VerificationRequest {
            realm: "realm-1".to_string(),
            user_id: "user-1".to_string(),
            images: vec![sample_image()],
            liveness_mode: Some(LivenessMode::Passive),
            risk_level: None,
            threshold_override: None,
        })
        .await
        .expect("verification should succeed");

    assert!(outcome.matched);
    assert_eq!(outcome.score, 0.93);
    assert!(outcome.liveness.expect("liveness outcome present").alive);

    let events = sink.events();
    assert_eq!(events.len(), 2, "one audit event for enroll, one for verify");
    assert_eq!(events[0].operation, "enroll");
    assert_eq!(events[0].outcome, "success");
    assert_eq!(events[1].operation, "verify");
    assert_eq!(events[1].outcome, "success");
}

#[tokio::test]
async fn verify_below_threshold_is_rejected_without_erroring() {
    let mut mock = MockTransport::new();
    mock.expect_enroll().times(1).returning(|_, _| {
        Ok(EnrollWireResponse {
            template_id: 7,
            feature_vector_count: 128,
            encoder_version: "v3".to_string(),
            action: "created".to_string(),
            rejected_reason: None,
        })
    });
    mock.expect_score_liveness()
        .times(1)
        .returning(|_, _| Ok(LivenessWireResponse { alive: true, score: 0.95 }));
    mock.expect_verify()
        .times(1)
        .returning(|_, _| Ok(VerifyWireResponse { matched: false, score: 0.4, rejected_reason: None }));

    let (enrollment, verification, _sink) = build_workflows(mock);

    enrollment
        .enroll(EnrollmentRequest {
            realm: "realm-1".to_string(),
            user_id: "user-2".to_string(),
            images: vec![sample_image()],
            tags: vec![],
        })
        .await
        .unwrap();

    let outcome = verification
        .verify(VerificationRequest {
            realm: "realm-1".to_string(),
            user_id: "user-2".to_string(),
            images: vec![sample_image()],
            liveness_mode: Some(LivenessMode::Passive),
            risk_level: None,
            threshold_override: None,
        })
        .await
        .expect("a below-threshold match is a rejected outcome, not an error");

    assert!(!outcome.matched);
    assert_eq!(outcome.error_kind, Some(VerificationRejectReason::BelowThreshold));
}

#[tokio::test]
async fn verify_without_prior_enrollment_fails_not_enrolled() {
    let mock = MockTransport::new();
    let (_enrollment, verification, _sink) = build_workflows(mock);

    let result = verification
        .verify(VerificationRequest {
            realm: "realm-1".to_string(),
            user_id: "never-enrolled".to_string(),
            images: vec![sample_image()],
            liveness_mode: Some(LivenessMode::Passive),
            risk_level: None,
            threshold_override: None,
        })
        .await;

    assert!(matches!(result, Err(CoreError::NotEnrolled)));
}

#[tokio::test]
async fn enrollment_rejects_batches_outside_configured_bounds() {
    let mock = MockTransport::new();
    let (enrollment, _verification, _sink) = build_workflows(mock);

    let result = enrollment
        .enroll(EnrollmentRequest {
            realm: "realm-1".to_string(),
            user_id: "user-3".to_string(),
            images: vec![sample_image(), sample_image(), sample_image(), sample_image(), sample_image(), sample_image()],
            tags: vec![],
        })
        .await;

    assert!(matches!(result, Err(CoreError::EnrollmentRejected { .. })));
}

#[tokio::test]
async fn enrollment_refuses_with_conflict_when_already_in_flight_for_user() {
    let random = Arc::new(OsRandom::new());
    let bws = Arc::new(BwsClient::with_transport(bws_config(), random, Arc::new(MockTransport::new())));
    let store = Arc::new(InMemoryCredentialStore::new());
    let sink = Arc::new(RecordingSink::default());
    let locks = Arc::new(UserLockRegistry::new());
    let clock = Arc::new(SystemClock);

    let enrollment = EnrollmentWorkflow::new(
        verification_config(),
        Duration::from_secs(365 * 24 * 3600),
        bws,
        store,
        sink,
        locks.clone(),
        clock,
    );

    let _held = locks.lock("realm-1", "user-busy").await;

    let result = enrollment
        .enroll(EnrollmentRequest {
            realm: "realm-1".to_string(),
            user_id: "user-busy".to_string(),
            images: vec![sample_image()],
            tags: vec![],
        })
        .await;

    assert!(matches!(result, Err(CoreError::Conflict(_))));
}
