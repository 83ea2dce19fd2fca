use thiserror::Error;

use crate::app::models::{
    EnrollmentRejectReason, LivenessRejectReason, VerificationRejectReason,
};

/// Public error surface of the biometric core (spec §7). Internal plumbing
/// keeps propagating `anyhow::Result` the way the teacher's services do
/// (`app/utils/rate_limiter.rs`, `storage/filesystem.rs`) and is mapped into
/// one of these variants at the boundary each public operation returns across.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration is invalid: {0}")]
    ConfigInvalid(String),

    #[error("no credential is enrolled for this user")]
    NotEnrolled,

    #[error("the credential or challenge has expired")]
    Expired,

    #[error("enrollment rejected: {reason:?}")]
    EnrollmentRejected { reason: EnrollmentRejectReason },

    #[error("verification rejected: {reason:?}")]
    VerificationRejected { reason: VerificationRejectReason },

    #[error("liveness check rejected: {reason:?}")]
    LivenessRejected { reason: LivenessRejectReason },

    #[error("biometric service is temporarily unavailable: {0}")]
    RpcTransient(String),

    #[error("biometric service request failed permanently: {0}")]
    RpcPermanent(String),

    #[error("circuit breaker is open for this operation")]
    CircuitOpen,

    #[error("conflicting state transition: {0}")]
    Conflict(String),

    #[error("resource is busy, retry later")]
    Busy,

    #[error("operation was cancelled")]
    Cancelled,
}

impl CoreError {
    /// Whether a caller could reasonably retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::RpcTransient(_) | CoreError::Busy)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
