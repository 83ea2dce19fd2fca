//! Domain types shared by every component of the biometric core.
//!
//! `CredentialRecord` is owned by the host's credential store (spec §3.3):
//! this module only defines the shape of the value that flows across the
//! `CredentialStore` trait boundary, it is never backed by a Diesel schema
//! in this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 64-bit positive integer identifying a template within a BWS partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(u64);

impl TemplateId {
    /// Wraps a raw id. Panics if `raw` is zero — zero is reserved to mean "absent" at the wire boundary.
    pub fn new(raw: u64) -> Self {
        assert!(raw > 0, "template id must be a positive 64-bit integer");
        TemplateId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Compact,
    Standard,
    Full,
}

impl TemplateKind {
    /// Only kinds that store thumbnails can be upgraded in place (spec §4.5).
    pub fn stores_thumbnails(self) -> bool {
        matches!(self, TemplateKind::Standard | TemplateKind::Full)
    }
}

/// Host-owned metadata entry linking a user to a template id (spec §3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub template_id: TemplateId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub image_count: u32,
    pub encoder_version: String,
    pub feature_vector_count: u32,
    pub thumbnails_stored: bool,
    pub tags: Vec<String>,
    pub template_kind: TemplateKind,
    pub last_verified_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct ImageCodec;

impl ImageCodec {
    pub const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
    pub const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Jpeg,
    Png,
}

impl Codec {
    pub fn sniff(bytes: &[u8]) -> Option<Codec> {
        if bytes.len() >= 3 && bytes[..3] == ImageCodec::JPEG_MAGIC {
            Some(Codec::Jpeg)
        } else if bytes.len() >= 8 && bytes[..8] == ImageCodec::PNG_MAGIC {
            Some(Codec::Png)
        } else {
            None
        }
    }
}

/// A single captured frame handed to a workflow. The core never retains a
/// reference after the call returns (spec §3.3 ownership).
#[derive(Debug, Clone)]
pub struct BiometricImage {
    pub bytes: Vec<u8>,
    pub codec: Codec,
    /// Movement direction tag for challenge-response liveness frames.
    pub movement_tag: Option<MovementDirection>,
}

impl BiometricImage {
    pub const MIN_SIZE_BYTES: usize = 1024;
    pub const MAX_SIZE_BYTES: usize = 10 * 1024 * 1024;

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, crate::error::CoreError> {
        let codec = Codec::sniff(&bytes).ok_or(crate::error::CoreError::EnrollmentRejected {
            reason: EnrollmentRejectReason::LowQuality,
        })?;
        if bytes.len() < Self::MIN_SIZE_BYTES || bytes.len() > Self::MAX_SIZE_BYTES {
            return Err(crate::error::CoreError::EnrollmentRejected {
                reason: EnrollmentRejectReason::LowQuality,
            });
        }
        Ok(BiometricImage { bytes, codec, movement_tag: None })
    }

    pub fn with_movement_tag(mut self, tag: MovementDirection) -> Self {
        self.movement_tag = Some(tag);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    Up,
    Down,
    Left,
    Right,
}

impl MovementDirection {
    pub const ALL: [MovementDirection; 4] = [
        MovementDirection::Up,
        MovementDirection::Down,
        MovementDirection::Left,
        MovementDirection::Right,
    ];
}

#[derive(Debug, Clone)]
pub struct EnrollmentRequest {
    pub realm: String,
    pub user_id: String,
    pub images: Vec<BiometricImage>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentRejectReason {
    NoFace,
    MultipleFaces,
    LowQuality,
    EncoderMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollAction {
    Created,
    Updated,
    Upgraded,
}

#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub realm: String,
    pub user_id: String,
    pub images: Vec<BiometricImage>,
    pub liveness_mode: Option<LivenessMode>,
    pub risk_level: Option<RiskLevel>,
    pub threshold_override: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationRejectReason {
    NoFace,
    LowQuality,
    BelowThreshold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub matched: bool,
    pub score: f64,
    pub threshold: f64,
    pub liveness: Option<LivenessOutcome>,
    pub error_kind: Option<VerificationRejectReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LivenessMode {
    Passive,
    ActiveSmile,
    ChallengeResponse,
    Combined,
}

impl LivenessMode {
    pub fn expected_image_count(self) -> std::ops::RangeInclusive<usize> {
        match self {
            LivenessMode::Passive => 1..=1,
            LivenessMode::ActiveSmile => 2..=2,
            LivenessMode::ChallengeResponse => 2..=2,
            LivenessMode::Combined => 1..=2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn default_mode(self) -> LivenessMode {
        match self {
            RiskLevel::Low => LivenessMode::Passive,
            RiskLevel::Medium => LivenessMode::ActiveSmile,
            RiskLevel::High => LivenessMode::ChallengeResponse,
            RiskLevel::VeryHigh => LivenessMode::Combined,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessChallenge {
    pub mode: LivenessMode,
    pub directions: Vec<MovementDirection>,
    pub deadline: DateTime<Utc>,
    pub nonce: uuid::Uuid,
}

impl LivenessChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessRejectReason {
    Passive,
    Active,
    ChallengeResponse,
    ChallengeExpired,
    NonceReused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessOutcome {
    pub alive: bool,
    pub score: f64,
    pub mode: LivenessMode,
    pub processing_time_ms: u64,
    pub error_kind: Option<LivenessRejectReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStatus {
    pub template_id: TemplateId,
    pub available: bool,
    pub enrolled_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub encoder_version: String,
    pub feature_vector_count: u32,
    pub thumbnails_stored: bool,
    pub thumbnails: Option<Vec<SecureThumbnail>>,
}

/// Thumbnail bytes held only in memory for the duration of an upgrade, then
/// zeroized (invariant 1). `Zeroize` makes the "zeroize on return" step an
/// explicit, auditable drop rather than relying on the allocator.
#[derive(Clone, zeroize::Zeroize)]
#[zeroize(drop)]
pub struct SecureThumbnail(pub Vec<u8>);

impl fmt::Debug for SecureThumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureThumbnail({} bytes, redacted)", self.0.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateHealth {
    Healthy,
    OutdatedEncoder,
    ExpiringSoon,
    MissingThumbnails,
    Orphaned,
    SyncMismatch,
}
