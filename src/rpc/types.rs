use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire-level image payload. Images travel as base64 JSON bodies over HTTPS
/// (the pack's closest real analogue to BWS's unspecified binary framing —
/// see SPEC_FULL.md §4.1), matching the teacher's own use of `base64` in its
/// storage/webauthn code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireImage {
    pub data_base64: String,
    pub codec: String,
    pub movement_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollWireRequest {
    pub realm: String,
    pub user_id: String,
    pub images: Vec<WireImage>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollWireResponse {
    pub template_id: u64,
    pub feature_vector_count: u32,
    pub encoder_version: String,
    pub action: String,
    pub rejected_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyWireRequest {
    pub realm: String,
    pub user_id: String,
    pub template_id: u64,
    pub images: Vec<WireImage>,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyWireResponse {
    pub matched: bool,
    pub score: f64,
    pub rejected_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTemplateWireRequest {
    pub realm: String,
    pub template_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStatusWireRequest {
    pub realm: String,
    pub template_id: u64,
    pub include_thumbnails: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStatusWireResponse {
    pub available: bool,
    pub enrolled_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub encoder_version: String,
    pub feature_vector_count: u32,
    pub thumbnails_stored: bool,
    pub thumbnails_base64: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTemplateTagsWireRequest {
    pub realm: String,
    pub template_id: u64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessWireRequest {
    pub realm: String,
    pub user_id: String,
    pub mode: String,
    pub images: Vec<WireImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessWireResponse {
    pub alive: bool,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthWireResponse {
    pub available: bool,
    pub average_latency_ms: f64,
    pub error_rate_1m: f64,
}
