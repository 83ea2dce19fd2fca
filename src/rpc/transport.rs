use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::rpc::types::{
    DeleteTemplateWireRequest, EnrollWireRequest, EnrollWireResponse, HealthWireResponse,
    LivenessWireRequest, LivenessWireResponse, SetTemplateTagsWireRequest, TemplateStatusWireRequest,
    TemplateStatusWireResponse, VerifyWireRequest, VerifyWireResponse,
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transient transport failure: {0}")]
    Transient(String),
    #[error("permanent transport failure: {0}")]
    Permanent(String),
    /// The target resource does not exist on BWS. Distinct from a generic
    /// `Permanent` failure because `delete_template` treats it as idempotent
    /// success (spec §4.5: "on BWS not-found, the deletion is treated as
    /// idempotent success") rather than as an error to surface.
    #[error("resource not found on BWS")]
    NotFound,
}

/// The seam the spec's design notes describe as "a thin hand-written client
/// that calls the generated transport layer" (SPEC_FULL.md §4.1). `BwsClient`
/// is generic over this trait so the wire format BWS actually uses can be
/// swapped in without touching retry/circuit-breaker/failover logic.
#[async_trait]
pub trait BwsTransport: Send + Sync {
    async fn enroll(&self, bearer: &str, req: EnrollWireRequest) -> Result<EnrollWireResponse, TransportError>;

    async fn verify(&self, bearer: &str, req: VerifyWireRequest) -> Result<VerifyWireResponse, TransportError>;

    /// Returns `Err(TransportError::NotFound)` rather than `Ok(())` when BWS
    /// has no such template, so `BwsClient::delete_template` can surface that
    /// as `AlreadyAbsent` instead of an error.
    async fn delete_template(&self, bearer: &str, req: DeleteTemplateWireRequest) -> Result<(), TransportError>;

    async fn template_status(
        &self,
        bearer: &str,
        req: TemplateStatusWireRequest,
    ) -> Result<TemplateStatusWireResponse, TransportError>;

    async fn score_liveness(&self, bearer: &str, req: LivenessWireRequest) -> Result<LivenessWireResponse, TransportError>;

    async fn service_health(&self, bearer: &str) -> Result<HealthWireResponse, TransportError>;

    async fn set_template_tags(&self, bearer: &str, req: SetTemplateTagsWireRequest) -> Result<(), TransportError>;
}

/// Default transport: HTTPS + bearer header over JSON bodies, via `reqwest`
/// (already a teacher dependency, used the same way for its OAuth2 client
/// flows).
pub struct HttpBwsTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBwsTransport {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration should be valid");
        HttpBwsTransport { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send_json<Req: serde::Serialize + Sync, Resp: serde::de::DeserializeOwned>(
        &self,
        bearer: &str,
        path: &str,
        body: &Req,
    ) -> Result<Resp, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(TransportError::Transient(format!("BWS returned {status}")));
        }
        if !status.is_success() {
            return Err(TransportError::Permanent(format!("BWS returned {status}")));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| TransportError::Permanent(format!("malformed BWS response: {e}")))
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() || err.is_connect() {
        TransportError::Transient(err.to_string())
    } else {
        TransportError::Permanent(err.to_string())
    }
}

#[async_trait]
impl BwsTransport for HttpBwsTransport {
    async fn enroll(&self, bearer: &str, req: EnrollWireRequest) -> Result<EnrollWireResponse, TransportError> {
        self.send_json(bearer, "/v1/enroll", &req).await
    }

    async fn verify(&self, bearer: &str, req: VerifyWireRequest) -> Result<VerifyWireResponse, TransportError> {
        self.send_json(bearer, "/v1/verify", &req).await
    }

    async fn delete_template(&self, bearer: &str, req: DeleteTemplateWireRequest) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.url("/v1/templates/delete"))
            .bearer_auth(bearer)
            .json(&req)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(TransportError::NotFound);
        }
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(TransportError::Transient(format!("BWS returned {status}")));
        }
        if !status.is_success() {
            return Err(TransportError::Permanent(format!("BWS returned {status}")));
        }
        Ok(())
    }

    async fn template_status(
        &self,
        bearer: &str,
        req: TemplateStatusWireRequest,
    ) -> Result<TemplateStatusWireResponse, TransportError> {
        self.send_json(bearer, "/v1/templates/status", &req).await
    }

    async fn score_liveness(&self, bearer: &str, req: LivenessWireRequest) -> Result<LivenessWireResponse, TransportError> {
        self.send_json(bearer, "/v1/liveness/score", &req).await
    }

    async fn service_health(&self, bearer: &str) -> Result<HealthWireResponse, TransportError> {
        self.send_json(bearer, "/v1/health", &serde_json::json!({})).await
    }

    async fn set_template_tags(&self, bearer: &str, req: SetTemplateTagsWireRequest) -> Result<(), TransportError> {
        let _: serde_json::Value = self.send_json(bearer, "/v1/templates/tags", &req).await?;
        Ok(())
    }
}
