//! Remote status and verification client

use crate::config::GateConfig;
use serde::{Deserialize, Serialize};

/// Gate status as reported by the exam backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStatus {
    #[serde(rename = "enable")]
    pub enabled: bool,

    /// Host or URL fragment of the exam content
    #[serde(rename = "ip", default)]
    pub location_hint: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    password: &'a str,
}

/// Broad failure class of a remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Protocol,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected status code {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Transport(_) | ApiError::Timeout => FailureKind::Transport,
            ApiError::Status(_) | ApiError::Malformed(_) => FailureKind::Protocol,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Malformed(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Exam backend boundary
#[async_trait::async_trait]
pub trait GateApi: Send + Sync {
    async fn fetch_status(&self) -> Result<GateStatus, ApiError>;

    /// Submit a password and return the raw response status code.
    ///
    /// Rejections are status codes, not errors; only failures to get any
    /// response at all are reported as `Err`.
    async fn verify(&self, password: &str) -> Result<u16, ApiError>;
}

/// `GateApi` over HTTP/JSON
pub struct HttpGateApi {
    client: reqwest::Client,
    status_url: String,
    verify_url: String,
}

impl HttpGateApi {
    pub fn new(config: &GateConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            status_url: config.status_url(),
            verify_url: config.verify_url(),
        })
    }
}

#[async_trait::async_trait]
impl GateApi for HttpGateApi {
    async fn fetch_status(&self) -> Result<GateStatus, ApiError> {
        let response = self.client.get(&self.status_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: GateStatus =
            serde_json::from_slice(&body).map_err(|e| ApiError::Malformed(e.to_string()))?;

        tracing::debug!("Status response: {:?}", parsed);
        Ok(parsed)
    }

    async fn verify(&self, password: &str) -> Result<u16, ApiError> {
        let response = self
            .client
            .post(&self.verify_url)
            .json(&VerifyRequest { password })
            .send()
            .await?;

        let code = response.status().as_u16();
        tracing::debug!("Verify response status: {}", code);
        Ok(code)
    }
}
