use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::client::api::SessionKeyApi;
use crate::crypto::secret::SessionSecret;
use crate::error::ProtocolError;

#[derive(Deserialize)]
struct IssueResponse {
    session_key: String,
    ttl_seconds: u64,
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    session_key: &'a str,
}

#[derive(Deserialize)]
struct CheckResponse {
    teacher_id: i64,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for `/api/session/create` and `/api/session/check`.
#[derive(Clone)]
pub struct HttpSessionKeyApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionKeyApi {
    /// Creates a client for the server at `base_url`.
    ///
    /// `request_timeout` bounds each request at the transport level; the rotation
    /// controller applies its own deadline on top.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Statuses that mean the server no longer accepts the session key.
///
/// Throttling, timeouts and server errors say nothing about the key itself.
fn is_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::GONE
    )
}

/// Pulls `{"error": "..."}` out of a failed response, falling back to the status line.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.bytes().await {
        Ok(body) => sonic_rs::from_slice::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| format!("HTTP {}", status)),
        Err(_) => format!("HTTP {}", status),
    }
}

#[async_trait]
impl SessionKeyApi for HttpSessionKeyApi {
    async fn issue(&self, teacher_credential: &str) -> Result<SessionSecret, ProtocolError> {
        tracing::debug!("🔑 Requesting session key");

        let response = self
            .client
            .post(self.url("/api/session/create"))
            .bearer_auth(teacher_credential)
            .send()
            .await
            .map_err(|e| ProtocolError::IssuanceUnavailable(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProtocolError::IssuanceUnauthorized);
            }
            status if !status.is_success() => {
                return Err(ProtocolError::IssuanceUnavailable(error_message(response).await));
            }
            _ => {}
        }

        let body = Zeroizing::new(
            response
                .bytes()
                .await
                .map_err(|e| ProtocolError::IssuanceUnavailable(e.to_string()))?
                .to_vec(),
        );
        let issued: IssueResponse = sonic_rs::from_slice(&body)
            .map_err(|e| ProtocolError::IssuanceUnavailable(format!("malformed response: {}", e)))?;

        if issued.ttl_seconds == 0 {
            return Err(ProtocolError::IssuanceUnavailable(
                "issued session key has no lifetime".to_string(),
            ));
        }

        tracing::info!("✅ Session key issued (ttl {}s)", issued.ttl_seconds);
        Ok(SessionSecret::new(issued.session_key, issued.ttl_seconds))
    }

    async fn check(&self, secret: &SessionSecret) -> Result<i64, ProtocolError> {
        // Serialized once and moved into the request, which owns the only copy.
        let body = sonic_rs::to_vec(&CheckRequest {
            session_key: secret.expose(),
        })
        .map_err(|e| ProtocolError::CheckUnavailable(e.to_string()))?;

        let response = self
            .client
            .post(self.url("/api/session/check"))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ProtocolError::CheckUnavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            status if is_rejection(status) => {
                return Err(ProtocolError::SecretRejected(error_message(response).await));
            }
            _ => return Err(ProtocolError::CheckUnavailable(error_message(response).await)),
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProtocolError::CheckUnavailable(e.to_string()))?;
        let checked: CheckResponse = sonic_rs::from_slice(&bytes)
            .map_err(|e| ProtocolError::CheckUnavailable(format!("malformed response: {}", e)))?;

        Ok(checked.teacher_id)
    }
}
