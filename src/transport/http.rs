//! HTTP+JSON transport to the agent service

use super::{Transport, TransportError};
use crate::protocol::{ExecuteRequest, ExecuteResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const EXECUTE_PATH: &str = "/api/agent/execute";
const HEALTH_PATH: &str = "/api/health";

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn try_execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, TransportError> {
        let response = self
            .client
            .post(self.url(EXECUTE_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::http(
                status.as_u16(),
                error_text(status.as_u16(), &body),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;
        serde_json::from_str(&body)
            .map_err(|e| TransportError::malformed_body(format!("Malformed response from agent: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ExecuteRequest) -> ExecuteResponse {
        match self.try_execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    kind = %e.kind,
                    error = %e.message,
                    request = request.kind(),
                    "API execution error"
                );
                e.into_response()
            }
        }
    }

    async fn check_health(&self) -> bool {
        match self.client.get(self.url(HEALTH_PATH)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                false
            }
        }
    }
}

/// Best-effort human readable text for a non-2xx response: a JSON `message`
/// or `error` field, else the raw body, else the status line.
fn error_text(status: u16, body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => json_error_text(&value).unwrap_or_else(|| format!("HTTP Error {status}")),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => format!("HTTP Error {status}"),
    }
}

fn json_error_text(value: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| match value.get(key)? {
            Value::String(text) if !text.is_empty() => Some(text.clone()),
            // {"error": {"message": "..."}}
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
}
