//! Transport to the agent service
//!
//! A transport turns one request into one typed response. It never fails:
//! network errors, bad status codes and malformed bodies are all folded into
//! a FAILED response, so callers treat "the network broke" and "the agent
//! reported failure" the same way.

mod error;
mod http;
mod mock_agent;

pub use error::TransportError;
pub use http::HttpTransport;
pub use mock_agent::MockAgentTransport;

use crate::protocol::{ExecuteRequest, ExecuteResponse, ResponseStatus};
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for reaching the agent service
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request. Failures come back as FAILED responses.
    async fn execute(&self, request: &ExecuteRequest) -> ExecuteResponse;

    /// Whether the service is reachable and healthy
    async fn check_health(&self) -> bool;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: &ExecuteRequest) -> ExecuteResponse {
        (**self).execute(request).await
    }

    async fn check_health(&self) -> bool {
        (**self).check_health().await
    }
}

/// Logging wrapper for transports
pub struct LoggingTransport {
    inner: Arc<dyn Transport>,
    name: String,
}

impl LoggingTransport {
    pub fn new(inner: Arc<dyn Transport>, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn execute(&self, request: &ExecuteRequest) -> ExecuteResponse {
        let start = std::time::Instant::now();
        let response = self.inner.execute(request).await;
        let duration = start.elapsed();

        match response.status() {
            ResponseStatus::Failed => {
                tracing::warn!(
                    transport = %self.name,
                    kind = request.kind(),
                    execution_id = ?request.execution_id(),
                    duration_ms = %duration.as_millis(),
                    status = %response.status(),
                    "Agent request failed"
                );
            }
            status => {
                tracing::info!(
                    transport = %self.name,
                    kind = request.kind(),
                    duration_ms = %duration.as_millis(),
                    server_duration_ms = ?response.duration_ms,
                    skill = ?response.skill_id,
                    status = %status,
                    "Agent request completed"
                );
            }
        }

        response
    }

    async fn check_health(&self) -> bool {
        let available = self.inner.check_health().await;
        tracing::debug!(transport = %self.name, available, "Health check");
        available
    }
}
