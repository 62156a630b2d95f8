//! Transport error types

use crate::protocol::ExecuteResponse;
use std::fmt;
use thiserror::Error;

/// Shown when a failure carries no usable text of its own
pub const GENERIC_CONNECT_ERROR: &str = "Failed to connect to server.";

/// Transport error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            message: if message.trim().is_empty() {
                GENERIC_CONNECT_ERROR.to_string()
            } else {
                message
            },
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Http(status), message)
    }

    pub fn malformed_body(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::MalformedBody, message)
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        let message = error.to_string();
        if error.is_timeout() {
            Self::timeout(message)
        } else if error.is_decode() {
            Self::malformed_body(message)
        } else if let Some(status) = error.status() {
            Self::http(status.as_u16(), message)
        } else {
            Self::network(message)
        }
    }

    /// Fold the error into the FAILED response the caller sees
    pub fn into_response(self) -> ExecuteResponse {
        ExecuteResponse::failed(self.message)
    }
}

/// Error classification, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, DNS, TLS, reset
    Network,
    /// Request exceeded the client timeout
    Timeout,
    /// Non-2xx status from the service
    Http(u16),
    /// 2xx with a body that is not an execute response
    MalformedBody,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Network => f.write_str("network"),
            TransportErrorKind::Timeout => f.write_str("timeout"),
            TransportErrorKind::Http(status) => write!(f, "http {status}"),
            TransportErrorKind::MalformedBody => f.write_str("malformed body"),
        }
    }
}
