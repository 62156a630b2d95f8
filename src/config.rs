//! Client configuration from the environment

use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which transport reaches the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Http,
    /// In-process simulated agent
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, expected: &'static str, value: &str) -> Self {
        ConfigError::Invalid {
            var,
            expected,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub transport: TransportMode,
    /// Overrides the mock agent's simulated latency
    pub mock_latency: Option<Duration>,
    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            transport: TransportMode::Http,
            mock_latency: None,
            log_format: LogFormat::Compact,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Unset and blank variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get("AEGIS_API_BASE_URL") {
            config.api_base_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(secs) = get("AEGIS_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| {
                    ConfigError::invalid("AEGIS_REQUEST_TIMEOUT_SECS", "a positive integer", &secs)
                })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(mode) = get("AEGIS_TRANSPORT") {
            config.transport = match mode.trim().to_ascii_lowercase().as_str() {
                "http" => TransportMode::Http,
                "mock" => TransportMode::Mock,
                _ => {
                    return Err(ConfigError::invalid(
                        "AEGIS_TRANSPORT",
                        "'http' or 'mock'",
                        &mode,
                    ))
                }
            };
        }

        if let Some(ms) = get("AEGIS_MOCK_LATENCY_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                ConfigError::invalid("AEGIS_MOCK_LATENCY_MS", "a whole number of milliseconds", &ms)
            })?;
            config.mock_latency = Some(Duration::from_millis(ms));
        }

        if let Some(format) = get("AEGIS_LOG_FORMAT") {
            config.log_format = match format.trim().to_ascii_lowercase().as_str() {
                "compact" => LogFormat::Compact,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::invalid(
                        "AEGIS_LOG_FORMAT",
                        "'compact' or 'json'",
                        &format,
                    ))
                }
            };
        }

        Ok(config)
    }
}
