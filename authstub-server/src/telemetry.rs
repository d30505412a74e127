//! Logging setup and request correlation helpers
//!
//! Tokens and envelopes are never logged verbatim; [`mask_sensitive_data`]
//! applies the configured policy first.

use crate::config::ServerConfig;
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Primary log filter (RUST_LOG env var)
    pub log_filter: String,
    /// Fallback log level if RUST_LOG not set
    pub default_level: String,
    /// Request ID header name (default: "x-request-id")
    pub request_id_header: String,
    /// Log format ("human" or "json")
    pub log_format: LogFormat,
    /// How token material is rendered in logs
    pub sensitive_data: SensitiveDataHandling,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensitiveDataHandling {
    /// Show all data
    Off,
    /// Mask sensitive fields (default)
    Mask,
    /// Hash sensitive data
    Hash,
}

impl TelemetryConfig {
    /// Create telemetry config honoring the server's `--log-level`
    pub fn with_server_config(server_config: &ServerConfig) -> Self {
        let rust_log = env::var("RUST_LOG").unwrap_or_default();
        let default_level = if rust_log.is_empty() {
            env::var("LOG_LEVEL").unwrap_or_else(|_| server_config.log_level.clone())
        } else {
            server_config.log_level.clone()
        };

        Self::from_env_with_defaults(default_level)
    }

    fn from_env_with_defaults(default_level: String) -> Self {
        Self {
            log_filter: env::var("RUST_LOG").unwrap_or_default(),
            default_level,
            request_id_header: env::var("LOG_REQUEST_ID_HEADER")
                .unwrap_or_else(|_| "x-request-id".to_string()),
            log_format: match env::var("LOG_FORMAT")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Human,
            },
            sensitive_data: match env::var("LOG_SENSITIVE_DATA")
                .unwrap_or_else(|_| "mask".to_string())
                .to_lowercase()
                .as_str()
            {
                "off" => SensitiveDataHandling::Off,
                "hash" => SensitiveDataHandling::Hash,
                _ => SensitiveDataHandling::Mask,
            },
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let default_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        Self::from_env_with_defaults(default_level)
    }
}

/// Initialize logging
///
/// Safe to call multiple times - will only initialize once.
pub fn init_logging(config: &TelemetryConfig) {
    // Check if a global subscriber is already set (e.g., from tests)
    if tracing::dispatcher::has_been_set() {
        tracing::debug!("tracing subscriber already initialized, skipping");
        return;
    }

    let filter = if config.log_filter.is_empty() {
        EnvFilter::new(&config.default_level)
    } else {
        EnvFilter::new(&config.log_filter)
    };

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Human => tracing_subscriber::fmt::layer().compact().boxed(),
    };

    // try_init: another thread may have won the race since has_been_set()
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Extract request ID from headers
///
/// Checks the configured header, then `x-amzn-trace-id`, then `x-trace-id`.
pub fn extract_request_id(
    headers: &axum::http::HeaderMap,
    config: &TelemetryConfig,
) -> Option<String> {
    [
        config.request_id_header.as_str(),
        "x-amzn-trace-id",
        "x-trace-id",
    ]
    .iter()
    .find_map(|name| headers.get(*name)?.to_str().ok().map(str::to_string))
}

/// Create a request span with correlation context
pub fn create_request_span(operation: &str, request_id: Option<&str>) -> tracing::Span {
    tracing::info_span!(
        "request",
        operation = operation,
        request_id = request_id,
        outcome = tracing::field::Empty,
        error_code = tracing::field::Empty,
    )
}

/// Record how a request ended on its span
pub fn record_outcome(span: &tracing::Span, outcome: &str, error_code: Option<&str>) {
    span.record("outcome", outcome);
    if let Some(code) = error_code {
        span.record("error_code", code);
    }
}

/// Render token material for logs according to the configured policy
pub fn mask_sensitive_data(data: &str, handling: &SensitiveDataHandling) -> String {
    match handling {
        SensitiveDataHandling::Off => data.to_string(),
        SensitiveDataHandling::Mask => {
            // Enough of the head to correlate with a client log, never a full segment
            let head: String = data.chars().take(8).collect();
            format!("{head}...({} chars)", data.len())
        }
        SensitiveDataHandling::Hash => {
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};
            let mut hasher = DefaultHasher::new();
            data.hash(&mut hasher);
            format!("{:x}", hasher.finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_extract_request_id() {
        let config = TelemetryConfig::default();
        let mut headers = HeaderMap::new();

        headers.insert("x-request-id", "test-123".parse().unwrap());
        assert_eq!(
            extract_request_id(&headers, &config),
            Some("test-123".to_string())
        );

        // AWS header fallback
        let mut headers = HeaderMap::new();
        headers.insert("x-amzn-trace-id", "aws-456".parse().unwrap());
        assert_eq!(
            extract_request_id(&headers, &config),
            Some("aws-456".to_string())
        );

        assert_eq!(extract_request_id(&HeaderMap::new(), &config), None);
    }

    #[test]
    fn test_mask_sensitive_data() {
        let token = "eyJhbGciOiJSU0EtT0FFUC0yNTYifQ.secret";

        assert_eq!(
            mask_sensitive_data(token, &SensitiveDataHandling::Off),
            token
        );

        let masked = mask_sensitive_data(token, &SensitiveDataHandling::Mask);
        assert_eq!(masked, format!("eyJhbGci...({} chars)", token.len()));
        assert!(!masked.contains("secret"));

        let hashed = mask_sensitive_data(token, &SensitiveDataHandling::Hash);
        assert_ne!(hashed, token);
        assert_eq!(
            mask_sensitive_data(token, &SensitiveDataHandling::Hash),
            hashed
        );
    }
}
