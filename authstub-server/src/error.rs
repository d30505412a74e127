//! Server error types with HTTP status code mapping

use authstub_credential::CredentialError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Server error type with HTTP status mapping
#[derive(Error, Debug)]
pub enum ServerError {
    /// Credential layer error (status decided by its fault class)
    #[error("{0}")]
    Credential(#[from] CredentialError),

    /// The request was rejected by validation
    #[error("{0}")]
    Invalid(String),

    /// Missing or malformed request parameter
    #[error("{0}")]
    BadRequest(String),

    /// The stub is not configured to serve this request
    #[error("{0}")]
    Configuration(String),
}

impl ServerError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Credential(e) => e.code(),
            ServerError::Invalid(_) => "ERR_VALIDATION",
            ServerError::BadRequest(_) => "ERR_BAD_REQUEST",
            ServerError::Configuration(_) => "ERR_CONFIGURATION",
        }
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Credential(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ServerError::Invalid(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Create a bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ServerError::BadRequest(msg.into())
    }

    /// Create a configuration error (500)
    pub fn configuration(msg: impl Into<String>) -> Self {
        ServerError::Configuration(msg.into())
    }
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// HTTP status code
    pub status: u16,
    /// Machine-readable error code
    pub code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            status: status.as_u16(),
            code: self.code().to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServerError::Invalid("nope".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::configuration("no key").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServerError::from(CredentialError::NoSigningKey {
                descriptor: "IPV".into()
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServerError::from(CredentialError::InvalidSignature).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(ServerError::bad_request("x").code(), "ERR_BAD_REQUEST");
        assert_eq!(
            ServerError::from(CredentialError::KeyNotFound { kid: "k".into() }).code(),
            "ERR_JWKS_NO_MATCHING_KEY"
        );
    }
}
