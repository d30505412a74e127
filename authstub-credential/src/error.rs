//! Error types for token verification
//!
//! Business-rule failures (a claim with the wrong value) are not errors; they
//! come back as [`ValidationOutcome::Invalid`](crate::ValidationOutcome).
//! Everything here is either a caller fault (400) or an operator fault (500).

use crate::claims::ValidationOutcome;
use authstub_crypto::CryptoError;
use thiserror::Error;

/// Error type for key resolution and signature verification
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Not a compact JWS, or the header could not be decoded
    #[error("Invalid JWS: {0}")]
    InvalidJws(String),

    /// The token is signed with an algorithm the resolved key does not support
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature did not verify against the resolved key
    #[error("signature verification failed")]
    InvalidSignature,

    /// The token names a kid the key set does not contain
    #[error("Key not found in JWKS for provided kid")]
    KeyNotFound {
        /// The kid from the token header
        kid: String,
    },

    /// The key set entry matching the kid could not be imported
    #[error("Invalid JWK for kid {kid}: {reason}")]
    InvalidJwk { kid: String, reason: String },

    /// Neither a usable key set nor a fallback key is available
    #[error("No signing key available for {descriptor}")]
    NoSigningKey {
        /// Logical counterparty name
        descriptor: String,
    },

    /// Configured key material could not be parsed
    #[error("Invalid signing key configuration for {descriptor}: {reason}")]
    InvalidKeyConfig { descriptor: String, reason: String },

    /// The key store has no descriptor under this name
    #[error("Unknown key descriptor: {0}")]
    UnknownDescriptor(String),

    /// The HTTP client for key set fetches could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Signing an outbound token failed (scripts and tests only)
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Envelope decryption failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl CredentialError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidJws(_) => "ERR_JWS_INVALID",
            Self::UnsupportedAlgorithm(_) => "ERR_JOSE_NOT_SUPPORTED",
            Self::InvalidSignature => "ERR_JWS_SIGNATURE_VERIFICATION_FAILED",
            Self::KeyNotFound { .. } => "ERR_JWKS_NO_MATCHING_KEY",
            Self::InvalidJwk { .. } => "ERR_JWK_INVALID",
            Self::NoSigningKey { .. }
            | Self::InvalidKeyConfig { .. }
            | Self::UnknownDescriptor(_)
            | Self::HttpClient(_)
            | Self::Signing(_) => "ERR_CONFIGURATION",
            Self::Crypto(e) => e.code(),
        }
    }

    /// Whether the service is mis-deployed rather than the request malformed
    pub fn is_configuration_fault(&self) -> bool {
        match self {
            Self::NoSigningKey { .. }
            | Self::InvalidKeyConfig { .. }
            | Self::UnknownDescriptor(_)
            | Self::HttpClient(_)
            | Self::Signing(_) => true,
            Self::Crypto(e) => !e.is_caller_fault(),
            _ => false,
        }
    }

    /// HTTP status code for this error
    ///
    /// - 400: malformed envelope or token, bad signature, unknown kid
    /// - 500: missing or unusable configuration
    pub fn status_code(&self) -> u16 {
        if self.is_configuration_fault() {
            500
        } else {
            400
        }
    }

    /// Fold a caller fault into [`ValidationOutcome::Invalid`].
    ///
    /// Configuration faults are returned unchanged as `Err`.
    pub fn into_outcome(self) -> Result<ValidationOutcome> {
        if self.is_configuration_fault() {
            return Err(self);
        }
        tracing::info!(code = self.code(), error = %self, "token rejected");
        Ok(ValidationOutcome::Invalid(self.to_string()))
    }
}

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;
