//! Error types for envelope decryption.
//!
//! These errors are designed to:
//! - Carry a machine-readable code that callers can surface verbatim
//! - Provide useful debugging information without leaking secrets
//! - Separate caller faults (bad envelope) from operator faults (bad key config)

use thiserror::Error;

/// Result type alias for envelope operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur while parsing, decrypting or encrypting a JWE.
///
/// Note: Error messages intentionally avoid including key material,
/// content-encryption keys or plaintext.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The compact envelope is malformed.
    ///
    /// This occurs when:
    /// - The envelope does not have exactly five segments
    /// - A segment is not valid base64url
    /// - The protected header is not a JSON object with `alg` and `enc`
    /// - The IV or tag has the wrong length
    #[error("Invalid JWE: {context}")]
    InvalidFormat {
        /// Description of what was wrong with the format.
        context: &'static str,
    },

    /// The envelope advertises an algorithm this system does not accept.
    #[error("Unsupported JOSE algorithm: {alg}")]
    UnsupportedAlgorithm {
        /// The `alg` or `enc` value found in the protected header.
        alg: String,
    },

    /// Decryption failed.
    ///
    /// This occurs when:
    /// - The envelope was encrypted to a different key
    /// - The ciphertext, IV, tag or header has been tampered with
    /// - The plaintext is not UTF-8 where a string was requested
    #[error("Decryption failed: {context}")]
    DecryptFailed {
        /// Description of what went wrong.
        context: &'static str,
    },

    /// Encryption failed.
    #[error("Encryption failed: {context}")]
    EncryptFailed {
        /// Description of what went wrong.
        context: &'static str,
    },

    /// Configured key material could not be loaded.
    #[error("Invalid key: {context}")]
    InvalidKey {
        /// Description of what was wrong with the key.
        context: &'static str,
    },

    /// The external key service rejected or failed the unwrap request.
    #[error("Key service error: {message}")]
    KeyService {
        /// Error reported by the key service client.
        message: String,
    },
}

impl CryptoError {
    /// Create an invalid format error.
    pub fn invalid_format(context: &'static str) -> Self {
        Self::InvalidFormat { context }
    }

    /// Create an unsupported algorithm error.
    pub fn unsupported(alg: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm { alg: alg.into() }
    }

    /// Create a decryption failed error.
    pub fn decrypt_failed(context: &'static str) -> Self {
        Self::DecryptFailed { context }
    }

    /// Create an encryption failed error.
    pub fn encrypt_failed(context: &'static str) -> Self {
        Self::EncryptFailed { context }
    }

    /// Create an invalid key error.
    pub fn invalid_key(context: &'static str) -> Self {
        Self::InvalidKey { context }
    }

    /// Create a key service error.
    pub fn key_service(message: impl Into<String>) -> Self {
        Self::KeyService {
            message: message.into(),
        }
    }

    /// Machine-readable error code, in the JOSE library vocabulary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat { .. } => "ERR_JWE_INVALID",
            Self::UnsupportedAlgorithm { .. } => "ERR_JOSE_NOT_SUPPORTED",
            Self::DecryptFailed { .. } => "ERR_JWE_DECRYPTION_FAILED",
            Self::EncryptFailed { .. } => "ERR_JWE_ENCRYPTION_FAILED",
            Self::InvalidKey { .. } => "ERR_JOSE_INVALID_KEY",
            Self::KeyService { .. } => "ERR_KEY_SERVICE",
        }
    }

    /// Whether the error was caused by the envelope the caller sent.
    ///
    /// Key loading and key service failures are operator faults: the
    /// service is mis-deployed, not the request malformed.
    pub fn is_caller_fault(&self) -> bool {
        !matches!(self, Self::InvalidKey { .. } | Self::KeyService { .. })
    }
}
