//! Compact JWE envelope format.
//!
//! ## Envelope Layout
//!
//! ```text
//! BASE64URL(header) . BASE64URL(encrypted CEK) . BASE64URL(IV) . BASE64URL(ciphertext) . BASE64URL(tag)
//! └──────┬────────┘
//!        AAD (the ASCII header segment, authenticated but not encrypted)
//! ```
//!
//! - **Header**: JSON object, at least `{"alg":"RSA-OAEP-256","enc":"A256GCM"}`
//! - **Encrypted CEK**: content-encryption key wrapped with the recipient's RSA key
//! - **IV**: 12-byte GCM nonce
//! - **Ciphertext**: AES-GCM output without the tag
//! - **Tag**: 16-byte GCM authentication tag

use crate::error::{CryptoError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Number of `.`-separated segments in a compact JWE.
pub const SEGMENT_COUNT: usize = 5;

/// Size of the IV for AES-GCM.
pub const NONCE_LEN: usize = 12;

/// Size of the authentication tag for AES-GCM.
pub const TAG_LEN: usize = 16;

/// The only key-management algorithm accepted.
pub const ALG_RSA_OAEP_256: &str = "RSA-OAEP-256";

// ============================================================================
// Algorithms
// ============================================================================

/// Content-encryption algorithm advertised in the `enc` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncryption {
    /// AES-128 in GCM mode.
    A128Gcm,
    /// AES-256 in GCM mode.
    A256Gcm,
}

impl ContentEncryption {
    /// Parse the `enc` header value.
    pub fn from_header(enc: &str) -> Result<Self> {
        match enc {
            "A128GCM" => Ok(Self::A128Gcm),
            "A256GCM" => Ok(Self::A256Gcm),
            other => Err(CryptoError::unsupported(other)),
        }
    }

    /// Header value for this algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A128Gcm => "A128GCM",
            Self::A256Gcm => "A256GCM",
        }
    }

    /// Required content-encryption key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            Self::A128Gcm => 16,
            Self::A256Gcm => 32,
        }
    }
}

// ============================================================================
// Protected header
// ============================================================================

/// Decoded JWE protected header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweHeader {
    /// Key-management algorithm.
    pub alg: String,
    /// Content-encryption algorithm.
    pub enc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Content type; `JWT` when the plaintext is a nested signed token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
}

impl JweHeader {
    /// Header for an RSA-OAEP-256 wrapped envelope.
    pub fn rsa_oaep_256(enc: ContentEncryption) -> Self {
        Self {
            alg: ALG_RSA_OAEP_256.to_string(),
            enc: enc.as_str().to_string(),
            kid: None,
            typ: None,
            cty: None,
        }
    }

    /// Check the advertised algorithms against what this system accepts.
    pub fn algorithms(&self) -> Result<ContentEncryption> {
        if self.alg != ALG_RSA_OAEP_256 {
            return Err(CryptoError::unsupported(self.alg.clone()));
        }
        ContentEncryption::from_header(&self.enc)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// A compact JWE split into its decoded parts.
#[derive(Debug, Clone)]
pub struct CompactJwe {
    /// Decoded protected header.
    pub header: JweHeader,
    /// The header segment exactly as received; used as AAD.
    pub protected: String,
    pub encrypted_key: Vec<u8>,
    pub iv: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl CompactJwe {
    /// Parse and validate a compact JWE.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidFormat` if:
    /// - The envelope does not have exactly five segments
    /// - Any segment is not base64url (no padding)
    /// - The header is not JSON with `alg` and `enc`
    /// - The encrypted key is empty
    /// - The IV is not 12 bytes or the tag is not 16 bytes
    pub fn parse(envelope: &str) -> Result<Self> {
        // 1. Split into segments
        let parts: Vec<&str> = envelope.trim().split('.').collect();
        if parts.len() != SEGMENT_COUNT {
            return Err(CryptoError::invalid_format(
                "compact envelope must have five segments",
            ));
        }

        // 2. Decode the protected header
        let header_bytes = decode_segment(parts[0], "protected header is not base64url")?;
        let header: JweHeader = serde_json::from_slice(&header_bytes)
            .map_err(|_| {
                CryptoError::invalid_format("protected header is not a valid JSON object")
            })?;

        // 3. Decode the remaining segments
        let encrypted_key = decode_segment(parts[1], "encrypted key is not base64url")?;
        if encrypted_key.is_empty() {
            return Err(CryptoError::invalid_format("encrypted key is empty"));
        }

        let iv: [u8; NONCE_LEN] = decode_segment(parts[2], "IV is not base64url")?
            .try_into()
            .map_err(|_| CryptoError::invalid_format("IV must be 12 bytes"))?;

        let ciphertext = decode_segment(parts[3], "ciphertext is not base64url")?;

        let tag: [u8; TAG_LEN] = decode_segment(parts[4], "tag is not base64url")?
            .try_into()
            .map_err(|_| CryptoError::invalid_format("authentication tag must be 16 bytes"))?;

        Ok(Self {
            header,
            protected: parts[0].to_string(),
            encrypted_key,
            iv,
            ciphertext,
            tag,
        })
    }

    /// Ciphertext followed by the tag, the layout AES-GCM expects.
    pub fn sealed(&self) -> Vec<u8> {
        let mut sealed = Vec::with_capacity(self.ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(&self.ciphertext);
        sealed.extend_from_slice(&self.tag);
        sealed
    }

    /// Serialize back to compact form.
    pub fn to_compact(&self) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            self.protected,
            URL_SAFE_NO_PAD.encode(&self.encrypted_key),
            URL_SAFE_NO_PAD.encode(self.iv),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
            URL_SAFE_NO_PAD.encode(self.tag),
        )
    }
}

fn decode_segment(segment: &str, context: &'static str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| CryptoError::invalid_format(context))
}
