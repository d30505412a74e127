//! Key types and the content-key unwrapping trait.
//!
//! This module provides:
//! - [`DecryptionKey`]: the recipient's RSA private key, redacted in `Debug`
//! - [`EncryptionKey`]: the recipient's RSA public key (mirror operation only)
//! - [`ContentKey`]: an unwrapped content-encryption key, zeroized on drop
//! - [`KeyUnwrapper`]: trait for recovering the CEK (local key or key service)

use crate::envelope::ALG_RSA_OAEP_256;
use crate::error::{CryptoError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// ContentKey
// ============================================================================

/// An unwrapped content-encryption key.
///
/// # Security
///
/// - Key material is zeroized on drop
/// - `Debug` never prints the bytes
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ContentKey(Vec<u8>);

impl ContentKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Expose the key bytes for the cipher.
    ///
    /// Do not store, log, or transmit the returned bytes.
    pub(crate) fn expose_secret(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("len", &self.0.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// DecryptionKey
// ============================================================================

/// The recipient's RSA private key.
///
/// Loaded once from configuration and immutable for the process lifetime.
/// `RsaPrivateKey` zeroizes its own limbs on drop.
#[derive(Clone)]
pub struct DecryptionKey {
    inner: RsaPrivateKey,
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl DecryptionKey {
    /// Load a private key from PEM (PKCS#8 `PRIVATE KEY` or PKCS#1 `RSA PRIVATE KEY`).
    ///
    /// Literal `\n` sequences are accepted in place of newlines, since keys
    /// delivered through environment variables are often flattened.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the PEM is not an RSA private key.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = normalize_pem(pem);
        let inner = RsaPrivateKey::from_pkcs8_pem(&pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
            .map_err(|_| CryptoError::invalid_key("not an RSA private key in PEM form"))?;
        Ok(Self { inner })
    }

    /// The matching public key.
    pub fn to_encryption_key(&self) -> EncryptionKey {
        EncryptionKey {
            inner: self.inner.to_public_key(),
        }
    }
}

#[async_trait]
impl KeyUnwrapper for DecryptionKey {
    async fn unwrap_key(&self, encrypted_key: &[u8]) -> Result<ContentKey> {
        let cek = self
            .inner
            .decrypt_blinded(&mut OsRng, Oaep::new::<Sha256>(), encrypted_key)
            .map_err(|_| CryptoError::decrypt_failed("content key unwrap failed"))?;
        Ok(ContentKey::new(cek))
    }

    fn describe(&self) -> &'static str {
        "local RSA key"
    }
}

// ============================================================================
// EncryptionKey
// ============================================================================

/// The recipient's RSA public key, used to wrap a fresh CEK.
#[derive(Debug, Clone)]
pub struct EncryptionKey {
    inner: RsaPublicKey,
}

impl EncryptionKey {
    /// Load a public key from PEM (SPKI `PUBLIC KEY` or PKCS#1 `RSA PUBLIC KEY`).
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = normalize_pem(pem);
        let inner = RsaPublicKey::from_public_key_pem(&pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(&pem))
            .map_err(|_| CryptoError::invalid_key("not an RSA public key in PEM form"))?;
        Ok(Self { inner })
    }

    /// Load a DER-encoded SPKI public key, as returned by key services.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = RsaPublicKey::from_public_key_der(der)
            .map_err(|_| CryptoError::invalid_key("not an RSA public key in DER form"))?;
        Ok(Self { inner })
    }

    /// Key id published with the key: the first 16 hex digits of the
    /// SHA-256 of the SPKI DER encoding.
    pub fn key_id(&self) -> Result<String> {
        let der = self
            .inner
            .to_public_key_der()
            .map_err(|_| CryptoError::invalid_key("public key cannot be DER encoded"))?;
        let digest = Sha256::digest(der.as_bytes());
        Ok(digest[..8].iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Public JWK for publishing in a key set.
    pub fn to_jwk(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "kty": "RSA",
            "use": "enc",
            "alg": ALG_RSA_OAEP_256,
            "kid": self.key_id()?,
            "n": URL_SAFE_NO_PAD.encode(self.inner.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(self.inner.e().to_bytes_be()),
        }))
    }

    pub(crate) fn wrap(&self, cek: &ContentKey) -> Result<Vec<u8>> {
        self.inner
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), cek.expose_secret())
            .map_err(|_| CryptoError::encrypt_failed("content key wrap failed"))
    }
}

fn normalize_pem(pem: &str) -> String {
    pem.trim().replace("\\n", "\n")
}

// ============================================================================
// KeyUnwrapper
// ============================================================================

/// Trait for recovering the content-encryption key from a JWE.
///
/// # Implementors
///
/// - [`DecryptionKey`]: RSA-OAEP-256 with a locally held private key
/// - `KmsKeyUnwrapper` (`kms` feature): delegates to an external key service
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one instance is shared by all
/// concurrent requests.
#[async_trait]
pub trait KeyUnwrapper: Send + Sync {
    /// Unwrap the encrypted CEK segment of an RSA-OAEP-256 envelope.
    async fn unwrap_key(&self, encrypted_key: &[u8]) -> Result<ContentKey>;

    /// Short label for logs.
    fn describe(&self) -> &'static str;
}
