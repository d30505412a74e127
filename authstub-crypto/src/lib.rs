//! JWE envelope decryption for the authentication stubs.
//!
//! Inbound requests carry their signed request object inside a compact JWE.
//! This crate opens that envelope and, for scripts and tests, builds one.
//!
//! # Features
//!
//! - **RSA-OAEP-256 key management**: the content-encryption key is wrapped
//!   with the stub's RSA public key
//! - **AES-GCM content encryption**: `A256GCM` (default) and `A128GCM`
//! - **Pluggable key unwrapping**: [`KeyUnwrapper`] has a local-key
//!   implementation and, with the `kms` feature, an AWS KMS one
//! - **Secure key handling**: content keys are zeroized on drop via the
//!   `zeroize` crate; private keys are redacted in `Debug`
//!
//! # Quick Start
//!
//! ```ignore
//! use authstub_crypto::{decrypt_to_string, DecryptionKey};
//!
//! let key = DecryptionKey::from_pem(&std::env::var("IPV_PRIVATE_ENCRYPTION_KEY")?)?;
//! let signed_token = decrypt_to_string(envelope, &key).await?;
//! ```
//!
//! # Error Handling
//!
//! Errors are reported through [`CryptoError`], each with a stable
//! [`code`](CryptoError::code):
//!
//! - `ERR_JWE_INVALID`: malformed compact serialization
//! - `ERR_JOSE_NOT_SUPPORTED`: algorithm other than RSA-OAEP-256 / AES-GCM
//! - `ERR_JWE_DECRYPTION_FAILED`: wrong key or tampered envelope
//! - `ERR_JOSE_INVALID_KEY`, `ERR_KEY_SERVICE`: deployment problems

mod envelope;
mod error;
mod jwe;
mod key;
#[cfg(feature = "kms")]
mod kms;

pub use envelope::{CompactJwe, ContentEncryption, JweHeader, ALG_RSA_OAEP_256, NONCE_LEN, TAG_LEN};
pub use error::{CryptoError, Result};
pub use jwe::{decrypt, decrypt_to_string, encrypt};
pub use key::{ContentKey, DecryptionKey, EncryptionKey, KeyUnwrapper};
#[cfg(feature = "kms")]
pub use kms::KmsKeyUnwrapper;
