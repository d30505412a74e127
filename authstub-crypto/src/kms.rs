//! AWS KMS content-key unwrapping (`kms` feature).
//!
//! The RSA private key never leaves KMS; the encrypted CEK segment is sent
//! to `Decrypt` with `RSAES_OAEP_SHA_256` and the plaintext CEK returned.

use crate::error::{CryptoError, Result};
use crate::key::{ContentKey, EncryptionKey, KeyUnwrapper};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::EncryptionAlgorithmSpec;
use aws_sdk_kms::Client;

/// Unwraps content keys with an asymmetric KMS key.
#[derive(Debug, Clone)]
pub struct KmsKeyUnwrapper {
    client: Client,
    key_id: String,
}

impl KmsKeyUnwrapper {
    /// Create an unwrapper from an existing SDK config.
    pub fn new(sdk_config: &aws_config::SdkConfig, key_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(sdk_config),
            key_id: key_id.into(),
        }
    }

    /// Create an unwrapper using the default AWS credential chain.
    pub async fn from_env(key_id: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(&sdk_config, key_id)
    }

    /// Fetch the public half of the KMS key for publishing.
    pub async fn public_key(&self) -> Result<EncryptionKey> {
        let response = self
            .client
            .get_public_key()
            .key_id(&self.key_id)
            .send()
            .await
            .map_err(|e| {
                CryptoError::key_service(format!("Failed to get public key from KMS: {e}"))
            })?;
        let der = response
            .public_key()
            .ok_or_else(|| CryptoError::key_service("No public key returned from KMS"))?;
        EncryptionKey::from_der(der.as_ref())
    }
}

#[async_trait]
impl KeyUnwrapper for KmsKeyUnwrapper {
    async fn unwrap_key(&self, encrypted_key: &[u8]) -> Result<ContentKey> {
        let response = self
            .client
            .decrypt()
            .key_id(&self.key_id)
            .ciphertext_blob(Blob::new(encrypted_key.to_vec()))
            .encryption_algorithm(EncryptionAlgorithmSpec::RsaesOaepSha256)
            .send()
            .await
            .map_err(|e| {
                // A ciphertext KMS cannot open was wrapped for someone else
                if e.as_service_error()
                    .is_some_and(|se| se.is_invalid_ciphertext_exception())
                {
                    CryptoError::decrypt_failed("content key unwrap failed")
                } else {
                    tracing::error!(key_id = %self.key_id, error = %e, "KMS decrypt failed");
                    CryptoError::key_service(format!("Failed to decrypt with KMS: {e}"))
                }
            })?;

        let plaintext = response
            .plaintext()
            .ok_or_else(|| CryptoError::key_service("No plaintext returned from KMS decrypt"))?;
        Ok(ContentKey::new(plaintext.as_ref().to_vec()))
    }

    fn describe(&self) -> &'static str {
        "AWS KMS"
    }
}
