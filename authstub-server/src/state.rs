//! Application state management
//!
//! Everything here is built once at startup and immutable afterwards. The
//! only interior mutability is the optional key set cache inside
//! [`KeyStore`].

use crate::config::{load_key_material, ServerConfig};
use crate::error::{Result, ServerError};
use crate::telemetry::TelemetryConfig;
use authstub_credential::{
    CompositeValidator, KeyStore, ReverificationValidator, ValidationContext,
};
use authstub_crypto::{CryptoError, DecryptionKey, EncryptionKey, KeyUnwrapper};
#[cfg(feature = "kms")]
use authstub_crypto::KmsKeyUnwrapper;
use std::sync::Arc;
use std::time::Instant;

/// Where a flow's envelope decryption key lives
#[derive(Debug, Clone)]
pub enum DecryptionSource {
    /// PEM private key from configuration
    Local(DecryptionKey),
    /// Asymmetric key held by AWS KMS
    #[cfg(feature = "kms")]
    Kms(KmsKeyUnwrapper),
}

impl DecryptionSource {
    pub fn unwrapper(&self) -> &dyn KeyUnwrapper {
        match self {
            DecryptionSource::Local(key) => key,
            #[cfg(feature = "kms")]
            DecryptionSource::Kms(kms) => kms,
        }
    }

    /// Public half, for publishing to request builders
    pub async fn public_key(&self) -> std::result::Result<EncryptionKey, CryptoError> {
        match self {
            DecryptionSource::Local(key) => Ok(key.to_encryption_key()),
            #[cfg(feature = "kms")]
            DecryptionSource::Kms(kms) => kms.public_key().await,
        }
    }
}

/// Application state shared across all request handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Telemetry configuration
    pub telemetry_config: TelemetryConfig,
    /// Verification keys for every counterparty
    pub keys: Arc<KeyStore>,
    /// Account management flow
    pub amc: CompositeValidator,
    /// Identity proofing reverification flow
    pub ipv: ReverificationValidator,
    /// Opens account management envelopes
    pub amc_decryption: Option<DecryptionSource>,
    /// Opens reverification envelopes
    pub ipv_decryption: Option<DecryptionSource>,
    /// Server start time (for uptime)
    pub start_time: Instant,
}

impl AppState {
    /// Build state from configuration
    ///
    /// Fails on key material that is present but unusable. Absent material
    /// is reported per request instead.
    pub async fn new(config: ServerConfig, telemetry_config: TelemetryConfig) -> Result<Self> {
        let descriptors = config
            .key_descriptors()
            .map_err(ServerError::configuration)?;
        let keys = Arc::new(KeyStore::new(descriptors, config.key_store_config())?);

        let context = ValidationContext::new(config.environment.clone())
            .with_client_id(config.amc_client_id.clone());
        let amc = CompositeValidator::new(keys.clone(), context);
        let ipv = ReverificationValidator::new(keys.clone(), config.environment.clone());

        let amc_decryption = local_key("AMC", config.amc_private_encryption_key.as_deref())?;
        let ipv_decryption = match local_key("IPV", config.ipv_private_encryption_key.as_deref())? {
            Some(local) => {
                tracing::info!("Using environment variable for private encryption key");
                Some(local)
            }
            None => kms_key(config.kms_key_id.as_deref()).await,
        };

        Ok(Self {
            config,
            telemetry_config,
            keys,
            amc,
            ipv,
            amc_decryption,
            ipv_decryption,
            start_time: Instant::now(),
        })
    }

    /// Get server uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn amc_decryption(&self) -> Result<&DecryptionSource> {
        self.amc_decryption.as_ref().ok_or_else(|| {
            ServerError::configuration(
                "No encryption key available - AMC_PRIVATE_ENCRYPTION_KEY not configured",
            )
        })
    }

    pub fn ipv_decryption(&self) -> Result<&DecryptionSource> {
        self.ipv_decryption.as_ref().ok_or_else(|| {
            ServerError::configuration(
                "No encryption key available - neither environment variable nor KMS key ID configured",
            )
        })
    }
}

fn local_key(flow: &str, value: Option<&str>) -> Result<Option<DecryptionSource>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let pem = load_key_material(value)
        .map_err(|e| ServerError::configuration(format!("{flow} private encryption key: {e}")))?;
    let key = DecryptionKey::from_pem(&pem)
        .map_err(|e| ServerError::configuration(format!("{flow} private encryption key: {e}")))?;
    Ok(Some(DecryptionSource::Local(key)))
}

#[cfg(feature = "kms")]
async fn kms_key(key_id: Option<&str>) -> Option<DecryptionSource> {
    let key_id = key_id?;
    tracing::info!(key_id = key_id, "Using KMS for private encryption key");
    Some(DecryptionSource::Kms(KmsKeyUnwrapper::from_env(key_id).await))
}

#[cfg(not(feature = "kms"))]
async fn kms_key(_key_id: Option<&str>) -> Option<DecryptionSource> {
    None
}
