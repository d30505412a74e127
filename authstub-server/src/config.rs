//! Server configuration
//!
//! Every option can be supplied as a flag or through the environment variable
//! the deployed stubs already use. Key material may be given inline (PEM,
//! with literal `\n` accepted) or as `@path` to read it from a file.

use authstub_credential::{
    Environment, KeyDescriptor, KeyStoreConfig, AMC_AUDIENCE, AUTH_AUDIENCE, DEFAULT_CLIENT_ID,
    EVCS, IPV,
};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Authentication stub server configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "authstub-server")]
#[command(about = "Validates encrypted request objects for the authentication stubs")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "AUTHSTUB_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Deployment environment (`production`, or a name such as `local`, `build`, `staging`)
    #[arg(long, env = "ENVIRONMENT", default_value = "production")]
    pub environment: Environment,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AUTHSTUB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    // Account management flow
    /// PEM public key that signs client assertions
    #[arg(long, env = "AUTH_PUBLIC_SIGNING_KEY_AMC_AUDIENCE")]
    pub amc_signing_key: Option<String>,

    /// PEM public key that signs embedded access tokens
    #[arg(long, env = "AUTH_PUBLIC_SIGNING_KEY_AUTH_AUDIENCE")]
    pub auth_signing_key: Option<String>,

    /// PEM RSA private key that opens account management request envelopes
    #[arg(long, env = "AMC_PRIVATE_ENCRYPTION_KEY")]
    pub amc_private_encryption_key: Option<String>,

    /// Client id required in client assertions
    #[arg(long, env = "AMC_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    pub amc_client_id: String,

    // Identity proofing flow
    /// Fallback PEM public key that signs reverification requests
    #[arg(long, env = "AUTH_PUBLIC_SIGNING_KEY_IPV")]
    pub ipv_signing_key: Option<String>,

    /// JWKS endpoint publishing the reverification request signing keys
    #[arg(long, env = "AUTH_IPV_PUBLIC_SIGNING_KEY_JWKS_ENDPOINT")]
    pub ipv_jwks_url: Option<String>,

    /// Fallback PEM public key that signs storage access tokens
    #[arg(long, env = "AUTH_PUBLIC_SIGNING_KEY_EVCS")]
    pub evcs_signing_key: Option<String>,

    /// JWKS endpoint publishing the storage access token signing keys
    #[arg(long, env = "AUTH_EVCS_PUBLIC_SIGNING_KEY_JWKS_ENDPOINT")]
    pub evcs_jwks_url: Option<String>,

    /// PEM RSA private key that opens reverification envelopes (takes precedence over KMS)
    #[arg(long, env = "IPV_PRIVATE_ENCRYPTION_KEY")]
    pub ipv_private_encryption_key: Option<String>,

    /// KMS key that opens reverification envelopes (requires the `kms` feature)
    #[arg(long, env = "KMS_KEY_ID")]
    pub kms_key_id: Option<String>,

    // Key set fetching
    /// Timeout for one JWKS fetch, in seconds
    #[arg(long, env = "JWKS_FETCH_TIMEOUT_SECS", default_value = "10")]
    pub jwks_fetch_timeout_secs: u64,

    /// Cache fetched key sets for this many seconds (disabled when unset)
    #[arg(long, env = "JWKS_CACHE_TTL_SECS")]
    pub jwks_cache_ttl_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            environment: Environment::Production,
            log_level: "info".to_string(),
            amc_signing_key: None,
            auth_signing_key: None,
            amc_private_encryption_key: None,
            amc_client_id: DEFAULT_CLIENT_ID.to_string(),
            ipv_signing_key: None,
            ipv_jwks_url: None,
            evcs_signing_key: None,
            evcs_jwks_url: None,
            ipv_private_encryption_key: None,
            kms_key_id: None,
            jwks_fetch_timeout_secs: 10,
            jwks_cache_ttl_secs: None,
        }
    }
}

impl ServerConfig {
    /// Create config from CLI args
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Validate configuration at startup
    ///
    /// Missing keys are not startup errors: the flow that needs them answers
    /// 500 per request, matching a mis-deployed stub.
    pub fn validate(&self) -> Result<(), String> {
        if self.jwks_fetch_timeout_secs == 0 {
            return Err("--jwks-fetch-timeout-secs must be greater than zero".to_string());
        }
        if self.jwks_cache_ttl_secs == Some(0) {
            return Err("--jwks-cache-ttl-secs must be greater than zero when set".to_string());
        }
        for (flag, url) in [
            ("--ipv-jwks-url", &self.ipv_jwks_url),
            ("--evcs-jwks-url", &self.evcs_jwks_url),
        ] {
            if let Some(url) = url {
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(format!("{flag} must be an http(s) URL, got '{url}'"));
                }
            }
        }
        if self.amc_client_id.trim().is_empty() {
            return Err("--amc-client-id must not be empty".to_string());
        }
        if self.kms_key_id.is_some() && !cfg!(feature = "kms") {
            return Err("KMS_KEY_ID is set but this build lacks the `kms` feature".to_string());
        }
        Ok(())
    }

    /// Key set fetch tuning
    pub fn key_store_config(&self) -> KeyStoreConfig {
        KeyStoreConfig {
            fetch_timeout: Duration::from_secs(self.jwks_fetch_timeout_secs),
            cache_ttl: self.jwks_cache_ttl_secs.map(Duration::from_secs),
        }
    }

    /// One descriptor per counterparty, with fallback keys parsed.
    pub fn key_descriptors(&self) -> Result<Vec<KeyDescriptor>, String> {
        Ok(vec![
            descriptor(AMC_AUDIENCE, None, self.amc_signing_key.as_deref())?,
            descriptor(AUTH_AUDIENCE, None, self.auth_signing_key.as_deref())?,
            descriptor(
                IPV,
                self.ipv_jwks_url.as_deref(),
                self.ipv_signing_key.as_deref(),
            )?,
            descriptor(
                EVCS,
                self.evcs_jwks_url.as_deref(),
                self.evcs_signing_key.as_deref(),
            )?,
        ])
    }
}

fn descriptor(
    name: &str,
    jwks_url: Option<&str>,
    fallback: Option<&str>,
) -> Result<KeyDescriptor, String> {
    let mut descriptor = KeyDescriptor::new(name);
    if let Some(url) = jwks_url {
        descriptor = descriptor.with_jwks_url(url);
    }
    if let Some(value) = fallback {
        let pem = load_key_material(value).map_err(|e| format!("{name} signing key: {e}"))?;
        descriptor = descriptor
            .with_fallback_pem(&pem)
            .map_err(|e| e.to_string())?;
    }
    Ok(descriptor)
}

/// Resolve inline key material or `@path` syntax.
pub fn load_key_material(value: &str) -> Result<String, std::io::Error> {
    match value.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(shellexpand(path)),
        None => Ok(value.to_string()),
    }
}

/// Simple shell expansion for ~ in paths
fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{}", home.to_string_lossy(), rest);
        }
    }
    path.to_string()
}
