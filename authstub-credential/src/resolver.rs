//! Verification key resolution.
//!
//! Each counterparty is described by a [`KeyDescriptor`]: an optional JWKS
//! endpoint and an optional static fallback key. The [`KeyStore`] holds the
//! descriptors and the HTTP client and is constructed once at startup and
//! passed to the validators.
//!
//! # Resolution order
//!
//! 1. No `kid` in the token header, or no endpoint configured: use the fallback.
//! 2. Fetch the key set (bounded by a 10 second timeout).
//!    - Timeout, non-2xx, malformed JSON or an empty set: use the fallback.
//!    - Non-empty set containing the `kid`: use that key.
//!    - Non-empty set without the `kid`: fail. An explicit `kid` is never
//!      answered with the lower-trust fallback key.
//! 3. No fallback configured: fail with a configuration error.
//!
//! # Cache Behavior
//!
//! Disabled by default, so every resolution refetches. With a TTL set:
//! - Key sets are cached by endpoint URL.
//! - A `kid` miss on a cached set evicts it and refetches once.
//! - Failed fetches are never cached.

use crate::error::{CredentialError, Result};
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk};
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Timeout for key set HTTP fetches (connect + response).
pub const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout for key set HTTP fetches.
const JWKS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Descriptors
// ============================================================================

/// A statically configured verification key.
#[derive(Clone)]
struct StaticKey {
    key: DecodingKey,
    algorithm: Algorithm,
}

/// Where a counterparty's verification key comes from.
#[derive(Clone)]
pub struct KeyDescriptor {
    name: String,
    jwks_url: Option<String>,
    fallback: Option<StaticKey>,
}

impl KeyDescriptor {
    /// A descriptor with no strategy configured yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jwks_url: None,
            fallback: None,
        }
    }

    /// Resolve keys by `kid` from this key set endpoint.
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    /// Use this PEM public key when the key set cannot answer.
    ///
    /// Accepts EC P-256 (verified as ES256) or RSA (RS256) SPKI PEM. The key
    /// is parsed here, once; resolution only clones it.
    ///
    /// # Errors
    ///
    /// `InvalidKeyConfig` if the PEM is neither an EC nor an RSA public key.
    pub fn with_fallback_pem(mut self, pem: &str) -> Result<Self> {
        let pem = pem.trim().replace("\\n", "\n");
        let fallback = match DecodingKey::from_ec_pem(pem.as_bytes()) {
            Ok(key) => StaticKey {
                key,
                algorithm: Algorithm::ES256,
            },
            Err(_) => {
                let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                    CredentialError::InvalidKeyConfig {
                        descriptor: self.name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                StaticKey {
                    key,
                    algorithm: Algorithm::RS256,
                }
            }
        };
        self.fallback = Some(fallback);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn jwks_url(&self) -> Option<&str> {
        self.jwks_url.as_deref()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

impl std::fmt::Debug for KeyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDescriptor")
            .field("name", &self.name)
            .field("jwks_url", &self.jwks_url)
            .field("fallback", &self.fallback.as_ref().map(|k| k.algorithm))
            .finish()
    }
}

// ============================================================================
// Resolved keys
// ============================================================================

/// Which strategy produced a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Matched by `kid` in a fetched key set.
    Jwks { kid: String },
    /// The descriptor's static fallback key.
    Fallback,
}

/// A verification key together with the algorithm it verifies.
#[derive(Clone)]
pub struct ResolvedKey {
    pub key: DecodingKey,
    pub algorithm: Algorithm,
    pub source: KeySource,
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("algorithm", &self.algorithm)
            .field("source", &self.source)
            .finish()
    }
}

// ============================================================================
// KeyStore
// ============================================================================

/// Tuning for [`KeyStore`].
#[derive(Debug, Clone)]
pub struct KeyStoreConfig {
    /// Total timeout for one key set fetch.
    pub fetch_timeout: Duration,
    /// Cache fetched key sets for this long; `None` disables caching.
    pub cache_ttl: Option<Duration>,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: JWKS_FETCH_TIMEOUT,
            cache_ttl: None,
        }
    }
}

/// A fetched key set, entries left unparsed.
///
/// Only the entry matching the token's `kid` is imported, so an entry this
/// crate cannot model does not invalidate the rest of the set.
#[derive(Debug, Clone, Deserialize)]
struct RawJwkSet {
    keys: Vec<Value>,
}

/// Cached key set for a single endpoint.
struct CachedJwks {
    jwk_set: RawJwkSet,
    fetched_at: Instant,
}

/// Thread-safe key store shared by all validations.
pub struct KeyStore {
    /// HTTP client for fetching key sets (with timeout).
    client: reqwest::Client,
    /// Descriptors by logical counterparty name.
    descriptors: HashMap<String, KeyDescriptor>,
    /// Cached key sets (endpoint URL → set).
    cache: RwLock<HashMap<String, CachedJwks>>,
    cache_ttl: Option<Duration>,
}

impl KeyStore {
    /// Create a key store. Does not fetch anything.
    pub fn new(descriptors: Vec<KeyDescriptor>, config: KeyStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(JWKS_CONNECT_TIMEOUT.min(config.fetch_timeout))
            .build()
            .map_err(|e| CredentialError::HttpClient(e.to_string()))?;

        let descriptors = descriptors
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();

        Ok(Self {
            client,
            descriptors,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: config.cache_ttl,
        })
    }

    /// Look up a descriptor by name.
    pub fn descriptor(&self, name: &str) -> Result<&KeyDescriptor> {
        self.descriptors
            .get(name)
            .ok_or_else(|| CredentialError::UnknownDescriptor(name.to_string()))
    }

    /// Resolve the verification key for a token header.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound`: the fetched set is non-empty and lacks the `kid` (400)
    /// - `InvalidJwk`: the matching entry cannot be imported (400)
    /// - `NoSigningKey`: nothing usable is configured or reachable (500)
    /// - `UnknownDescriptor`: `descriptor` was never registered (500)
    pub async fn resolve(&self, header: &Header, descriptor: &str) -> Result<ResolvedKey> {
        let descriptor = self.descriptor(descriptor)?;

        match (header.kid.as_deref(), descriptor.jwks_url()) {
            (Some(kid), Some(url)) => {
                if let Some(key) = self.resolve_remote(descriptor, url, kid).await? {
                    return Ok(key);
                }
            }
            (kid, url) => {
                if kid.is_none() {
                    tracing::info!(
                        descriptor = descriptor.name(),
                        "kid not found in decoded protected header"
                    );
                }
                if url.is_none() {
                    tracing::info!(descriptor = descriptor.name(), "JWKS URI not found");
                }
            }
        }

        match &descriptor.fallback {
            Some(fallback) => {
                tracing::info!(
                    descriptor = descriptor.name(),
                    "Using backup signing key from configuration"
                );
                Ok(ResolvedKey {
                    key: fallback.key.clone(),
                    algorithm: fallback.algorithm,
                    source: KeySource::Fallback,
                })
            }
            None => Err(CredentialError::NoSigningKey {
                descriptor: descriptor.name().to_string(),
            }),
        }
    }

    /// Try the key set endpoint.
    ///
    /// `Ok(None)` means the endpoint could not answer and the caller should
    /// fall back; `Err` is a definitive failure.
    async fn resolve_remote(
        &self,
        descriptor: &KeyDescriptor,
        url: &str,
        kid: &str,
    ) -> Result<Option<ResolvedKey>> {
        if let Some(cached) = self.cached(url) {
            if let Some(jwk) = find_jwk(&cached, kid) {
                return import_jwk(jwk, kid).map(Some);
            }
            // kid miss: the counterparty may have rotated keys
            tracing::debug!(jwks_url = url, kid = kid, "kid not in cached JWKS, refetching");
            self.cache.write().remove(url);
        }

        let jwk_set = match self.fetch_jwks(url).await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(
                    descriptor = descriptor.name(),
                    jwks_url = url,
                    error = %e,
                    "JWKS fetch failed, checking fallback"
                );
                return Ok(None);
            }
        };

        if jwk_set.keys.is_empty() {
            tracing::warn!(
                descriptor = descriptor.name(),
                jwks_url = url,
                "JWKS contains no keys, checking fallback"
            );
            return Ok(None);
        }

        let result = match find_jwk(&jwk_set, kid) {
            Some(jwk) => import_jwk(jwk, kid).map(Some),
            None => Err(CredentialError::KeyNotFound {
                kid: kid.to_string(),
            }),
        };

        if let Some(ttl) = self.cache_ttl {
            tracing::debug!(
                jwks_url = url,
                key_count = jwk_set.keys.len(),
                ttl_secs = ttl.as_secs(),
                "JWKS cached"
            );
            self.cache.write().insert(
                url.to_string(),
                CachedJwks {
                    jwk_set,
                    fetched_at: Instant::now(),
                },
            );
        }

        if let Ok(Some(_)) = &result {
            tracing::info!(descriptor = descriptor.name(), kid = kid, "using kid");
        }
        result
    }

    /// A fresh cached key set, if caching is enabled.
    fn cached(&self, url: &str) -> Option<RawJwkSet> {
        let ttl = self.cache_ttl?;
        let cache = self.cache.read();
        cache
            .get(url)
            .filter(|entry| entry.fetched_at.elapsed() < ttl)
            .map(|entry| entry.jwk_set.clone())
    }

    /// Fetch a key set from a URL.
    async fn fetch_jwks(&self, url: &str) -> std::result::Result<RawJwkSet, JwksFetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| JwksFetchError::FetchFailed {
                url: url.to_string(),
                error: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            })?;

        if !response.status().is_success() {
            return Err(JwksFetchError::FetchFailed {
                url: url.to_string(),
                error: format!("HTTP {}", response.status()),
            });
        }

        response
            .json::<RawJwkSet>()
            .await
            .map_err(|e| JwksFetchError::ParseFailed {
                url: url.to_string(),
                error: e.to_string(),
            })
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("descriptors", &self.descriptors.keys().collect::<Vec<_>>())
            .field("cached_sets", &self.cache.read().len())
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

/// Key set fetch failures. Never surfaced: they trigger the fallback.
#[derive(Debug, thiserror::Error)]
enum JwksFetchError {
    #[error("Failed to fetch JWKS from {url}: {error}")]
    FetchFailed { url: String, error: String },

    #[error("Failed to parse JWKS from {url}: {error}")]
    ParseFailed { url: String, error: String },
}

fn find_jwk<'a>(jwk_set: &'a RawJwkSet, kid: &str) -> Option<&'a Value> {
    jwk_set
        .keys
        .iter()
        .find(|entry| entry.get("kid").and_then(Value::as_str) == Some(kid))
}

fn import_jwk(entry: &Value, kid: &str) -> Result<ResolvedKey> {
    let invalid = |reason: String| CredentialError::InvalidJwk {
        kid: kid.to_string(),
        reason,
    };
    let jwk: Jwk = serde_json::from_value(entry.clone()).map_err(|e| invalid(e.to_string()))?;
    let algorithm =
        algorithm_for_jwk(&jwk).ok_or_else(|| invalid("unsupported key type".into()))?;
    let key = DecodingKey::from_jwk(&jwk).map_err(|e| invalid(e.to_string()))?;
    Ok(ResolvedKey {
        key,
        algorithm,
        source: KeySource::Jwks {
            kid: kid.to_string(),
        },
    })
}

/// The signature algorithm a JWK can verify, from its key parameters.
fn algorithm_for_jwk(jwk: &Jwk) -> Option<Algorithm> {
    match &jwk.algorithm {
        AlgorithmParameters::EllipticCurve(params) => match params.curve {
            EllipticCurve::P256 => Some(Algorithm::ES256),
            EllipticCurve::P384 => Some(Algorithm::ES384),
            _ => None,
        },
        AlgorithmParameters::RSA(_) => Some(Algorithm::RS256),
        _ => None,
    }
}
