//! Compact JWS verification against resolved keys.
//!
//! Verification establishes authenticity only. Temporal claims (`exp`,
//! `nbf`) and `iss`/`aud` are not checked here; the claim validators own
//! every business rule.

use crate::claims::ClaimSet;
use crate::error::{CredentialError, Result};
use crate::resolver::{KeyStore, ResolvedKey};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, EncodingKey, Header, Validation};
use serde::Serialize;

/// A token whose signature verified.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// Decoded protected header
    pub header: Header,
    /// Decoded payload, unvalidated
    pub claims: ClaimSet,
}

/// Decode the protected header without verifying the signature.
///
/// Needed before verification to extract the `kid` for key resolution.
/// The result must not be trusted until [`verify_jws`] succeeds.
pub fn peek_header(token: &str) -> Result<Header> {
    jsonwebtoken::decode_header(token).map_err(|e| CredentialError::InvalidJws(e.to_string()))
}

/// Verify a compact JWS using the key for `descriptor`.
///
/// # Format
///
/// `BASE64URL(header).BASE64URL(payload).BASE64URL(signature)`, payload a
/// JSON object.
///
/// # Returns
///
/// The decoded header and raw claim set.
///
/// # Errors
///
/// - `InvalidJws`: not three segments, bad base64, payload not a JSON object
/// - `UnsupportedAlgorithm`: header `alg` does not match the resolved key
/// - `InvalidSignature`: signature mismatch
/// - Any key resolution error from [`KeyStore::resolve`]
pub async fn verify_jws(token: &str, keys: &KeyStore, descriptor: &str) -> Result<VerifiedToken> {
    // 1. Peek at the header for the kid
    let header = peek_header(token)?;

    // 2. Resolve the verification key
    let resolved = keys.resolve(&header, descriptor).await?;

    // 3. Verify the signature and decode the payload
    let claims = verify_with_key(token, &resolved)?;

    tracing::debug!(
        descriptor = descriptor,
        alg = ?header.alg,
        source = ?resolved.source,
        "JWS signature verified"
    );
    Ok(VerifiedToken { header, claims })
}

/// Verify a compact JWS against an already resolved key.
pub fn verify_with_key(token: &str, resolved: &ResolvedKey) -> Result<ClaimSet> {
    let mut validation = Validation::new(resolved.algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<ClaimSet>(token, &resolved.key, &validation).map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature => CredentialError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            CredentialError::UnsupportedAlgorithm(format!(
                "token not signed with {:?}",
                resolved.algorithm
            ))
        }
        _ => CredentialError::InvalidJws(e.to_string()),
    })?;
    Ok(data.claims)
}

/// Sign `claims` as a compact JWS.
///
/// The outbound mirror of [`verify_jws`], used by the request-building CLI
/// and by tests. `pem` is a PKCS#8 private key matching `alg`.
pub fn sign_jws<T: Serialize>(
    claims: &T,
    pem: &str,
    alg: Algorithm,
    typ: Option<&str>,
    kid: Option<&str>,
) -> Result<String> {
    let key = match alg {
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem.as_bytes()),
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
            EncodingKey::from_rsa_pem(pem.as_bytes())
        }
        other => return Err(CredentialError::UnsupportedAlgorithm(format!("{other:?}"))),
    }
    .map_err(|e| CredentialError::Signing(e.to_string()))?;

    let mut header = Header::new(alg);
    header.typ = typ.map(str::to_string);
    header.kid = kid.map(str::to_string);

    encode(&header, claims, &key).map_err(|e| CredentialError::Signing(e.to_string()))
}
