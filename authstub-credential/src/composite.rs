//! Two-layer validation: a client assertion embedding an access token
//!
//! ```text
//! JWE --decrypt--> client assertion (JWS, typ JWT, ES256)
//!                    └─ access_token: access token (JWS, typ at+jwt)
//! ```
//!
//! Both layers are verified and validated. On success the `access_token`
//! string in the outer claims is replaced by the decoded inner claims.
//! Failures at either layer use the same message style, so a caller cannot
//! tell from the message alone which layer was rejected.

use crate::claims::{ClaimSet, ClaimShape, ValidationContext, ValidationOutcome};
use crate::error::Result;
use crate::jws::{verify_jws, VerifiedToken};
use crate::resolver::KeyStore;
use authstub_crypto::KeyUnwrapper;
use jsonwebtoken::{Algorithm, Header};
use serde_json::Value;
use std::sync::Arc;

/// Descriptor for the key that signs client assertions
pub const AMC_AUDIENCE: &str = "AMC_AUDIENCE";

/// Descriptor for the key that signs embedded access tokens
pub const AUTH_AUDIENCE: &str = "AUTH_AUDIENCE";

/// Claim holding the embedded access token
pub const ACCESS_TOKEN_CLAIM: &str = "access_token";

const CLIENT_ASSERTION_TYP: &str = "JWT";
const ACCESS_TOKEN_TYP: &str = "at+jwt";

/// Validates client assertions and the access tokens they carry
#[derive(Debug, Clone)]
pub struct CompositeValidator {
    keys: Arc<KeyStore>,
    context: ValidationContext,
    outer_descriptor: String,
    inner_descriptor: String,
}

impl CompositeValidator {
    /// Validator using the [`AMC_AUDIENCE`] and [`AUTH_AUDIENCE`] descriptors.
    pub fn new(keys: Arc<KeyStore>, context: ValidationContext) -> Self {
        Self {
            keys,
            context,
            outer_descriptor: AMC_AUDIENCE.to_string(),
            inner_descriptor: AUTH_AUDIENCE.to_string(),
        }
    }

    /// Use different key descriptors for the two layers.
    pub fn with_descriptors(mut self, outer: impl Into<String>, inner: impl Into<String>) -> Self {
        self.outer_descriptor = outer.into();
        self.inner_descriptor = inner.into();
        self
    }

    pub fn context(&self) -> &ValidationContext {
        &self.context
    }

    /// Decrypt `envelope` and validate the client assertion inside it.
    ///
    /// # Errors
    ///
    /// Only configuration faults (no signing key, unusable key material, key
    /// service failure). Everything the caller could have caused comes back
    /// as [`ValidationOutcome::Invalid`].
    pub async fn validate_request(
        &self,
        envelope: &str,
        unwrapper: &dyn KeyUnwrapper,
    ) -> Result<ValidationOutcome> {
        let token = match authstub_crypto::decrypt_to_string(envelope, unwrapper).await {
            Ok(token) => token,
            Err(e) => return crate::CredentialError::from(e).into_outcome(),
        };
        self.assemble(&token).await
    }

    /// Validate a client assertion and its embedded access token.
    pub async fn assemble(&self, outer_token: &str) -> Result<ValidationOutcome> {
        // 1. Client assertion signature and header
        let outer = match verify_layer(&self.keys, outer_token, &self.outer_descriptor).await? {
            Ok(verified) => verified,
            Err(rejected) => return Ok(rejected),
        };
        let outer_header =
            check_header(&outer.header, CLIENT_ASSERTION_TYP, Some(Algorithm::ES256));
        if let Some(reason) = outer_header {
            return Ok(ValidationOutcome::Invalid(reason));
        }

        // 2. Client assertion claims
        let mut claims = match ClaimShape::ClientAssertion.validate(outer.claims, &self.context) {
            ValidationOutcome::Valid(claims) => claims,
            invalid => return Ok(invalid),
        };

        // 3. Embedded access token
        let Some(Value::String(inner_token)) = claims.get(ACCESS_TOKEN_CLAIM) else {
            return Ok(ValidationOutcome::invalid("access_token must be a string"));
        };
        let inner = match verify_layer(&self.keys, inner_token, &self.inner_descriptor).await? {
            Ok(verified) => verified,
            Err(rejected) => return Ok(rejected),
        };
        if let Some(reason) = check_header(&inner.header, ACCESS_TOKEN_TYP, None) {
            return Ok(ValidationOutcome::Invalid(reason));
        }
        let inner_claims = match ClaimShape::AccessToken.validate(inner.claims, &self.context) {
            ValidationOutcome::Valid(claims) => claims,
            invalid => return Ok(invalid),
        };

        // 4. Merge
        claims.insert(ACCESS_TOKEN_CLAIM.to_string(), Value::Object(inner_claims));
        tracing::info!(
            environment = %self.context.environment,
            "client assertion and access token validated"
        );
        Ok(ValidationOutcome::Valid(claims))
    }
}

/// Verify one signed layer.
///
/// The inner `Err` is the outcome to hand back unchanged: a caller fault
/// folded into `Invalid`.
pub(crate) async fn verify_layer(
    keys: &KeyStore,
    token: &str,
    descriptor: &str,
) -> Result<std::result::Result<VerifiedToken, ValidationOutcome>> {
    match verify_jws(token, keys, descriptor).await {
        Ok(verified) => Ok(Ok(verified)),
        Err(e) => e.into_outcome().map(Err),
    }
}

/// `typ` and `alg` are both compared exactly.
fn check_header(header: &Header, typ: &str, alg: Option<Algorithm>) -> Option<String> {
    if header.typ.as_deref() != Some(typ) {
        return Some(format!("typ must be '{typ}'"));
    }
    match alg {
        Some(alg) if header.alg != alg => Some(format!("alg must be {alg:?}")),
        _ => None,
    }
}

/// The decoded access token of a validated composite claim set.
pub fn access_token_claims(claims: &ClaimSet) -> Option<&ClaimSet> {
    claims.get(ACCESS_TOKEN_CLAIM).and_then(Value::as_object)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(typ: Option<&str>, alg: Algorithm) -> Header {
        let mut header = Header::new(alg);
        header.typ = typ.map(str::to_string);
        header
    }

    #[test]
    fn test_check_header_typ() {
        assert_eq!(check_header(&header(Some("JWT"), Algorithm::ES256), "JWT", None), None);
        assert_eq!(
            check_header(&header(Some("jwt"), Algorithm::ES256), "JWT", None).as_deref(),
            Some("typ must be 'JWT'")
        );
        assert_eq!(
            check_header(&header(Some("AT+JWT"), Algorithm::ES256), "at+jwt", None).as_deref(),
            Some("typ must be 'at+jwt'")
        );
        assert_eq!(
            check_header(&header(None, Algorithm::ES256), "JWT", None).as_deref(),
            Some("typ must be 'JWT'")
        );
        assert_eq!(
            check_header(&header(Some("JWT"), Algorithm::ES256), "at+jwt", None).as_deref(),
            Some("typ must be 'at+jwt'")
        );
    }

    #[test]
    fn test_check_header_alg() {
        assert_eq!(
            check_header(&header(Some("JWT"), Algorithm::RS256), "JWT", Some(Algorithm::ES256))
                .as_deref(),
            Some("alg must be ES256")
        );
        assert_eq!(
            check_header(&header(Some("JWT"), Algorithm::ES256), "JWT", Some(Algorithm::ES256)),
            None
        );
    }

    #[test]
    fn test_access_token_claims() {
        let mut claims = ClaimSet::new();
        claims.insert(ACCESS_TOKEN_CLAIM.into(), Value::String("a.b.c".into()));
        assert!(access_token_claims(&claims).is_none());
        claims.insert(ACCESS_TOKEN_CLAIM.into(), serde_json::json!({"sub": "x"}));
        assert_eq!(access_token_claims(&claims).unwrap()["sub"], "x");
    }
}
