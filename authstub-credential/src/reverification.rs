//! Reverification requests from the identity-proofing flow
//!
//! The outer token is signed by the [`IPV`] counterparty. It embeds a storage
//! access token, signed by [`EVCS`], at
//! `claims.userinfo["https://vocab.account.gov.uk/v1/storageAccessToken"].values[0]`.
//! On success that string is replaced by the decoded storage token claims.

use crate::claims::{audience_matches, str_claim, ClaimSet, ValidationOutcome};
use crate::composite::verify_layer;
use crate::environment::Environment;
use crate::error::Result;
use crate::resolver::KeyStore;
use authstub_crypto::KeyUnwrapper;
use serde_json::Value;
use std::sync::Arc;

/// Descriptor for the key that signs reverification requests
pub const IPV: &str = "IPV";

/// Descriptor for the key that signs storage access tokens
pub const EVCS: &str = "EVCS";

/// Required `scope` of the request and of the storage access token
pub const SCOPE_REVERIFICATION: &str = "reverification";

/// Userinfo claim holding the storage access token
pub const STORAGE_ACCESS_TOKEN_CLAIM: &str = "https://vocab.account.gov.uk/v1/storageAccessToken";

/// Validates reverification requests and their storage access tokens
#[derive(Debug, Clone)]
pub struct ReverificationValidator {
    keys: Arc<KeyStore>,
    environment: Environment,
}

impl ReverificationValidator {
    pub fn new(keys: Arc<KeyStore>, environment: Environment) -> Self {
        Self { keys, environment }
    }

    /// Decrypt `envelope` and validate the request inside it.
    ///
    /// Errors are configuration faults only, as for
    /// [`CompositeValidator::validate_request`](crate::CompositeValidator::validate_request).
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

    /// Validate a signed reverification request.
    pub async fn assemble(&self, token: &str) -> Result<ValidationOutcome> {
        let request = match verify_layer(&self.keys, token, IPV).await? {
            Ok(verified) => verified,
            Err(rejected) => return Ok(rejected),
        };
        let mut claims = request.claims;

        let storage_token = match check_request(&claims) {
            Ok(token) => token.to_string(),
            Err(reason) => return Ok(reject(reason)),
        };

        let storage = match verify_layer(&self.keys, &storage_token, EVCS).await? {
            Ok(verified) => verified,
            Err(rejected) => return Ok(rejected),
        };
        if let Err(reason) = check_storage_token(&storage.claims, &self.environment) {
            return Ok(reject(reason));
        }

        if let Some(slot) = storage_token_slot(&mut claims) {
            *slot = Value::Object(storage.claims);
        }
        tracing::info!(environment = %self.environment, "reverification request validated");
        Ok(ValidationOutcome::Valid(claims))
    }
}

fn reject(reason: &str) -> ValidationOutcome {
    tracing::info!(reason = reason, "reverification request rejected");
    ValidationOutcome::invalid(reason)
}

/// Request checks, in order. Returns the embedded storage access token.
fn check_request(claims: &ClaimSet) -> std::result::Result<&str, &'static str> {
    if str_claim(claims, "scope") != Some(SCOPE_REVERIFICATION) {
        return Err("Scope in request payload must be reverification");
    }
    let Some(userinfo) = claims
        .get("claims")
        .and_then(|c| c.get("userinfo"))
        .filter(|u| u.is_object())
    else {
        return Err("Request payload is missing user info claim");
    };
    if str_claim(claims, "state").is_none() {
        return Err("Payload must contain state");
    }
    if str_claim(claims, "sub").is_none() {
        return Err("Payload must contain sub");
    }
    userinfo
        .get(STORAGE_ACCESS_TOKEN_CLAIM)
        .and_then(|t| t.get("values"))
        .and_then(|v| v.get(0))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or("Request payload is missing storage access token")
}

fn check_storage_token(
    claims: &ClaimSet,
    env: &Environment,
) -> std::result::Result<(), &'static str> {
    if str_claim(claims, "scope") != Some(SCOPE_REVERIFICATION) {
        return Err("Storage access token scope is not reverification");
    }
    if str_claim(claims, "iss") != Some(env.storage_issuer().as_str()) {
        return Err("Storage access token issuer is invalid");
    }
    if !audience_matches(claims.get("aud"), &env.storage_audience()) {
        return Err("Storage access token audience is invalid");
    }
    Ok(())
}

fn storage_token_slot(claims: &mut ClaimSet) -> Option<&mut Value> {
    claims
        .get_mut("claims")?
        .get_mut("userinfo")?
        .get_mut(STORAGE_ACCESS_TOKEN_CLAIM)?
        .get_mut("values")?
        .get_mut(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_claims(value: Value) -> ClaimSet {
        match value {
            Value::Object(map) => map,
            _ => panic!("claims must be an object"),
        }
    }

    fn request() -> ClaimSet {
        as_claims(json!({
            "sub": "urn:fdc:gov.uk:2022:someSub",
            "scope": "reverification",
            "state": "STATE",
            "claims": {
                "userinfo": {
                    STORAGE_ACCESS_TOKEN_CLAIM: { "values": ["a.b.c"] }
                }
            }
        }))
    }

    #[test]
    fn test_request_checks_in_order() {
        assert_eq!(check_request(&request()), Ok("a.b.c"));

        let mut claims = request();
        claims.insert("scope".into(), json!("openid"));
        claims.remove("claims");
        assert_eq!(
            check_request(&claims),
            Err("Scope in request payload must be reverification")
        );

        let mut claims = request();
        claims.remove("claims");
        claims.remove("state");
        assert_eq!(
            check_request(&claims),
            Err("Request payload is missing user info claim")
        );

        let mut claims = request();
        claims.remove("state");
        claims.remove("sub");
        assert_eq!(check_request(&claims), Err("Payload must contain state"));

        let mut claims = request();
        claims.remove("sub");
        assert_eq!(check_request(&claims), Err("Payload must contain sub"));
    }

    #[test]
    fn test_missing_storage_token() {
        let cases = [
            json!({}),
            json!({ STORAGE_ACCESS_TOKEN_CLAIM: { "values": [] } }),
            json!({ STORAGE_ACCESS_TOKEN_CLAIM: { "values": [42] } }),
        ];
        for userinfo in cases {
            let mut claims = request();
            claims.insert("claims".into(), json!({ "userinfo": userinfo }));
            assert_eq!(
                check_request(&claims),
                Err("Request payload is missing storage access token")
            );
        }
    }

    #[test]
    fn test_storage_token_checks() {
        let env: Environment = "build".parse().unwrap();
        let valid = as_claims(json!({
            "scope": "reverification",
            "iss": env.storage_issuer(),
            "aud": [env.storage_audience(), env.identity_audience()],
        }));
        assert_eq!(check_storage_token(&valid, &env), Ok(()));

        let mut claims = valid.clone();
        claims.insert("scope".into(), json!("openid"));
        assert_eq!(
            check_storage_token(&claims, &env),
            Err("Storage access token scope is not reverification")
        );

        let mut claims = valid.clone();
        claims.insert("iss".into(), json!(Environment::Production.storage_issuer()));
        assert_eq!(
            check_storage_token(&claims, &env),
            Err("Storage access token issuer is invalid")
        );

        let mut claims = valid;
        claims.insert("aud".into(), json!([env.identity_audience()]));
        assert_eq!(
            check_storage_token(&claims, &env),
            Err("Storage access token audience is invalid")
        );
    }

    #[test]
    fn test_storage_token_slot_replaced() {
        let mut claims = request();
        *storage_token_slot(&mut claims).unwrap() = json!({"sub": "decoded"});
        assert_eq!(
            claims["claims"]["userinfo"][STORAGE_ACCESS_TOKEN_CLAIM]["values"][0]["sub"],
            "decoded"
        );
    }
}
