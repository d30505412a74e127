//! Shared fixtures for authstub-credential integration tests.

// Not every test crate uses every helper.
#![allow(dead_code)]

use authstub_credential::{sign_jws, Algorithm, ClaimSet, Environment, DEFAULT_CLIENT_ID};
use serde_json::{json, Value as JsonValue};

pub const CLIENT_ASSERTION_PRIVATE: &str = include_str!("../fixtures/client_assertion_private.pem");
pub const CLIENT_ASSERTION_PUBLIC: &str = include_str!("../fixtures/client_assertion_public.pem");
pub const ACCESS_TOKEN_PRIVATE: &str = include_str!("../fixtures/access_token_private.pem");
pub const ACCESS_TOKEN_PUBLIC: &str = include_str!("../fixtures/access_token_public.pem");
pub const IPV_PRIVATE: &str = include_str!("../fixtures/ipv_private.pem");
pub const IPV_PUBLIC: &str = include_str!("../fixtures/ipv_public.pem");
pub const EVCS_PRIVATE: &str = include_str!("../fixtures/evcs_private.pem");
pub const EVCS_PUBLIC: &str = include_str!("../fixtures/evcs_public.pem");
pub const RSA_PRIVATE: &str = include_str!("../fixtures/rsa_private.pem");
pub const RSA_PUBLIC: &str = include_str!("../fixtures/rsa_public.pem");

// =============================================================================
// JWKS
// =============================================================================

/// Public JWK for the IPV fixture key.
pub fn ipv_jwk(kid: &str) -> JsonValue {
    json!({
        "kty": "EC",
        "crv": "P-256",
        "use": "sig",
        "alg": "ES256",
        "kid": kid,
        "x": "AWD6EV_kcc3xwGH43Lm_H2slJvVv5MqhQd5WtZnXJuM",
        "y": "ZDoQREE0WYu91vXMwg4XKRwZEUe0C1363nRFbTflQtE"
    })
}

/// Public JWK for the EVCS fixture key.
pub fn evcs_jwk(kid: &str) -> JsonValue {
    json!({
        "kty": "EC",
        "crv": "P-256",
        "use": "sig",
        "alg": "ES256",
        "kid": kid,
        "x": "vu5n_g7MhoYJWdQuT4rEOpqjgfpvbZhuL8qkHBuGR1k",
        "y": "Kckbkvk1wvxdRrAzvsF9cqa4UQM6Dr0zfLTBIl28D-Y"
    })
}

pub fn jwks(keys: Vec<JsonValue>) -> JsonValue {
    json!({ "keys": keys })
}

// =============================================================================
// Claim sets
// =============================================================================

pub fn as_claims(value: JsonValue) -> ClaimSet {
    match value {
        JsonValue::Object(map) => map,
        _ => panic!("claims must be a JSON object"),
    }
}

pub fn access_token_payload(env: &Environment) -> ClaimSet {
    as_claims(json!({
        "iss": env.auth_issuer(),
        "aud": env.auth_audience(),
        "client_id": DEFAULT_CLIENT_ID,
        "scope": ["account-delete"],
        "sub": "urn:fdc:gov.uk:2022:7KWZkhSXFYrmMP_SRsZJU-0Z4AQ",
        "sid": "sess_abc123def456ghi789jkl012mno345pqr",
        "jti": "a1b2c3d4-e5f6-7890-abcd-ef1234567890",
        "exp": 1_700_000_000
    }))
}

pub fn client_assertion_payload(env: &Environment, access_token: &str) -> ClaimSet {
    as_claims(json!({
        "iss": env.auth_issuer(),
        "aud": env.amc_audience(),
        "client_id": DEFAULT_CLIENT_ID,
        "scope": ["account-delete"],
        "sub": "urn:fdc:gov.uk:2022:7KWZkhSXFYrmMP_SRsZJU-0Z4AQ",
        "public_sub": "550e8400-e29b-41d4-a716-446655440000",
        "email": "user@example.com",
        "jti": "b2c3d4e5-f6a7-8901-bcde-f23456789012",
        "state": "state_xyz789abc123def456ghi789jkl012",
        "redirect_uri": "https://home.local.account.gov.uk/callback",
        "access_token": access_token
    }))
}

// =============================================================================
// Signing
// =============================================================================

pub fn sign_access_token(claims: &ClaimSet) -> String {
    sign_jws(claims, ACCESS_TOKEN_PRIVATE, Algorithm::ES256, Some("at+jwt"), None).unwrap()
}

pub fn sign_client_assertion(claims: &ClaimSet) -> String {
    sign_jws(claims, CLIENT_ASSERTION_PRIVATE, Algorithm::ES256, Some("JWT"), None).unwrap()
}

/// Sign with the IPV key, optionally naming a kid.
pub fn sign_ipv(claims: &JsonValue, kid: Option<&str>) -> String {
    sign_jws(claims, IPV_PRIVATE, Algorithm::ES256, Some("JWT"), kid).unwrap()
}

/// ES256-sign arbitrary claims with any fixture key and `typ`.
pub fn sign_es256(claims: &ClaimSet, pem: &str, typ: Option<&str>) -> String {
    sign_jws(claims, pem, Algorithm::ES256, typ, None).unwrap()
}
