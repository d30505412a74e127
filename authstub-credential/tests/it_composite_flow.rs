//! End-to-end validation of encrypted client assertions

mod support;

use authstub_credential::{
    access_token_claims, ClaimSet, CompositeValidator, Environment, KeyDescriptor, KeyStore,
    KeyStoreConfig, ValidationContext, ValidationOutcome, AMC_AUDIENCE, AUTH_AUDIENCE,
};
use authstub_crypto::{encrypt, ContentEncryption, DecryptionKey, EncryptionKey};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::json;
use std::sync::Arc;
use support::{
    access_token_payload, client_assertion_payload, sign_access_token, sign_client_assertion,
    sign_es256, ACCESS_TOKEN_PRIVATE, ACCESS_TOKEN_PUBLIC, CLIENT_ASSERTION_PRIVATE,
    CLIENT_ASSERTION_PUBLIC, RSA_PRIVATE, RSA_PUBLIC,
};

fn local() -> Environment {
    "local".parse().unwrap()
}

fn key_store(auth_audience: KeyDescriptor) -> Arc<KeyStore> {
    let keys = KeyStore::new(
        vec![
            KeyDescriptor::new(AMC_AUDIENCE)
                .with_fallback_pem(CLIENT_ASSERTION_PUBLIC)
                .unwrap(),
            auth_audience,
        ],
        KeyStoreConfig::default(),
    )
    .unwrap();
    Arc::new(keys)
}

fn validator(env: Environment) -> CompositeValidator {
    let auth = KeyDescriptor::new(AUTH_AUDIENCE)
        .with_fallback_pem(ACCESS_TOKEN_PUBLIC)
        .unwrap();
    CompositeValidator::new(key_store(auth), ValidationContext::new(env))
}

fn seal(token: &str) -> String {
    let key = EncryptionKey::from_pem(RSA_PUBLIC).unwrap();
    encrypt(token.as_bytes(), &key, ContentEncryption::A256Gcm).unwrap()
}

fn decryption_key() -> DecryptionKey {
    DecryptionKey::from_pem(RSA_PRIVATE).unwrap()
}

/// Encrypted client assertion carrying an access token with `inner` claims.
fn request(env: &Environment, inner: &ClaimSet) -> String {
    let access_token = sign_access_token(inner);
    seal(&sign_client_assertion(&client_assertion_payload(env, &access_token)))
}

async fn rejection(validator: &CompositeValidator, envelope: &str) -> String {
    match validator
        .validate_request(envelope, &decryption_key())
        .await
        .unwrap()
    {
        ValidationOutcome::Invalid(reason) => reason,
        ValidationOutcome::Valid(claims) => panic!("expected Invalid, got {claims:?}"),
    }
}

#[tokio::test]
async fn valid_request_in_local_environment() {
    let env = local();
    let inner = access_token_payload(&env);

    let claims = validator(env.clone())
        .validate_request(&request(&env, &inner), &decryption_key())
        .await
        .unwrap()
        .into_result()
        .unwrap();

    // The embedded token is replaced by its decoded claims
    assert_eq!(access_token_claims(&claims), Some(&inner));

    // Every other outer claim round-trips unchanged
    let outer = client_assertion_payload(&env, "replaced");
    assert_eq!(claims.len(), outer.len());
    for (name, value) in outer.iter().filter(|(name, _)| *name != "access_token") {
        assert_eq!(&claims[name], value, "{name}");
    }
}

#[tokio::test]
async fn access_token_audience_tampered() {
    let env = local();
    let mut inner = access_token_payload(&env);
    inner.insert("aud".into(), json!("https://manage.build.account.gov.uk"));

    assert_eq!(
        rejection(&validator(env.clone()), &request(&env, &inner)).await,
        "The access token payload audience is invalid"
    );
}

#[tokio::test]
async fn access_token_issuer_checked_in_every_environment() {
    for name in ["production", "local", "build", "staging", "integration"] {
        let env: Environment = name.parse().unwrap();
        let outcome = validator(env.clone())
            .validate_request(&request(&env, &access_token_payload(&env)), &decryption_key())
            .await
            .unwrap();
        assert!(outcome.is_valid(), "{name}");

        let mut inner = access_token_payload(&env);
        inner.insert("iss".into(), json!("https://signin.evil.account.gov.uk/"));
        assert_eq!(
            rejection(&validator(env.clone()), &request(&env, &inner)).await,
            "The access token payload issuer is invalid",
            "{name}"
        );
    }
}

#[tokio::test]
async fn client_assertion_checked_before_access_token() {
    let env = local();
    let mut inner = access_token_payload(&env);
    inner.remove("jti");
    let mut outer = client_assertion_payload(&env, &sign_access_token(&inner));
    outer.remove("public_sub");

    assert_eq!(
        rejection(&validator(env), &seal(&sign_client_assertion(&outer))).await,
        "The client assertion JWT payload must contain a public subject"
    );
}

#[tokio::test]
async fn access_token_must_be_a_string() {
    let env = local();
    let mut outer = client_assertion_payload(&env, "unused");
    outer.insert("access_token".into(), json!({"sub": "not a token"}));

    assert_eq!(
        rejection(&validator(env), &seal(&sign_client_assertion(&outer))).await,
        "access_token must be a string"
    );
}

#[tokio::test]
async fn access_token_signed_by_wrong_key() {
    let env = local();
    let inner = sign_es256(
        &access_token_payload(&env),
        CLIENT_ASSERTION_PRIVATE,
        Some("at+jwt"),
    );
    let outer = sign_client_assertion(&client_assertion_payload(&env, &inner));

    assert_eq!(
        rejection(&validator(env), &seal(&outer)).await,
        "signature verification failed"
    );
}

#[tokio::test]
async fn header_types_are_checked() {
    let env = local();

    let inner = sign_es256(&access_token_payload(&env), ACCESS_TOKEN_PRIVATE, Some("JWT"));
    let outer = sign_client_assertion(&client_assertion_payload(&env, &inner));
    assert_eq!(
        rejection(&validator(env.clone()), &seal(&outer)).await,
        "typ must be 'at+jwt'"
    );

    let inner = sign_access_token(&access_token_payload(&env));
    let outer = sign_es256(
        &client_assertion_payload(&env, &inner),
        CLIENT_ASSERTION_PRIVATE,
        None,
    );
    assert_eq!(
        rejection(&validator(env.clone()), &seal(&outer)).await,
        "typ must be 'JWT'"
    );
}

#[tokio::test]
async fn header_types_are_case_sensitive() {
    let env = local();

    let inner = sign_access_token(&access_token_payload(&env));
    let outer = sign_es256(
        &client_assertion_payload(&env, &inner),
        CLIENT_ASSERTION_PRIVATE,
        Some("jwt"),
    );
    assert_eq!(
        rejection(&validator(env.clone()), &seal(&outer)).await,
        "typ must be 'JWT'"
    );

    let inner = sign_es256(&access_token_payload(&env), ACCESS_TOKEN_PRIVATE, Some("AT+JWT"));
    let outer = sign_client_assertion(&client_assertion_payload(&env, &inner));
    assert_eq!(
        rejection(&validator(env), &seal(&outer)).await,
        "typ must be 'at+jwt'"
    );
}

#[tokio::test]
async fn malformed_envelope_is_invalid_not_error() {
    let outcome = validator(local())
        .validate_request("not.a.jwe", &decryption_key())
        .await
        .unwrap();
    assert!(!outcome.is_valid());
}

#[tokio::test]
async fn tampered_ciphertext_is_invalid() {
    let env = local();
    let envelope = request(&env, &access_token_payload(&env));
    let mut segments: Vec<String> = envelope.split('.').map(str::to_string).collect();
    segments[3] = URL_SAFE_NO_PAD.encode(b"not the original ciphertext");

    let outcome = validator(env)
        .validate_request(&segments.join("."), &decryption_key())
        .await
        .unwrap();
    assert!(!outcome.is_valid());
}

#[tokio::test]
async fn missing_access_token_key_is_configuration_error() {
    let env = local();
    let validator = CompositeValidator::new(
        key_store(KeyDescriptor::new(AUTH_AUDIENCE)),
        ValidationContext::new(env.clone()),
    );

    let err = validator
        .validate_request(&request(&env, &access_token_payload(&env)), &decryption_key())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert_eq!(err.to_string(), "No signing key available for AUTH_AUDIENCE");
}
