//! Reverification requests with storage access tokens resolved from a JWKS

mod support;

use authstub_credential::{
    sign_jws, Algorithm, Environment, KeyDescriptor, KeyStore, KeyStoreConfig,
    ReverificationValidator, ValidationOutcome, EVCS, IPV,
};
use authstub_crypto::{encrypt, ContentEncryption, DecryptionKey, EncryptionKey};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use support::{
    evcs_jwk, jwks, sign_ipv, EVCS_PRIVATE, IPV_PRIVATE, IPV_PUBLIC, RSA_PRIVATE, RSA_PUBLIC,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORAGE_ACCESS_TOKEN: &str = "https://vocab.account.gov.uk/v1/storageAccessToken";

async fn evcs_jwks_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(vec![evcs_jwk("evcs-1")])))
        .mount(&server)
        .await;
    server
}

fn validator(server: &MockServer, env: Environment) -> ReverificationValidator {
    let keys = KeyStore::new(
        vec![
            KeyDescriptor::new(IPV).with_fallback_pem(IPV_PUBLIC).unwrap(),
            KeyDescriptor::new(EVCS)
                .with_jwks_url(format!("{}/.well-known/jwks.json", server.uri())),
        ],
        KeyStoreConfig::default(),
    )
    .unwrap();
    ReverificationValidator::new(Arc::new(keys), env)
}

fn storage_token_payload(env: &Environment) -> JsonValue {
    json!({
        "iss": env.storage_issuer(),
        "aud": [env.storage_audience(), env.identity_audience()],
        "sub": "urn:fdc:gov.uk:2022:someSub",
        "scope": "reverification",
        "jti": "c3d4e5f6-a7b8-9012-cdef-345678901234"
    })
}

fn sign_storage_token(claims: &JsonValue, pem: &str) -> String {
    sign_jws(claims, pem, Algorithm::ES256, Some("JWT"), Some("evcs-1")).unwrap()
}

fn request_payload(storage_token: &str) -> JsonValue {
    json!({
        "sub": "urn:fdc:gov.uk:2022:someSub",
        "scope": "reverification",
        "state": "STATE",
        "claims": {
            "userinfo": {
                STORAGE_ACCESS_TOKEN: { "values": [storage_token] }
            }
        }
    })
}

fn seal(token: &str) -> String {
    let key = EncryptionKey::from_pem(RSA_PUBLIC).unwrap();
    encrypt(token.as_bytes(), &key, ContentEncryption::A256Gcm).unwrap()
}

async fn validate(validator: &ReverificationValidator, payload: &JsonValue) -> ValidationOutcome {
    let envelope = seal(&sign_ipv(payload, None));
    let key = DecryptionKey::from_pem(RSA_PRIVATE).unwrap();
    validator.validate_request(&envelope, &key).await.unwrap()
}

#[tokio::test]
async fn valid_request_replaces_storage_token_with_claims() {
    let server = evcs_jwks_server().await;
    let env: Environment = "build".parse().unwrap();
    let storage = storage_token_payload(&env);
    let token = sign_storage_token(&storage, EVCS_PRIVATE);

    let claims = validate(&validator(&server, env), &request_payload(&token))
        .await
        .into_result()
        .unwrap();

    assert_eq!(claims["state"], "STATE");
    assert_eq!(
        claims["claims"]["userinfo"][STORAGE_ACCESS_TOKEN]["values"][0],
        storage
    );
}

#[tokio::test]
async fn request_scope_checked_first() {
    let server = evcs_jwks_server().await;
    let env = Environment::Production;
    let mut payload = request_payload("a.b.c");
    payload["scope"] = json!("openid");

    assert_eq!(
        validate(&validator(&server, env), &payload).await,
        ValidationOutcome::invalid("Scope in request payload must be reverification")
    );
}

#[tokio::test]
async fn storage_token_must_be_signed_by_evcs() {
    let server = evcs_jwks_server().await;
    let env: Environment = "build".parse().unwrap();
    // Right kid, wrong key
    let token = sign_storage_token(&storage_token_payload(&env), IPV_PRIVATE);

    assert_eq!(
        validate(&validator(&server, env), &request_payload(&token)).await,
        ValidationOutcome::invalid("signature verification failed")
    );
}

#[tokio::test]
async fn storage_token_claims_checked() {
    let server = evcs_jwks_server().await;
    let env: Environment = "staging".parse().unwrap();
    let cases = [
        ("scope", json!("openid"), "Storage access token scope is not reverification"),
        (
            "iss",
            json!(Environment::Production.storage_issuer()),
            "Storage access token issuer is invalid",
        ),
        ("aud", json!(env.identity_audience()), "Storage access token audience is invalid"),
    ];

    for (claim, value, expected) in cases {
        let mut storage = storage_token_payload(&env);
        storage[claim] = value;
        let token = sign_storage_token(&storage, EVCS_PRIVATE);
        assert_eq!(
            validate(&validator(&server, env.clone()), &request_payload(&token)).await,
            ValidationOutcome::invalid(expected),
            "{claim}"
        );
    }
}

#[tokio::test]
async fn storage_token_with_unknown_kid() {
    let server = evcs_jwks_server().await;
    let env: Environment = "build".parse().unwrap();
    let token = sign_jws(
        &storage_token_payload(&env),
        EVCS_PRIVATE,
        Algorithm::ES256,
        Some("JWT"),
        Some("evcs-2"),
    )
    .unwrap();

    assert_eq!(
        validate(&validator(&server, env), &request_payload(&token)).await,
        ValidationOutcome::invalid("Key not found in JWKS for provided kid")
    );
}
