//! Identity proofing stub: /ipv/authorize, /ipv/.well-known/jwks.json

use super::{respond, AuthorizeParams};
use crate::error::Result;
use crate::state::AppState;
use crate::telemetry::{create_request_span, extract_request_id, mask_sensitive_data};
use authstub_credential::{ClaimSet, ValidationOutcome};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::Instrument;

/// GET /ipv/authorize?request=<jwe>
///
/// On success the storage access token inside the request is replaced by
/// its decoded claims.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Result<Json<ClaimSet>> {
    let request_id = extract_request_id(&headers, &state.telemetry_config);
    let span = create_request_span("ipv_authorize", request_id.as_deref());

    async move {
        let span = tracing::Span::current();
        let result: Result<ValidationOutcome> = async {
            let envelope = params.envelope()?;
            tracing::info!(
                request = %mask_sensitive_data(envelope, &state.telemetry_config.sensitive_data),
                "authorize request received"
            );
            let decryption = state.ipv_decryption()?;
            Ok(state
                .ipv
                .validate_request(envelope, decryption.unwrapper())
                .await?)
        }
        .await;
        respond(&span, result)
    }
    .instrument(span)
    .await
}

/// GET /ipv/.well-known/jwks.json
///
/// Publishes the public half of the envelope key. An empty set is served,
/// with a shorter cache lifetime, when no key is configured or the key
/// service cannot be reached.
pub async fn jwks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(decryption) = state.ipv_decryption.as_ref() else {
        return empty_jwks();
    };
    match decryption.public_key().await.and_then(|key| key.to_jwk()) {
        Ok(jwk) => (
            [(header::CACHE_CONTROL, JWKS_CACHE_CONTROL)],
            Json(json!({ "keys": [jwk] })),
        ),
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "failed to load public encryption key");
            empty_jwks()
        }
    }
}

const JWKS_CACHE_CONTROL: &str = "public, max-age=3600";
const EMPTY_JWKS_CACHE_CONTROL: &str = "public, max-age=300";

fn empty_jwks() -> ([(HeaderName, &'static str); 1], Json<JsonValue>) {
    (
        [(header::CACHE_CONTROL, EMPTY_JWKS_CACHE_CONTROL)],
        Json(json!({ "keys": [] })),
    )
}
