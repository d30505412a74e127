//! Account management stub: /amc/authorize

use super::{respond, AuthorizeParams};
use crate::error::Result;
use crate::state::AppState;
use crate::telemetry::{create_request_span, extract_request_id, mask_sensitive_data};
use authstub_credential::{ClaimSet, ValidationOutcome};
use axum::extract::{Form, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use std::sync::Arc;
use tracing::Instrument;

/// GET /amc/authorize?request=<jwe>
pub async fn authorize_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Result<Json<ClaimSet>> {
    authorize(state, headers, params).await
}

/// POST /amc/authorize with a form-encoded `request`
pub async fn authorize_form(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<AuthorizeParams>,
) -> Result<Json<ClaimSet>> {
    authorize(state, headers, params).await
}

async fn authorize(
    state: Arc<AppState>,
    headers: HeaderMap,
    params: AuthorizeParams,
) -> Result<Json<ClaimSet>> {
    let request_id = extract_request_id(&headers, &state.telemetry_config);
    let span = create_request_span("amc_authorize", request_id.as_deref());

    async move {
        let span = tracing::Span::current();
        let result: Result<ValidationOutcome> = async {
            let envelope = params.envelope()?;
            tracing::info!(
                request = %mask_sensitive_data(envelope, &state.telemetry_config.sensitive_data),
                "authorize request received"
            );
            let decryption = state.amc_decryption()?;
            Ok(state
                .amc
                .validate_request(envelope, decryption.unwrapper())
                .await?)
        }
        .await;
        respond(&span, result)
    }
    .instrument(span)
    .await
}
