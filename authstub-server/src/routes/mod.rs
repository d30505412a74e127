//! HTTP route handlers and router configuration

mod admin;
mod amc;
mod ipv;

use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::telemetry::record_outcome;
use authstub_credential::{ClaimSet, ValidationOutcome};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the main application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(admin::health))
        .route("/stats", get(admin::stats))
        // Account management stub
        .route("/amc/authorize", get(amc::authorize_query).post(amc::authorize_form))
        // Identity proofing stub
        .route("/ipv/authorize", get(ipv::authorize))
        .route("/ipv/.well-known/jwks.json", get(ipv::jwks))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// The `request` parameter carrying the compact JWE
#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub request: Option<String>,
}

impl AuthorizeParams {
    fn envelope(&self) -> Result<&str> {
        match self.request.as_deref().map(str::trim) {
            Some(envelope) if !envelope.is_empty() => Ok(envelope),
            _ => Err(ServerError::bad_request("Missing request parameter")),
        }
    }
}

/// Map a validation result onto the response, recording it on the span.
fn respond(span: &tracing::Span, result: Result<ValidationOutcome>) -> Result<Json<ClaimSet>> {
    match result {
        Ok(ValidationOutcome::Valid(claims)) => {
            record_outcome(span, "valid", None);
            tracing::info!("request validated");
            Ok(Json(claims))
        }
        Ok(ValidationOutcome::Invalid(reason)) => {
            record_outcome(span, "invalid", Some("ERR_VALIDATION"));
            Err(ServerError::Invalid(reason))
        }
        Err(e) => {
            record_outcome(span, "error", Some(e.code()));
            Err(e)
        }
    }
}
