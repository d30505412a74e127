//! Claim validation for the client assertion and access token shapes
//!
//! Checks run in a fixed order so a given malformed token always yields the
//! same message. Failures are returned as [`ValidationOutcome::Invalid`],
//! never as errors.
//!
//! # Client assertion (outer token)
//! 1. `scope` - exactly `["account-delete"]`
//! 2. `iss` - the environment's auth issuer
//! 3. `aud` - the environment's account management API audience
//! 4. `sub` - internal subject
//! 5. `public_sub` - public subject
//! 6. `client_id` - the configured client id
//! 7. `jti`
//!
//! # Access token (inner token)
//! 1. `scope` - one or more entries, each in the scope vocabulary
//! 2. `iss` - the environment's auth issuer
//! 3. `aud` - the environment's auth audience
//! 4. `sub`
//! 5. `client_id`
//! 6. `jti`

use crate::environment::Environment;
use serde_json::{Map, Value};
use thiserror::Error;

/// Decoded token payload, in the order the claims were received
pub type ClaimSet = Map<String, Value>;

/// The only scope a client assertion may carry
pub const SCOPE_ACCOUNT_DELETE: &str = "account-delete";

/// Every scope an access token may carry
pub const SCOPE_VOCABULARY: &[&str] = &[SCOPE_ACCOUNT_DELETE];

/// Client id expected in client assertions unless configured otherwise
pub const DEFAULT_CLIENT_ID: &str = "auth_amc";

/// Result of validating a claim set
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Every check passed; the claim set is returned unchanged
    Valid(ClaimSet),
    /// A check failed; the message is safe to return to the caller
    Invalid(String),
}

impl ValidationOutcome {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The failure message, if invalid
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(reason) => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<ClaimSet, String> {
        match self {
            Self::Valid(claims) => Ok(claims),
            Self::Invalid(reason) => Err(reason),
        }
    }
}

/// Expected values that do not come from the token itself
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub environment: Environment,
    /// Required `client_id` of client assertions
    pub client_id: String,
}

impl ValidationContext {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }
}

/// Which set of rules a claim set is validated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimShape {
    ClientAssertion,
    AccessToken,
}

impl ClaimShape {
    /// Validate `claims` against this shape's rules.
    pub fn validate(self, claims: ClaimSet, context: &ValidationContext) -> ValidationOutcome {
        let failure = match self {
            Self::ClientAssertion => check_client_assertion(&claims, context)
                .err()
                .map(|f| f.to_string()),
            Self::AccessToken => check_access_token(&claims, &context.environment)
                .err()
                .map(|f| f.to_string()),
        };
        match failure {
            None => ValidationOutcome::Valid(claims),
            Some(reason) => {
                tracing::info!(shape = ?self, reason = reason.as_str(), "claim validation failed");
                ValidationOutcome::Invalid(reason)
            }
        }
    }
}

/// Client assertion failures, in check order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClientAssertionFailure {
    // Names the scope by its enum constant, as downstream tests assert
    #[error("The client assertion JWT payload scope should be 'ACCOUNT_DELETE'")]
    Scope,
    #[error("The client assertion JWT payload issuer is invalid")]
    Issuer,
    #[error("The client assertion JWT payload audience is invalid")]
    Audience,
    #[error("The client assertion JWT payload must contain an internal subject")]
    Subject,
    #[error("The client assertion JWT payload must contain a public subject")]
    PublicSubject,
    // Message predates the `auth_amc` client id and is asserted verbatim downstream
    #[error("The client assertion JWT client ID must be 'auth'")]
    ClientId,
    #[error("The client assertion JWT payload must contain a jti")]
    Jti,
}

/// Access token failures, in check order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessTokenFailure {
    #[error("The access token payload contains invalid scopes")]
    Scope,
    #[error("The access token payload issuer is invalid")]
    Issuer,
    #[error("The access token payload audience is invalid")]
    Audience,
    #[error("The access token payload must contain an internal subject")]
    Subject,
    #[error("The access token payload must contain a client ID")]
    ClientId,
    #[error("The access token payload must contain a jti")]
    Jti,
}

fn check_client_assertion(
    claims: &ClaimSet,
    context: &ValidationContext,
) -> Result<(), ClientAssertionFailure> {
    let env = &context.environment;

    let scopes = string_array(claims.get("scope"));
    if scopes.as_deref() != Some(&[SCOPE_ACCOUNT_DELETE][..]) {
        return Err(ClientAssertionFailure::Scope);
    }
    if str_claim(claims, "iss") != Some(env.auth_issuer().as_str()) {
        return Err(ClientAssertionFailure::Issuer);
    }
    if !audience_matches(claims.get("aud"), &env.amc_audience()) {
        return Err(ClientAssertionFailure::Audience);
    }
    if str_claim(claims, "sub").is_none() {
        return Err(ClientAssertionFailure::Subject);
    }
    if str_claim(claims, "public_sub").is_none() {
        return Err(ClientAssertionFailure::PublicSubject);
    }
    if str_claim(claims, "client_id") != Some(context.client_id.as_str()) {
        return Err(ClientAssertionFailure::ClientId);
    }
    if str_claim(claims, "jti").is_none() {
        return Err(ClientAssertionFailure::Jti);
    }
    Ok(())
}

fn check_access_token(claims: &ClaimSet, env: &Environment) -> Result<(), AccessTokenFailure> {
    let scopes_valid = string_array(claims.get("scope")).is_some_and(|scopes| {
        !scopes.is_empty() && scopes.iter().all(|s| SCOPE_VOCABULARY.contains(s))
    });
    if !scopes_valid {
        return Err(AccessTokenFailure::Scope);
    }
    if str_claim(claims, "iss") != Some(env.auth_issuer().as_str()) {
        return Err(AccessTokenFailure::Issuer);
    }
    if !audience_matches(claims.get("aud"), &env.auth_audience()) {
        return Err(AccessTokenFailure::Audience);
    }
    if str_claim(claims, "sub").is_none() {
        return Err(AccessTokenFailure::Subject);
    }
    if str_claim(claims, "client_id").is_none() {
        return Err(AccessTokenFailure::ClientId);
    }
    if str_claim(claims, "jti").is_none() {
        return Err(AccessTokenFailure::Jti);
    }
    Ok(())
}

/// A non-empty string claim. Other JSON types count as absent.
pub(crate) fn str_claim<'a>(claims: &'a ClaimSet, name: &str) -> Option<&'a str> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// An array made only of strings. A bare string or mixed array is rejected.
fn string_array(value: Option<&Value>) -> Option<Vec<&str>> {
    value?.as_array()?.iter().map(Value::as_str).collect()
}

/// `aud` is either the expected string or an array containing it.
pub(crate) fn audience_matches(value: Option<&Value>, expected: &str) -> bool {
    match value {
        Some(Value::String(aud)) => aud == expected,
        Some(Value::Array(auds)) => auds.iter().any(|aud| aud.as_str() == Some(expected)),
        _ => false,
    }
}
