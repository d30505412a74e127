//! Token verification for the authentication stubs
//!
//! Inbound requests carry a JWE whose plaintext is one or two layers of
//! signed JWTs. This crate resolves verification keys, verifies signatures,
//! and validates claims against environment-derived expected values.
//!
//! # Flows
//!
//! - [`CompositeValidator`]: client assertion (`typ: JWT`) embedding an access
//!   token (`typ: at+jwt`) in its `access_token` claim
//! - [`ReverificationValidator`]: reverification request embedding a storage
//!   access token in its userinfo claims
//!
//! # Outcomes
//!
//! Anything the caller could have caused (malformed envelope or token, bad
//! signature, unknown `kid`, failed claim check) is a
//! [`ValidationOutcome::Invalid`] carrying a message. `Err` is reserved for
//! deployment problems such as a counterparty with no usable key.
//!
//! # Example
//!
//! ```ignore
//! use authstub_credential::{
//!     CompositeValidator, KeyDescriptor, KeyStore, KeyStoreConfig, ValidationContext,
//!     ValidationOutcome, AMC_AUDIENCE, AUTH_AUDIENCE,
//! };
//!
//! let keys = KeyStore::new(
//!     vec![
//!         KeyDescriptor::new(AMC_AUDIENCE).with_fallback_pem(&amc_pem)?,
//!         KeyDescriptor::new(AUTH_AUDIENCE).with_fallback_pem(&auth_pem)?,
//!     ],
//!     KeyStoreConfig::default(),
//! )?;
//! let validator = CompositeValidator::new(Arc::new(keys), ValidationContext::new(env));
//!
//! match validator.validate_request(&jwe, &decryption_key).await? {
//!     ValidationOutcome::Valid(claims) => println!("{}", claims["sub"]),
//!     ValidationOutcome::Invalid(reason) => eprintln!("{reason}"),
//! }
//! ```

pub mod claims;
pub mod composite;
pub mod environment;
pub mod error;
mod jws;
pub mod resolver;
pub mod reverification;

pub use claims::{
    ClaimSet, ClaimShape, ValidationContext, ValidationOutcome, DEFAULT_CLIENT_ID,
    SCOPE_ACCOUNT_DELETE,
};
pub use composite::{access_token_claims, CompositeValidator, AMC_AUDIENCE, AUTH_AUDIENCE};
pub use environment::Environment;
pub use error::{CredentialError, Result};
pub use jws::{peek_header, sign_jws, verify_jws, verify_with_key, VerifiedToken};
pub use resolver::{
    KeyDescriptor, KeySource, KeyStore, KeyStoreConfig, ResolvedKey, JWKS_FETCH_TIMEOUT,
};
pub use reverification::{ReverificationValidator, EVCS, IPV, SCOPE_REVERIFICATION};

pub use jsonwebtoken::Algorithm;
