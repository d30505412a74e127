//! Authentication stub HTTP server
//!
//! Hosts the token validation pipeline from `authstub-credential` behind the
//! endpoints the account management and identity proofing stubs expose.
//!
//! # Endpoints
//!
//! - `GET|POST /amc/authorize`: encrypted client assertion carrying an access token
//! - `GET /ipv/authorize`: encrypted reverification request carrying a storage access token
//! - `GET /ipv/.well-known/jwks.json`: public envelope key for request builders
//! - `GET /health`, `GET /stats`
//!
//! A valid request answers 200 with the claim set, a rejected one 400 with
//! `{"error": ...}`, and a mis-deployed stub 500.
//!
//! # Example
//!
//! ```ignore
//! use authstub_server::{AuthStubServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let server = AuthStubServer::new(config).await.unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use state::{AppState, DecryptionSource};
pub use telemetry::{init_logging, TelemetryConfig};

use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Authentication stub server
pub struct AuthStubServer {
    /// Application state
    state: Arc<AppState>,
    /// Configured router
    router: Router,
}

impl AuthStubServer {
    /// Create a new server with the given configuration
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let telemetry_config = TelemetryConfig::with_server_config(&config);
        Self::with_telemetry(config, telemetry_config).await
    }

    /// Create a server with an explicit telemetry configuration
    pub async fn with_telemetry(
        config: ServerConfig,
        telemetry_config: TelemetryConfig,
    ) -> Result<Self> {
        let state = Arc::new(AppState::new(config, telemetry_config).await?);
        let router = routes::build_router(state.clone());

        Ok(Self { state, router })
    }

    /// Get a reference to the application state
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Get the router for testing
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let addr = self.state.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;

        info!(
            addr = %addr,
            environment = self.state.config.environment.name(),
            amc_enabled = self.state.amc_decryption.is_some(),
            ipv_enabled = self.state.ipv_decryption.is_some(),
            "Authentication stub server starting"
        );

        axum::serve(listener, self.router).await
    }
}
