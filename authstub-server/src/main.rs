//! Authentication stub server CLI
//!
//! Run with: `cargo run -p authstub-server -- --help`

use authstub_server::{
    telemetry::{init_logging, TelemetryConfig},
    AuthStubServer, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI + env via clap
    let config = ServerConfig::from_args();
    config.validate()?;

    let telemetry_config = TelemetryConfig::with_server_config(&config);
    init_logging(&telemetry_config);

    // Log startup info
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.listen_addr,
        environment = config.environment.name(),
        amc_client_id = %config.amc_client_id,
        ipv_jwks = config.ipv_jwks_url.as_deref(),
        evcs_jwks = config.evcs_jwks_url.as_deref(),
        kms = config.kms_key_id.is_some(),
        jwks_cache_ttl_secs = config.jwks_cache_ttl_secs,
        log_format = ?telemetry_config.log_format,
        sensitive_data = ?telemetry_config.sensitive_data,
        "Starting authentication stub server"
    );

    let server = AuthStubServer::with_telemetry(config, telemetry_config).await?;
    server.run().await.map_err(Into::into)
}
