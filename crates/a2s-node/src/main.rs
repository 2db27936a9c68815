//! A2S node - runs the callback bridge gateway.

mod config;
mod telemetry;

use a2s_gateway::GatewayService;
use anyhow::{Context, Result};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let telemetry_config = telemetry::TelemetryConfig::from_env();
    telemetry::init(&telemetry_config)?;

    // Load configuration
    let config = config::load_config().context("loading configuration from environment")?;
    info!(
        version = a2s_gateway::VERSION,
        http = %config.http_addr(),
        admin_enabled = config.admin.enabled,
        default_expire_secs = config.bridge.default_expire,
        "Configuration loaded"
    );

    let mut service = GatewayService::new(config)?;

    // Stop on Ctrl+C
    if let Some(shutdown) = service.shutdown_handle() {
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for Ctrl+C");
                // Keep the sender alive so the service is not stopped
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
            let _ = shutdown.send(());
        });
    }

    info!("Node is running. Press Ctrl+C to stop.");
    service.start().await?;

    Ok(())
}
