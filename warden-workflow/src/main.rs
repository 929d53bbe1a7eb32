//! Warden Workflow - Main entry point.

use anyhow::Result;
use warden_common::config::Config;
use warden_common::logging::init_logging;
use warden_workflow::WardenService;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Warden Workflow v{}", env!("CARGO_PKG_VERSION"));

    // Invalid settings are reported, not fatal
    if let Err(e) = config.validate() {
        tracing::warn!(error = %e, "Configuration has problems");
    }

    let service = WardenService::new(config);
    service.start().await
}
