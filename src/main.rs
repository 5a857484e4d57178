//! # GNSS Uplink
//!
//! Report the position of a GNSS receiver to a telemetry collector every
//! cycle, bringing the data link up only for the upload.
//!
//! Usage: `gnss-uplink [CONFIG]` (default `config/default.toml`).

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use gnss_uplink::config::Config;
use gnss_uplink::gnss::serial::NmeaSerialSource;
use gnss_uplink::gnss::PositionAcquisitionService;
use gnss_uplink::http::ReqwestTransferClient;
use gnss_uplink::link::{TcpReachabilityLink, LINK_EVENT_CHANNEL_CAPACITY};
use gnss_uplink::logging;
use gnss_uplink::orchestrator::{ConnectionOrchestrator, OrchestrationContext};
use gnss_uplink::telemetry::TelemetryEndpoint;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Start the position worker on its own thread
///    - Build the link manager and HTTP client
///
/// 2. **Upload cycle**
///    - Run the orchestrator until Ctrl+C
///
/// 3. **Shutdown**
///    - Release any outstanding connection and log session statistics
///
/// # Errors
///
/// Returns error if the configuration is invalid, the HTTP client cannot be
/// built or the position worker cannot be started
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = logging::init(&config.logging);

    info!("GNSS Uplink v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let source = NmeaSerialSource::new(&config.gnss);
    info!("GNSS receiver at {} ({} baud)", source.device_path(), config.gnss.baud_rate);

    let (service, latest_fix, refresh) =
        PositionAcquisitionService::new(source, config.gnss.reconnect_interval());
    let _worker = service.spawn().context("Failed to start position worker")?;

    let (link_tx, link_rx) = mpsc::channel(LINK_EVENT_CHANNEL_CAPACITY);
    let link = TcpReachabilityLink::new(&config.link, link_tx);
    let http = ReqwestTransferClient::new(&config.http).context("Failed to build HTTP client")?;

    let ctx = OrchestrationContext {
        endpoint: TelemetryEndpoint::new(&config.telemetry),
        http: Arc::new(http),
        link: Arc::new(link),
        latest_fix,
        refresh,
        schedule: config.schedule.clone(),
    };

    info!("Press Ctrl+C to exit");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down...");
    };

    let stats = ConnectionOrchestrator::new(ctx).run(link_rx, shutdown).await;
    info!("Completed {} cycles, {} uploads accepted", stats.cycles, stats.uploads_ok);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).expect("shipped config should be valid");
        assert_eq!(config.schedule.cycle_interval_s, 30);
        assert_eq!(config.schedule.connection_timeout_s, 10);
    }
}
