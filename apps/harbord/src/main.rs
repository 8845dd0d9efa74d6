//! # harbord
//!
//! Background daemon running the Harbor backup & sync engine.
//!
//! ```text
//! harbord [--config <path>]
//!
//!   HARBOR_CONFIG      config file path (overridden by --config)
//!   HARBOR_*           per-setting overrides, see harbor_sync::config
//!   RUST_LOG           log filter, default "info"
//! ```
//!
//! On first start the effective configuration is written back to the config
//! file so the generated device id stays stable across restarts.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use harbor_sync::{HarborConfig, HarborEngine};

#[derive(Debug, Parser)]
#[command(name = "harbord", version, about = "Harbor backup & sync daemon")]
struct Args {
    /// Configuration file; defaults to the platform config directory.
    #[arg(short, long, env = "HARBOR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let args = Args::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting harbord");

    let config_path = args.config.or_else(HarborConfig::default_config_path);
    let config = HarborConfig::load(config_path.clone()).context("Failed to load configuration")?;

    if let Some(path) = config_path.as_ref().filter(|p| !p.exists()) {
        match config.save(Some(path.clone())) {
            Ok(()) => info!(path = %path.display(), "Wrote initial configuration"),
            Err(e) => warn!(error = %e, "Could not persist configuration; device id will change on restart"),
        }
    }

    let (engine, db) = HarborEngine::open(config)
        .await
        .context("Failed to open engine")?;

    let status = engine.sync().status().await?;
    info!(
        device_id = %engine.device_id(),
        remote = status.remote_configured,
        pending_operations = status.pending_operations,
        "Engine opened"
    );

    let scheduler = engine.spawn_scheduler();
    if scheduler.tasks().is_empty() {
        info!("No periodic tasks enabled; set backup.auto_backup or sync.auto_sync");
    }

    shutdown_signal().await;

    scheduler.shutdown().await?;
    db.close().await;

    info!("harbord stopped");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_config_flag() {
        let args = Args::try_parse_from(["harbord", "--config", "/etc/harbor.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/harbor.toml")));

        let args = Args::try_parse_from(["harbord", "-c", "harbor.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("harbor.toml")));

        assert!(Args::try_parse_from(["harbord", "--config"]).is_err());
        assert!(Args::try_parse_from(["harbord", "--verbose"]).is_err());
    }
}
