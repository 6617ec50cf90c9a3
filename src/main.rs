//! Caddy proxy route controller.
//!
//! # Architecture Overview
//!
//! ```text
//!     routes.toml ──▶ config loader ──▶ ┌───────────────────────┐
//!          │                            │      Reconciler       │
//!          └──▶ watcher (reload) ─────▶ │  due resources, N at  │
//!                                       │  a time, with backoff │
//!                                       └──────────┬────────────┘
//!                                                  │ observe / create /
//!                                                  │ update / delete
//!                                                  ▼
//!     state.json ◀── persisted status      Caddy admin API (/config/...)
//! ```
//!
//! With `--once` a single pass runs and the exit status reflects whether
//! every resource reconciled cleanly.

use std::path::PathBuf;

use clap::Parser;

use proxy_route_controller::config::load_config;
use proxy_route_controller::config::watcher::ConfigWatcher;
use proxy_route_controller::lifecycle::{shutdown_signal, Shutdown};
use proxy_route_controller::observability::{logging, metrics};
use proxy_route_controller::{Connector, Reconciler};

#[derive(Parser)]
#[command(name = "proxy-route-controller")]
#[command(about = "Keeps Caddy reverse proxy routes in line with a config file", long_about = None)]
struct Args {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "routes.toml")]
    config: PathBuf,

    /// Run a single reconcile pass and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config).map_err(|e| {
        format!("failed to load config {}: {e}", args.config.display())
    })?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        routes = config.routes.len(),
        "proxy-route-controller starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let connector = Connector::from_config(&config.http).inspect_err(|e| {
        tracing::error!(error = %e, "Failed to build admin API client");
    })?;

    let reconciler = Reconciler::from_config(connector, &config);
    reconciler.restore().inspect_err(|e| {
        tracing::error!(error = %e, "Failed to restore persisted state");
    })?;
    reconciler.set_desired(config.desired_routes());

    if args.once {
        let summary = reconciler.run_pass().await;
        reconciler.persist().inspect_err(|e| {
            tracing::error!(error = %e, "Failed to persist controller state");
        })?;
        tracing::info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            failed = summary.failed,
            "Single pass complete"
        );
        if !summary.is_clean() {
            return Err(format!("{} resources failed to reconcile", summary.failed).into());
        }
        return Ok(());
    }

    let (watcher, updates) = ConfigWatcher::new(&args.config);
    // Dropping the handle stops the watch.
    let _watch = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
            None
        }
    };

    let shutdown = Shutdown::new();
    let loop_shutdown = shutdown.subscribe();

    tokio::select! {
        _ = reconciler.run(updates, loop_shutdown) => {}
        _ = async {
            shutdown_signal().await;
            shutdown.trigger();
            std::future::pending::<()>().await;
        } => {}
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
