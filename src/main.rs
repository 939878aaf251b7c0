//! REST API service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ trace id ─▶ access log ─▶ timeout / body limit
//!                                                   │
//!                                                   ▼
//!                                    MultiRouter ("/api")
//!                              ┌────────────┴────────────┐
//!                              ▼                         ▼
//!                      Router ("/v1")            Router ("/health")
//!                 CORS ─▶ auth ─▶ permission          handler
//!                              │
//!                              ▼
//!                           handler
//! ```
//!
//! Startup order: config → observability → routers (all validation) →
//! route listing → listener. Any failure before the listener binds aborts.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use rest_router::app::build_api;
use rest_router::config::{load_config, ServiceConfig};
use rest_router::lifecycle::{signals, startup, Shutdown};
use rest_router::HttpServer;

#[derive(Parser)]
#[command(name = "rest-router")]
#[command(about = "REST API router with composable middleware", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print every registered route and exit.
    #[arg(long)]
    list_routes: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    if cli.list_routes {
        for route in build_api(&config)?.list_routes() {
            println!("{route}");
        }
        return Ok(());
    }

    startup::init_observability(&config)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rest-router starting");

    let api = build_api(&config)?;
    tracing::info!("Configured routes:");
    for route in api.list_routes() {
        tracing::info!(method = %route.method, path = %route.path, "Route");
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        request_timeout_secs = config.timeouts.request_secs,
        drain_timeout_secs = config.shutdown.drain_timeout_secs,
        "Listening for connections"
    );

    let shutdown = Arc::new(Shutdown::new());
    let shutdown_rx = shutdown.subscribe();
    signals::spawn_signal_handler(Arc::clone(&shutdown));

    HttpServer::new(&config, api)
        .run(listener, shutdown_rx)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
