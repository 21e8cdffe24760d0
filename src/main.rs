//! Edge gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │                   EDGE GATEWAY                    │
//!                       │                                                   │
//!   Client Request      │  ┌─────────┐    ┌──────────┐    ┌─────────────┐  │
//!   ────────────────────┼─▶│  http   │───▶│ routing  │───▶│  directory  │──┼──▶ platform API
//!                       │  │ server  │    │ classify │    └─────────────┘  │
//!                       │  └─────────┘    └────┬─────┘                     │
//!                       │                      │                           │
//!                       │        ┌─────────────┼──────────────┐            │
//!                       │        ▼             ▼              ▼            │
//!                       │  ┌──────────┐  ┌──────────┐  ┌───────────┐       │
//!                       │  │ security │  │ registry │  │   file    │       │
//!                       │  │  guard   │  │  proxy   │  │   proxy   │       │
//!                       │  └────┬─────┘  └────┬─────┘  └─────┬─────┘       │
//!                       │       ▼             │              │             │
//!                       │  ┌──────────┐       │              │             │
//!                       │  │ source-  │       │              │             │
//!                       │  │ control  │       │              │             │
//!                       │  └────┬─────┘       │              │             │
//!   Client Response     │       └─────────────┴──────────────┴──▶ upstreams│
//!   ◀───────────────────┼──────────── streamed relay ◀───────────────────  │
//!                       │                                                   │
//!                       │  config · observability · resilience · lifecycle  │
//!                       └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::admin::setup_admin_router;
use edge_gateway::config::{load_config, GatewayConfig};
use edge_gateway::http::server::AppState;
use edge_gateway::lifecycle::{signals, Gateway, Scheduler, Shutdown};
use edge_gateway::observability::{logging, metrics};
use edge_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "edge-gateway", version, about = "Edge reverse-proxy gateway")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logging depends on the config, so config errors go to stderr.
    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("edge-gateway: failed to load {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-gateway starting");

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin_listener = if config.admin.enabled {
        Some(TcpListener::bind(&config.admin.bind_address).await?)
    } else {
        None
    };

    let gateway = Arc::new(Gateway::from_config(config)?);
    let shutdown = Shutdown::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signals::shutdown_signal().await;
            shutdown.trigger();
        }
    });

    tokio::spawn(Scheduler::new(Arc::clone(&gateway)).run(shutdown.subscribe()));

    if let Some(admin_listener) = admin_listener {
        let app = setup_admin_router(AppState {
            gateway: Arc::clone(&gateway),
        });
        let stop = shutdown.signalled();
        tokio::spawn(async move {
            tracing::info!(address = ?admin_listener.local_addr().ok(), "Admin API listening");
            if let Err(e) = axum::serve(admin_listener, app)
                .with_graceful_shutdown(stop)
                .await
            {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
    }

    GatewayServer::new(gateway)
        .run(listener, shutdown.signalled())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
