//! LDP Transforming Proxy
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │            TRANSFORMING PROXY                │
//!     Client Request       │  ┌─────────┐    ┌──────────┐                 │
//!     ─────────────────────┼─▶│  http   │───▶│ request  │─────────────────┼───▶ LDP
//!                          │  │ server  │    │ forward  │                 │    Backend
//!     Client Response      │  └─────────┘    └──────────┘                 │
//!     ◀────────────────────┼──│response │◀────────────────────────────────┼────
//!                          │  │ relay   │                                 │
//!                          │  └────┬────┘                                 │
//!                          │       │ POST 201 (spawned)                   │
//!                          │       ▼                                      │
//!                          │  ┌─────────┐  ┌─────────┐  ┌─────────────┐   │
//!                          │  │dispatch │─▶│  rdf    │─▶│  locator +  │   │
//!                          │  │         │  │ parse   │  │   policy    │   │
//!                          │  └─────────┘  └─────────┘  └──────┬──────┘   │
//!                          │                                   ▼          │
//!                          │                            ┌─────────────┐   │
//!                          │                            │  invoker    │───┼───▶ Transformer
//!                          │                            │ (in-flight) │   │
//!                          │                            └─────────────┘   │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use ldp_transforming_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use ldp_transforming_proxy::lifecycle::signals::wait_for_termination;
use ldp_transforming_proxy::observability::{logging, metrics};
use ldp_transforming_proxy::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "ldp-transforming-proxy", version, about = "Transforming reverse proxy for LDP servers")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URI, overrides the configuration file
    #[arg(short, long)]
    backend: Option<String>,

    /// Bind address, overrides the configuration file
    #[arg(long)]
    bind: Option<String>,
}

fn load(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(backend) = &cli.backend {
        config.backend.base_uri = backend.clone();
    }
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ldp-transforming-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.base_uri,
        supported_media_types = ?config.transformer.supported_media_types,
        probe_capabilities = config.transformer.probe_capabilities,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            result??;
            tracing::warn!("HTTP server exited without a shutdown signal");
            return Ok(());
        }
        signal = wait_for_termination() => {
            tracing::info!(signal = signal?, "Shutdown signal received");
        }
    }
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
