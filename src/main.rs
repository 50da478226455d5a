use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use phased_pipeline::config::{load_config, ServerConfig};
use phased_pipeline::lifecycle::{build_application, spawn_signal_handler, Shutdown};
use phased_pipeline::observability::{logging, metrics};
use phased_pipeline::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "phased-server", version, about = "HTTP server built on phased interceptor pipelines")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "phased-server starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        return_policy = ?config.pipeline.return_policy,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let application = build_application(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config, application);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
