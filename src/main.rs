//! Request logging demo server
//!
//! Serves an echo handler behind the request logging middleware.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────────▶ SetRequestIdLayer ──▶ real_ip ──▶ RequestLogLayer ──▶ echo_handler
//!                             (rid)             (ip)        request.start        handler.start
//!                                                                                handler.end
//!     Client Response
//!     ◀───────────────── ObservedBody (status, size) ──────▶ request.end
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_log::config::{load_config, ServerConfig};
use request_log::http::server::shutdown_signal;
use request_log::observability::init_tracing;
use request_log::HttpServer;

#[derive(Parser)]
#[command(name = "request-log")]
#[command(about = "Echo server demonstrating request/response logging", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_tracing(&config.observability)?;

    tracing::info!("request-log v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_log = config.request_log.enabled,
        output = ?config.request_log.output,
        format = ?config.request_log.format,
        "Configuration loaded"
    );

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        "Listening for connections"
    );

    let server = HttpServer::new(config);
    server.run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
