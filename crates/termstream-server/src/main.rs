//! Terminal streaming core server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with a self-signed certificate (development)
//! termstream-server --host 0.0.0.0 --port 7880 --tls
//!
//! # Start with TLS material from disk (production)
//! termstream-server --host 0.0.0.0 --port 7880 --tls --cert cert.pem --key key.pem
//! ```

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use termstream_server::{FileConfig, PermissiveAuthenticator, RuntimeConfig, Server, SharedDriver};
use termstream_core::service::StreamingDataService;

/// Terminal streaming core server.
#[derive(Parser, Debug)]
#[command(name = "termstream-server")]
#[command(about = "Production runtime for the terminal streaming core")]
#[command(version)]
struct Args {
    /// Address to bind to.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind to.
    #[arg(long, default_value = "7880")]
    port: u16,

    /// Wrap connections in TLS.
    #[arg(long)]
    tls: bool,

    /// Path to TLS certificate (PEM format).
    #[arg(long)]
    cert: Option<String>,

    /// Path to TLS private key (PEM format).
    #[arg(long)]
    key: Option<String>,

    /// Require and verify client certificates (mutual TLS). Implies `--tls`.
    #[arg(long)]
    mtls: bool,

    /// Path to a TOML configuration file, layered beneath these flags.
    #[arg(long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut config = match &args.config {
        Some(path) => FileConfig::load(path)?.merge_onto(RuntimeConfig::default()),
        None => RuntimeConfig::default(),
    };

    config.host = args.host;
    config.port = args.port;
    if args.tls {
        config.tls = true;
    }
    if args.mtls {
        config.mtls = true;
        config.tls = true;
    }
    if args.cert.is_some() {
        config.cert = args.cert;
    }
    if args.key.is_some() {
        config.key = args.key;
    }

    if config.tls && (config.cert.is_none() || config.key.is_none()) {
        tracing::warn!("no TLS certificate provided, using a self-signed certificate");
        tracing::warn!("this is not suitable for production use");
    }

    tracing::info!("terminal streaming core server starting");

    let service = StreamingDataService::new(config.service);
    let shared = Arc::new(SharedDriver::new(
        service,
        config.service.reconnection,
        Arc::new(PermissiveAuthenticator),
        std::time::Instant::now(),
    ));

    let server = Server::bind(&config, shared).await?;
    tracing::info!(address = %server.local_addr()?, "listening");

    server.run().await?;

    Ok(())
}
