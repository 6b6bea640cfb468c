//! Roster server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate (development)
//! roster-server --bind 0.0.0.0:12345
//!
//! # Start with TLS certificate (production)
//! roster-server --bind 0.0.0.0:12345 --cert cert.pem --key key.pem
//! ```

use clap::Parser;
use roster_server::{CoordinatorConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Live presence counter server
#[derive(Parser, Debug)]
#[command(name = "roster-server")]
#[command(about = "Broadcasts the live connected-session count to every client")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:12345")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long)]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long)]
    key: Option<String>,

    /// Bound on the session id space (maximum concurrent sessions)
    #[arg(long, default_value = "10000000")]
    max_sessions: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("roster server starting");
    tracing::info!("binding to {}", args.bind);

    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
        tracing::warn!("This is NOT suitable for production use!");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        cert_path: args.cert,
        key_path: args.key,
        coordinator: CoordinatorConfig { id_space: args.max_sessions, ..Default::default() },
        ..Default::default()
    };

    let server = Server::bind(config)?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
