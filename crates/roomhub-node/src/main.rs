//! Roomhub Node - real-time chat WebSocket server.

use anyhow::Context;
use clap::Parser;
use roomhub_node::{
    api::AppState,
    config::Config,
    observability::{init_logging, LogFormat},
    serve,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Roomhub Node - room-scoped real-time chat over WebSockets
#[derive(Parser, Debug)]
#[command(name = "roomhub-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "roomhub.yaml")]
    config: PathBuf,

    /// API listen address
    #[arg(long)]
    listen_addr: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Maximum concurrent WebSocket sessions
    #[arg(long)]
    max_connections: Option<usize>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(Some(args.config.as_path()))
        .with_context(|| format!("loading {}", args.config.display()))?;
    args.apply(&mut config);
    config.check()?;

    init_logging(&config.log_level, config.log_format)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting roomhub node");
    tracing::info!(
        listen_addr = %config.listen_addr,
        max_connections = config.max_connections,
        allowed_origins = ?config.allowed_origins,
        users = config.directory.users.len(),
        rooms = config.directory.rooms.len(),
        "Node configuration"
    );

    let store = Arc::new(config.directory.build_store());
    let state = AppState::new(&config, store);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "Node is ready. Press Ctrl+C to stop.");

    serve(listener, state).await?;
    Ok(())
}
