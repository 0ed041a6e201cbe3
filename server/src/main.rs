use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slirc_server::config::BridgeConfig;
use slirc_server::engine::registry::SessionRegistry;
use slirc_server::irc::connection::Gateway;
use slirc_server::irc::listener::{load_tls_acceptor, start_irc_listener};

#[derive(Parser)]
#[command(name = "slirc-server", about = "IRC gateway to Slack workspaces")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "slirc.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = BridgeConfig::load(&cli.config)?;

    let tls_acceptor = match (&config.server.irc_tls_cert, &config.server.irc_tls_key) {
        (Some(cert), Some(key)) => Some(load_tls_acceptor(cert, key)?),
        _ => None,
    };

    // One registry for the whole process, shared by every connection handler.
    let registry = Arc::new(SessionRegistry::new());
    let gateway = Arc::new(Gateway::new(&config, registry));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C, shutting down");
            shutdown.cancel();
        }
    });

    info!(
        server_name = %config.server.server_name,
        slack_api = %config.slack.api_url,
        "slirc starting"
    );

    start_irc_listener(&config.server.irc_address, gateway, cancel, tls_acceptor)
        .await
        .context("IRC listener failed")
}
