//! The `riptidekv-server` binary: parses startup flags, opens the tree
//! at the configured data directory, and serves the command protocol
//! over TCP until the process is killed.

mod protocol;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use config::Cli;
use engine::Tree;
use protocol::AppState;
use std::sync::Arc;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let port = cli.port;
    let config = cli.into_config();
    config.validate().context("invalid startup configuration")?;

    info!(data_dir = %config.data_dir.display(), policy = %config.policy, "opening tree");
    let tree = Tree::open(config).context("opening the tree")?;
    let state = Arc::new(AppState::new(tree));

    let addr = format!("0.0.0.0:{port}");
    server::serve(&addr, state)
}
