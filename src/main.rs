//! Binary entry point for `ustrouter-send`.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ortho_config::OrthoConfig;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ustrouter_connector::{cli::SendCli, config::RouterSettings, connector};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = SendCli::parse();
    let settings = RouterSettings::load_from_iter([env!("CARGO_BIN_NAME")])
        .context("loading router settings")?
        .merge(cli.router);
    let lines = read_lines().await?;

    let connector = connector::global();
    connector.init(settings).context("starting router connector")?;
    let count = lines.len();
    connector.log_transaction(&cli.category, lines, cli.continue_txn.as_deref());

    if connector.wait_idle(Duration::from_millis(cli.linger_ms)).await {
        info!(lines = count, category = %cli.category, "transaction delivered");
    } else {
        warn!(state = %connector.state(), "router did not finish before exit");
    }
    Ok(())
}

async fn read_lines() -> Result<Vec<String>> {
    let mut reader = BufReader::new(io::stdin()).lines();
    let mut lines = Vec::new();
    while let Some(line) = reader.next_line().await.context("reading stdin")? {
        lines.push(line);
    }
    Ok(lines)
}
