//! Serves the ranking API over HTTP.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use toprank::logging::init_logging;
use toprank::sources::MemoryContributionStore;
use toprank::{RankingService, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "toprank-server", version, about = "Ranked project and contribution API")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON array of contribution records (overrides `records_path`)
    #[arg(long)]
    records: Option<PathBuf>,

    /// Listen port (overrides the config file and PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ServiceConfig::default(),
    }
    .with_env_overrides();
    if let Some(port) = cli.port {
        config.port = port;
    }

    let contributions = match cli.records.as_ref().or(config.records_path.as_ref()) {
        Some(path) => MemoryContributionStore::from_file(path)
            .with_context(|| format!("failed to load records from {}", path.display()))?,
        None => MemoryContributionStore::default(),
    };
    tracing::info!(records = contributions.len(), "contribution store ready");

    let service = RankingService::builder()
        .config(&config)
        .contributions(contributions)
        .build();

    let shutdown = CancellationToken::new();
    let reaper = service.spawn_reaper(config.reaper_interval(), shutdown.clone());

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down");
        }
        signal.cancel();
    });

    let addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), config.port);
    toprank::http::serve(service, addr, shutdown.clone()).await?;

    shutdown.cancel();
    reaper.await.context("reaper task failed")?;
    Ok(())
}
