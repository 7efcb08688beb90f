#![warn(missing_docs)]

//! rangecache daemon: runs a master and its workers on one host.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rangecache_coordinator::{CoordinationService, LocalNetwork};
use rangecache_spi::{CacheConfig, ClusterManager, InMemoryMetadataStore};
use tokio::task::JoinSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "rangecache", version, about = "Distributed range cache coordinator")]
struct Cli {
    /// Path to a TOML or JSON configuration file.
    #[arg(short, long, env = "RANGECACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Number of in-process workers heartbeating to the master.
    #[arg(short, long, default_value_t = 1)]
    workers: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    tracing::info!(master = %config.master_addr(), workers = cli.workers, "rangecache starting");

    let network = LocalNetwork::new();
    let master = start_service(
        &network,
        CacheConfig {
            on_master: true,
            ..config.clone()
        },
        config.master_addr(),
    )?;

    let mut services = Vec::with_capacity(cli.workers);
    let mut waiters = JoinSet::new();
    for i in 0..cli.workers {
        let host = format!("{}-worker-{}", config.master_host, i);
        let addr = format!("{}:{}", host, config.server_port);
        let worker = start_service(
            &network,
            CacheConfig {
                on_master: false,
                worker_host: Some(host),
                ..config.clone()
            },
            addr,
        )?;
        let waiter = Arc::clone(&worker);
        waiters.spawn(async move { waiter.wait().await });
        services.push(worker);
    }

    let membership = master.as_master().map(|m| m.cluster_manager());
    let report_interval = config.service_retry_interval();
    let reporter = tokio::spawn(async move {
        let Some(membership) = membership else {
            return;
        };
        let mut ticker = tokio::time::interval(report_interval);
        loop {
            ticker.tick().await;
            let nodes = membership.nodes();
            let active = nodes.iter().filter(|n| n.is_active()).count();
            tracing::info!(known = nodes.len(), active, "cluster membership");
        }
    });

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            tracing::info!("shutdown requested");
            Ok(())
        }
        Some(joined) = waiters.join_next() => match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::Error::new(e).context("worker heartbeat failed")),
            Err(e) => Err(anyhow::Error::new(e).context("worker task panicked")),
        },
    };

    reporter.abort();
    for worker in &services {
        worker.stop().await;
    }
    master.stop().await;

    if let Err(e) = &outcome {
        tracing::error!(error = %format!("{:#}", e), "rangecache exiting");
    }
    outcome
}

fn load_config(path: Option<&std::path::Path>) -> Result<CacheConfig> {
    match path {
        Some(path) if path.exists() => CacheConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        Some(path) => {
            tracing::warn!("Config file not found, using defaults: {}", path.display());
            Ok(CacheConfig::default())
        }
        None => Ok(CacheConfig::default()),
    }
}

fn start_service(
    network: &LocalNetwork,
    config: CacheConfig,
    addr: String,
) -> Result<Arc<CoordinationService>> {
    let store = Arc::new(InMemoryMetadataStore::new(config.block_size));
    let service = Arc::new(CoordinationService::from_config(
        Arc::new(config),
        store,
        network.connection_factory(),
    )?);
    network.bind(addr.clone(), &service);
    service
        .start()
        .with_context(|| format!("failed to start {} service at {}", service.role(), addr))?;
    Ok(service)
}
