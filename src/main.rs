// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Contract source discovery monitor
//!
//! Tails blocks on the configured chains, detects contract creations,
//! and harvests compiler metadata and sources from Swarm/IPFS into a
//! content-addressed repository.

use clap::Parser;
use prometheus::Registry;
use source_verify_monitor::config::{ChainEndpoint, MonitorConfig};
use source_verify_monitor::metrics::{serve_metrics, MonitorMetrics};
use source_verify_monitor::monitor::Monitor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(rename_all = "kebab-case", author, version)]
struct Args {
    /// YAML config file; flags below override its values
    #[clap(env, long)]
    config: Option<PathBuf>,
    /// Monitor a single chain by name instead of the default set
    #[clap(env, long)]
    chain: Option<String>,
    /// RPC endpoint for --chain; defaults to the Infura endpoint for
    /// that name
    #[clap(env, long)]
    chain_url: Option<String>,
    #[clap(env, long)]
    infura_project_id: Option<String>,
    /// Repository root all artifacts are written under
    #[clap(env, long)]
    repository: Option<PathBuf>,
    /// Seconds between pipeline ticks
    #[clap(env, long)]
    block_time: Option<u64>,
    #[clap(env, long)]
    swarm_gateway: Option<String>,
    #[clap(env, long)]
    ipfs_cat_request: Option<String>,
    #[clap(env, long, default_value = "0.0.0.0:9184")]
    metrics_address: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(pid) = args.infura_project_id {
        config.infura_project_id = pid;
    }
    if let Some(repository) = args.repository {
        config.repository = repository;
    }
    if let Some(block_time) = args.block_time {
        config.block_time_seconds = block_time;
    }
    if let Some(gateway) = args.swarm_gateway {
        config.swarm_gateway = gateway;
    }
    if let Some(cat) = args.ipfs_cat_request {
        config.ipfs_cat_request = cat;
    }

    let custom_chain = match (&args.chain, &args.chain_url) {
        (Some(name), Some(url)) => Some(ChainEndpoint {
            name: name.clone(),
            url: url.clone(),
        }),
        (Some(name), None) => Some(ChainEndpoint {
            name: name.clone(),
            url: config.infura_url(name),
        }),
        (None, Some(_)) => anyhow::bail!("--chain-url requires --chain"),
        (None, None) => None,
    };

    let registry = Registry::new();
    let metrics = Arc::new(MonitorMetrics::new(&registry));
    let metrics_handle = serve_metrics(args.metrics_address, registry).await?;

    let monitor = Monitor::start(config, custom_chain, metrics).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, stopping monitor");
    monitor.stop();
    monitor.join().await;
    metrics_handle.abort();
    Ok(())
}
