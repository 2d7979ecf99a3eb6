// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Monitor lifecycle and per-chain pipeline state.
//!
//! The monitor owns one [`ChainContext`] per configured chain and drives
//! each with a single long-lived task ticking at the block-time interval.
//! Every tick runs the three stages in order — block detection, metadata
//! fetching, source fetching — so a chain's cursor and queues have
//! exactly one mutator and no cross-stage locking is needed. Chains are
//! independent of each other.

pub mod blocks;
pub mod metadata;
pub mod sources;

use crate::chain_client::{BlockSource, ChainClient};
use crate::config::{ChainEndpoint, MonitorConfig};
use crate::metrics::MonitorMetrics;
use crate::queue::PendingQueue;
use crate::repository::Repository;
use crate::storage::{IpfsProvider, ReqwestFetcher, StorageClient};
use crate::types::{MetadataPointer, SourceJob};
use anyhow::Context;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Catch-up cap: at most this many blocks are ingested per chain per tick
pub const MAX_BLOCKS_PER_TICK: u64 = 4;

/// Concurrent fetches per stage per chain
pub const MAX_CONCURRENT_FETCHES: usize = 16;

/// Retention window for metadata-queue entries
pub const METADATA_MAX_AGE: Duration = Duration::from_secs(3600);

/// Retention window for source-queue entries (5 days)
pub const SOURCE_MAX_AGE: Duration = Duration::from_secs(432_000);

/// Per-chain pipeline state: the client bound to the chain's endpoint,
/// the two pending queues, and the latest-block cursor.
pub struct ChainContext {
    pub name: String,
    pub client: Arc<dyn BlockSource>,
    pub metadata_queue: PendingQueue<MetadataPointer>,
    pub source_queue: PendingQueue<SourceJob>,
    latest_block: AtomicU64,
}

impl ChainContext {
    pub fn new(name: impl Into<String>, client: Arc<dyn BlockSource>, head: u64) -> Self {
        let name = name.into();
        Self {
            metadata_queue: PendingQueue::new(&name, "metadata"),
            source_queue: PendingQueue::new(&name, "source"),
            name,
            client,
            latest_block: AtomicU64::new(head),
        }
    }

    /// Next block number the detector will ingest
    pub fn cursor(&self) -> u64 {
        self.latest_block.load(Ordering::Acquire)
    }

    /// The cursor never regresses, even if a stale head slips through
    pub(crate) fn advance_cursor(&self, to: u64) {
        self.latest_block.fetch_max(to, Ordering::AcqRel);
    }
}

/// Running monitor instance. Dropping it does not stop the tasks; call
/// [`Monitor::stop`].
pub struct Monitor {
    chains: Vec<Arc<ChainContext>>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Monitor {
    /// Start monitoring the default chain set, or only `custom_chain`
    /// when one is supplied.
    pub async fn start(
        config: MonitorConfig,
        custom_chain: Option<ChainEndpoint>,
        metrics: Arc<MonitorMetrics>,
    ) -> anyhow::Result<Self> {
        Self::start_with_options(config, custom_chain, None, metrics).await
    }

    /// Start with an in-process IPFS provider instead of the HTTP cat
    /// endpoint.
    pub async fn start_with_options(
        config: MonitorConfig,
        custom_chain: Option<ChainEndpoint>,
        ipfs_provider: Option<Arc<dyn IpfsProvider>>,
        metrics: Arc<MonitorMetrics>,
    ) -> anyhow::Result<Self> {
        let endpoints = config.chain_endpoints(custom_chain);
        anyhow::ensure!(!endpoints.is_empty(), "no chains configured");

        let fetcher = Arc::new(ReqwestFetcher::new()?);
        let storage = Arc::new(StorageClient::new(
            fetcher,
            config.swarm_gateway.clone(),
            config.ipfs_cat_request.clone(),
            ipfs_provider,
        ));
        let repository = Arc::new(Repository::new(&config.repository));
        let cancel = CancellationToken::new();

        let mut chains = Vec::new();
        let mut handles = Vec::new();
        for endpoint in endpoints {
            let client = Arc::new(ChainClient::new(&endpoint.name, &endpoint.url)?);
            let head = client
                .block_number()
                .await
                .with_context(|| format!("failed to read chain head for {}", endpoint.name))?;
            info!("[{}] monitoring from block {}", endpoint.name, head);

            let ctx = Arc::new(ChainContext::new(endpoint.name, client, head));
            chains.push(ctx.clone());
            handles.push(tokio::spawn(run_chain_task(
                ctx,
                storage.clone(),
                repository.clone(),
                metrics.clone(),
                config.block_time(),
                cancel.clone(),
            )));
        }

        Ok(Self {
            chains,
            cancel,
            handles,
        })
    }

    /// Cancel future ticks. In-flight fetches finish against their
    /// transport timeouts. Calling this twice is a no-op.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn chains(&self) -> &[Arc<ChainContext>] {
        &self.chains
    }

    /// Wait for all chain tasks to exit (after [`Monitor::stop`]).
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn run_chain_task(
    ctx: Arc<ChainContext>,
    storage: Arc<StorageClient>,
    repository: Arc<Repository>,
    metrics: Arc<MonitorMetrics>,
    block_time: Duration,
    cancel: CancellationToken,
) {
    info!(
        "[{}] starting pipeline task (block_time={:?})",
        ctx.name, block_time
    );

    let mut interval = time::interval(block_time);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("[{}] pipeline task cancelled", ctx.name);
                break;
            }
            _ = interval.tick() => {
                blocks::run_block_tick(&ctx, &metrics).await;
                metadata::run_metadata_tick(&ctx, &storage, &repository, &metrics).await;
                sources::run_source_tick(&ctx, &storage, &repository, &metrics).await;
            }
        }
    }
}
