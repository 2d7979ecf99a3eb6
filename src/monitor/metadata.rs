// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Metadata fetching and promotion into the source queue.

use super::{ChainContext, MAX_CONCURRENT_FETCHES, METADATA_MAX_AGE};
use crate::error::{MonitorError, MonitorResult};
use crate::metrics::MonitorMetrics;
use crate::repository::Repository;
use crate::storage::StorageClient;
use crate::types::{MetadataDocument, MetadataPointer, SourceJob};
use ethers::types::Address;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

/// One metadata tick: evict stale entries, then fetch the metadata
/// document for every surviving address and promote it to the source
/// queue. Failed entries stay queued and are retried next tick.
pub async fn run_metadata_tick(
    ctx: &ChainContext,
    storage: &StorageClient,
    repository: &Repository,
    metrics: &MonitorMetrics,
) {
    let evicted = ctx.metadata_queue.evict_older_than(METADATA_MAX_AGE).await;
    if evicted > 0 {
        info!(
            "[METADATA] [{}] dropped {} entries past the retention window",
            ctx.name, evicted
        );
        metrics
            .stale_entries_evicted
            .with_label_values(&[&ctx.name, "metadata"])
            .inc_by(evicted as u64);
    }

    let entries = ctx.metadata_queue.snapshot().await;
    stream::iter(entries)
        .for_each_concurrent(MAX_CONCURRENT_FETCHES, |(address, pointer)| async move {
            match fetch_and_promote(ctx, storage, repository, address, &pointer).await {
                Ok(()) => {
                    metrics
                        .metadata_documents_stored
                        .with_label_values(&[&ctx.name])
                        .inc();
                }
                Err(e) => {
                    debug!(
                        "[METADATA] [{}] {} for {:?} not retrieved, will retry: {}",
                        ctx.name, pointer, address, e
                    );
                    metrics
                        .fetch_errors
                        .with_label_values(&[&ctx.name, e.error_type()])
                        .inc();
                }
            }
        })
        .await;

    metrics
        .metadata_queue_size
        .with_label_values(&[&ctx.name])
        .set(ctx.metadata_queue.len().await as i64);
    metrics
        .source_queue_size
        .with_label_values(&[&ctx.name])
        .set(ctx.source_queue.len().await as i64);
}

async fn fetch_and_promote(
    ctx: &ChainContext,
    storage: &StorageClient,
    repository: &Repository,
    address: Address,
    pointer: &MetadataPointer,
) -> MonitorResult<()> {
    let bytes = match pointer {
        MetadataPointer::Bzzr1(hash) => {
            let hash_hex = hex::encode(hash);
            let bytes = storage.fetch_swarm_raw(&hash_hex).await?;
            repository
                .write(Repository::swarm_path(&hash_hex), &bytes)
                .await?;
            bytes
        }
        MetadataPointer::Ipfs(cid) => {
            let bytes = storage.fetch_ipfs(cid).await?;
            repository.write(Repository::ipfs_path(cid), &bytes).await?;
            bytes
        }
    };

    // Persisted before parsing so a malformed document is kept on disk
    // for inspection
    repository
        .write(Repository::metadata_path(&ctx.name, &address), &bytes)
        .await?;

    let document: MetadataDocument = serde_json::from_slice(&bytes)
        .map_err(|e| MonitorError::MalformedMetadata(e.to_string()))?;

    // Promotion is delete-then-insert on this chain's own task, so the
    // address is never visible in both queues between ticks
    ctx.metadata_queue.remove(&address).await;

    if document.sources.is_empty() {
        warn!(
            "[METADATA] [{}] metadata for {:?} lists no sources",
            ctx.name, address
        );
        return Ok(());
    }

    let source_count = document.sources.len();
    ctx.source_queue
        .add(
            address,
            SourceJob {
                raw_metadata: bytes,
                pending: document.sources,
            },
        )
        .await;
    info!(
        "[METADATA] [{}] stored metadata for {:?}, {} sources pending",
        ctx.name, address, source_count
    );
    Ok(())
}
