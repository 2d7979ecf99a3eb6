// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-source fetching with a multi-provider race and content
//! verification.

use super::{ChainContext, MAX_CONCURRENT_FETCHES, SOURCE_MAX_AGE};
use crate::error::{MonitorError, MonitorResult};
use crate::metrics::MonitorMetrics;
use crate::repository::{keccak256_hex, normalize_digest, sanitize_source_key, Repository};
use crate::storage::StorageClient;
use crate::types::SourceDescriptor;
use ethers::types::Address;
use futures::future::select_ok;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{debug, info};

/// One source tick: evict stale entries, then try to retrieve every
/// pending source across all surviving entries. The fetch cap spans the
/// whole chain, not a single address. Retrieved keys are drained from
/// their entry; a fully drained entry leaves the queue.
pub async fn run_source_tick(
    ctx: &ChainContext,
    storage: &StorageClient,
    repository: &Repository,
    metrics: &MonitorMetrics,
) {
    let evicted = ctx.source_queue.evict_older_than(SOURCE_MAX_AGE).await;
    if evicted > 0 {
        info!(
            "[SOURCE] [{}] dropped {} entries past the retention window",
            ctx.name, evicted
        );
        metrics
            .stale_entries_evicted
            .with_label_values(&[&ctx.name, "source"])
            .inc_by(evicted as u64);
    }

    let pending: Vec<(Address, String, SourceDescriptor)> = ctx
        .source_queue
        .snapshot()
        .await
        .into_iter()
        .flat_map(|(address, job)| {
            job.pending
                .into_iter()
                .map(move |(key, descriptor)| (address, key, descriptor))
        })
        .collect();

    let fetched: Vec<(Address, String)> = stream::iter(pending)
        .map(|(address, key, descriptor)| async move {
            match fetch_source(ctx, storage, repository, &address, &key, &descriptor).await {
                Ok(()) => {
                    metrics
                        .source_files_stored
                        .with_label_values(&[&ctx.name])
                        .inc();
                    Some((address, key))
                }
                Err(e) => {
                    debug!(
                        "[SOURCE] [{}] {} for {:?} not retrieved, will retry: {}",
                        ctx.name, key, address, e
                    );
                    metrics
                        .fetch_errors
                        .with_label_values(&[&ctx.name, e.error_type()])
                        .inc();
                    None
                }
            }
        })
        .buffer_unordered(MAX_CONCURRENT_FETCHES)
        .filter_map(|hit| async move { hit })
        .collect()
        .await;

    let mut fetched_by_address: HashMap<Address, Vec<String>> = HashMap::new();
    for (address, key) in fetched {
        fetched_by_address.entry(address).or_default().push(key);
    }

    for (address, keys) in fetched_by_address {
        let drained = ctx
            .source_queue
            .mutate(&address, |job| {
                for key in &keys {
                    job.pending.remove(key);
                }
                job.pending.is_empty()
            })
            .await;
        if drained == Some(true) {
            ctx.source_queue.remove(&address).await;
            info!(
                "[SOURCE] [{}] all sources retrieved for {:?}",
                ctx.name, address
            );
        }
    }

    metrics
        .source_queue_size
        .with_label_values(&[&ctx.name])
        .set(ctx.source_queue.len().await as i64);
}

async fn fetch_source(
    ctx: &ChainContext,
    storage: &StorageClient,
    repository: &Repository,
    address: &Address,
    key: &str,
    descriptor: &SourceDescriptor,
) -> MonitorResult<()> {
    let content = match repository.read_keccak(&descriptor.keccak256).await {
        Some(cached) => {
            debug!(
                "[SOURCE] [{}] {} for {:?} found in keccak cache",
                ctx.name, key, address
            );
            cached
        }
        None => {
            let attempts: Vec<_> = descriptor
                .urls
                .iter()
                .map(|url| Box::pin(storage.fetch_source_url(url)))
                .collect();
            if attempts.is_empty() {
                return Err(MonitorError::Gateway(format!(
                    "no storage urls for {}",
                    key
                )));
            }
            // First successful provider wins; the rest are dropped
            let (bytes, _) = select_ok(attempts).await?;
            verify_content(key, &descriptor.keccak256, &bytes)?;
            bytes
        }
    };

    let sanitized = sanitize_source_key(key);
    repository
        .write(
            Repository::source_path(&ctx.name, address, &sanitized),
            &content,
        )
        .await?;
    info!(
        "[SOURCE] [{}] stored {} for {:?}",
        ctx.name, sanitized, address
    );
    Ok(())
}

fn verify_content(key: &str, expected: &str, bytes: &[u8]) -> MonitorResult<()> {
    if expected.is_empty() {
        return Ok(());
    }
    let expected = normalize_digest(expected);
    let actual = keccak256_hex(bytes);
    if actual != expected {
        return Err(MonitorError::ChecksumMismatch {
            key: key.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}
