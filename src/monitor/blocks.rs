// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Block tailing and contract-creation detection.

use super::{ChainContext, MAX_BLOCKS_PER_TICK, MAX_CONCURRENT_FETCHES};
use crate::footer;
use crate::metrics::MonitorMetrics;
use ethers::types::Address;
use ethers::utils::get_contract_address;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

/// One block tick: advance the cursor by at most [`MAX_BLOCKS_PER_TICK`]
/// toward the chain head and queue a metadata fetch for every newly
/// deployed contract whose bytecode carries a recognizable footer.
pub async fn run_block_tick(ctx: &ChainContext, metrics: &MonitorMetrics) {
    let head = match ctx.client.block_number().await {
        Ok(head) => head,
        Err(e) => {
            warn!(
                "[BLOCKS] [{}] failed to read chain head, skipping tick: {}",
                ctx.name, e
            );
            metrics
                .fetch_errors
                .with_label_values(&[&ctx.name, e.error_type()])
                .inc();
            return;
        }
    };
    metrics
        .chain_head
        .with_label_values(&[&ctx.name])
        .set(head as i64);

    let cursor = ctx.cursor();
    let target = head.min(cursor.saturating_add(MAX_BLOCKS_PER_TICK));
    if target <= cursor {
        debug!("[BLOCKS] [{}] at head {}", ctx.name, head);
        return;
    }

    let mut creations: Vec<Address> = Vec::new();
    for number in cursor..target {
        match ctx.client.block_with_txs(number).await {
            Ok(Some(block)) => {
                for tx in &block.transactions {
                    if tx.to.is_none() {
                        let address = get_contract_address(tx.from, tx.nonce);
                        debug!(
                            "[BLOCKS] [{}] contract creation in block {}: {:?}",
                            ctx.name, number, address
                        );
                        creations.push(address);
                    }
                }
            }
            Ok(None) => {
                debug!(
                    "[BLOCKS] [{}] block {} not available, skipping",
                    ctx.name, number
                );
            }
            Err(e) => {
                warn!(
                    "[BLOCKS] [{}] failed to fetch block {}, skipping: {}",
                    ctx.name, number, e
                );
                metrics
                    .fetch_errors
                    .with_label_values(&[&ctx.name, e.error_type()])
                    .inc();
            }
        }
    }

    // Block data is authoritative once the head read succeeded; the
    // cursor advances even past blocks that failed to fetch
    ctx.advance_cursor(target);
    metrics
        .block_cursor
        .with_label_values(&[&ctx.name])
        .set(target as i64);

    if creations.is_empty() {
        return;
    }
    metrics
        .contract_creations_seen
        .with_label_values(&[&ctx.name])
        .inc_by(creations.len() as u64);

    stream::iter(creations)
        .for_each_concurrent(MAX_CONCURRENT_FETCHES, |address| async move {
            extract_footer(ctx, metrics, address).await;
        })
        .await;
}

async fn extract_footer(ctx: &ChainContext, metrics: &MonitorMetrics, address: Address) {
    // An address still being drained by the source stage must not re-enter
    // the pipeline
    if ctx.source_queue.contains(&address).await {
        debug!(
            "[BLOCKS] [{}] {:?} already has sources pending, skipping",
            ctx.name, address
        );
        return;
    }

    let code = match ctx.client.code_at(address).await {
        Ok(code) => code,
        Err(e) => {
            warn!(
                "[BLOCKS] [{}] failed to fetch code at {:?}: {}",
                ctx.name, address, e
            );
            metrics
                .fetch_errors
                .with_label_values(&[&ctx.name, e.error_type()])
                .inc();
            return;
        }
    };

    match footer::decode_footer(&code) {
        Some(pointer) => {
            let origin = pointer.origin();
            if ctx.metadata_queue.add(address, pointer.clone()).await {
                info!(
                    "[BLOCKS] [{}] queued metadata fetch for {:?} ({})",
                    ctx.name, address, pointer
                );
                metrics
                    .metadata_pointers_decoded
                    .with_label_values(&[&ctx.name, origin])
                    .inc();
            }
        }
        None => {
            debug!(
                "[BLOCKS] [{}] no metadata footer in code at {:?}",
                ctx.name, address
            );
        }
    }
}
