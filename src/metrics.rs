// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry, Encoder,
    IntCounterVec, IntGaugeVec, Registry, TextEncoder,
};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct MonitorMetrics {
    pub(crate) chain_head: IntGaugeVec,
    pub(crate) block_cursor: IntGaugeVec,
    pub(crate) metadata_queue_size: IntGaugeVec,
    pub(crate) source_queue_size: IntGaugeVec,

    pub(crate) contract_creations_seen: IntCounterVec,
    pub(crate) metadata_pointers_decoded: IntCounterVec,
    pub(crate) metadata_documents_stored: IntCounterVec,
    pub(crate) source_files_stored: IntCounterVec,
    pub(crate) stale_entries_evicted: IntCounterVec,
    pub(crate) fetch_errors: IntCounterVec,
}

impl MonitorMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            chain_head: register_int_gauge_vec_with_registry!(
                "monitor_chain_head",
                "Latest block number reported by the chain",
                &["chain"],
                registry,
            )
            .unwrap(),
            block_cursor: register_int_gauge_vec_with_registry!(
                "monitor_block_cursor",
                "Next block number the detector will ingest",
                &["chain"],
                registry,
            )
            .unwrap(),
            metadata_queue_size: register_int_gauge_vec_with_registry!(
                "monitor_metadata_queue_size",
                "Addresses waiting for a metadata fetch",
                &["chain"],
                registry,
            )
            .unwrap(),
            source_queue_size: register_int_gauge_vec_with_registry!(
                "monitor_source_queue_size",
                "Addresses with sources still pending",
                &["chain"],
                registry,
            )
            .unwrap(),
            contract_creations_seen: register_int_counter_vec_with_registry!(
                "monitor_contract_creations_seen",
                "Contract-creation transactions observed",
                &["chain"],
                registry,
            )
            .unwrap(),
            metadata_pointers_decoded: register_int_counter_vec_with_registry!(
                "monitor_metadata_pointers_decoded",
                "Bytecode footers that yielded a metadata pointer",
                &["chain", "origin"],
                registry,
            )
            .unwrap(),
            metadata_documents_stored: register_int_counter_vec_with_registry!(
                "monitor_metadata_documents_stored",
                "Metadata documents fetched and persisted",
                &["chain"],
                registry,
            )
            .unwrap(),
            source_files_stored: register_int_counter_vec_with_registry!(
                "monitor_source_files_stored",
                "Source files fetched and persisted",
                &["chain"],
                registry,
            )
            .unwrap(),
            stale_entries_evicted: register_int_counter_vec_with_registry!(
                "monitor_stale_entries_evicted",
                "Queue entries dropped past their retention window",
                &["chain", "queue"],
                registry,
            )
            .unwrap(),
            fetch_errors: register_int_counter_vec_with_registry!(
                "monitor_fetch_errors",
                "Recoverable errors by stage and type",
                &["chain", "error_type"],
                registry,
            )
            .unwrap(),
        }
    }

    #[cfg(test)]
    pub fn new_for_test() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::new(&Registry::new()))
    }
}

/// Serve the registry on `GET /metrics`.
pub async fn serve_metrics(address: SocketAddr, registry: Registry) -> anyhow::Result<JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(registry);
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("metrics server listening on {}", address);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("metrics server error: {:?}", e);
        }
    }))
}

async fn render_metrics(State(registry): State<Registry>) -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("failed to encode metrics: {:?}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_once() {
        let registry = Registry::new();
        let metrics = MonitorMetrics::new(&registry);
        metrics.chain_head.with_label_values(&["mainnet"]).set(42);
        metrics
            .fetch_errors
            .with_label_values(&["mainnet", "gateway"])
            .inc();

        let families = registry.gather();
        assert!(families.iter().any(|f| f.get_name() == "monitor_chain_head"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "monitor_fetch_errors"));
    }
}
