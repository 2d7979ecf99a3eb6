// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decentralized storage gateways.
//!
//! Metadata documents and sources live on Swarm or IPFS. Swarm content is
//! always fetched over an HTTP gateway; IPFS content goes through an
//! in-process provider when one is configured and falls back to an HTTP
//! cat endpoint otherwise.

use crate::error::{MonitorError, MonitorResult};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SWARM_GATEWAY: &str = "https://swarm-gateways.net/";
pub const DEFAULT_IPFS_CAT_REQUEST: &str = "https://ipfs.infura.io:5001/api/v0/cat?arg=";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw HTTP GET seam, mocked in tests.
#[async_trait::async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get_bytes(&self, url: &str) -> MonitorResult<Vec<u8>>;
}

/// In-process IPFS provider (e.g. an embedded node). When absent, IPFS
/// reads go through the configured HTTP cat endpoint.
#[async_trait::async_trait]
pub trait IpfsProvider: Send + Sync {
    async fn cat(&self, cid: &str) -> MonitorResult<Vec<u8>>;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> MonitorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| MonitorError::Gateway(format!("failed to build http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get_bytes(&self, url: &str) -> MonitorResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MonitorError::Gateway(format!("{}: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::GatewayStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| MonitorError::Gateway(format!("{}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

/// Gateway dispatch for the pipeline's three fetch shapes.
pub struct StorageClient {
    fetcher: Arc<dyn HttpFetcher>,
    swarm_gateway: String,
    ipfs_cat_request: String,
    ipfs_provider: Option<Arc<dyn IpfsProvider>>,
}

impl StorageClient {
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        swarm_gateway: String,
        ipfs_cat_request: String,
        ipfs_provider: Option<Arc<dyn IpfsProvider>>,
    ) -> Self {
        Self {
            fetcher,
            swarm_gateway,
            ipfs_cat_request,
            ipfs_provider,
        }
    }

    /// `GET <swarm-gateway>bzz-raw:/<hex-hash>`
    pub async fn fetch_swarm_raw(&self, hash_hex: &str) -> MonitorResult<Vec<u8>> {
        let url = format!("{}bzz-raw:/{}", self.swarm_gateway, hash_hex);
        self.fetcher.get_bytes(&url).await
    }

    pub async fn fetch_ipfs(&self, cid: &str) -> MonitorResult<Vec<u8>> {
        if let Some(provider) = &self.ipfs_provider {
            return provider.cat(cid).await;
        }
        let url = format!("{}{}", self.ipfs_cat_request, cid);
        self.fetcher.get_bytes(&url).await
    }

    /// Fetch a source by the URL as it appears in the metadata manifest.
    pub async fn fetch_source_url(&self, url: &str) -> MonitorResult<Vec<u8>> {
        if url.starts_with("bzz-raw") {
            let full = format!("{}{}", self.swarm_gateway, url);
            self.fetcher.get_bytes(&full).await
        } else if let Some(cid) = url.strip_prefix("dweb:/ipfs/") {
            self.fetch_ipfs(cid).await
        } else {
            Err(MonitorError::UnsupportedUrl(url.to_string()))
        }
    }
}
