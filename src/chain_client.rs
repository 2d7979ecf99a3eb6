// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! JSON-RPC access to a chain, behind a seam the ticks can mock.

use crate::error::{MonitorError, MonitorResult};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Block, BlockNumber, Bytes, Transaction};

/// Chain reads needed by the pipeline: head number, block with full
/// transactions, and deployed code.
#[async_trait::async_trait]
pub trait BlockSource: Send + Sync {
    async fn block_number(&self) -> MonitorResult<u64>;

    async fn block_with_txs(&self, number: u64) -> MonitorResult<Option<Block<Transaction>>>;

    async fn code_at(&self, address: Address) -> MonitorResult<Bytes>;
}

/// Production client over an HTTP JSON-RPC endpoint.
#[derive(Debug)]
pub struct ChainClient {
    chain_name: String,
    inner: Provider<Http>,
}

impl ChainClient {
    pub fn new(chain_name: &str, url: &str) -> MonitorResult<Self> {
        let inner = Provider::<Http>::try_from(url)
            .map_err(|e| MonitorError::Rpc(format!("invalid endpoint {}: {}", url, e)))?;
        Ok(Self {
            chain_name: chain_name.to_string(),
            inner,
        })
    }

    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }
}

#[async_trait::async_trait]
impl BlockSource for ChainClient {
    async fn block_number(&self) -> MonitorResult<u64> {
        let number = self.inner.get_block_number().await.map_err(|e| {
            MonitorError::Rpc(format!("{}: eth_blockNumber: {}", self.chain_name, e))
        })?;
        Ok(number.as_u64())
    }

    async fn block_with_txs(&self, number: u64) -> MonitorResult<Option<Block<Transaction>>> {
        self.inner
            .get_block_with_txs(BlockNumber::Number(number.into()))
            .await
            .map_err(|e| {
                MonitorError::Rpc(format!(
                    "{}: eth_getBlockByNumber({}): {}",
                    self.chain_name, number, e
                ))
            })
    }

    async fn code_at(&self, address: Address) -> MonitorResult<Bytes> {
        self.inner.get_code(address, None).await.map_err(|e| {
            MonitorError::Rpc(format!(
                "{}: eth_getCode({:?}): {}",
                self.chain_name, address, e
            ))
        })
    }
}
