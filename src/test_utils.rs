// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared test doubles and fixture builders.

use crate::chain_client::BlockSource;
use crate::error::{MonitorError, MonitorResult};
use crate::storage::{HttpFetcher, IpfsProvider};
use crate::types::SourceDescriptor;
use ciborium::value::Value;
use ethers::types::{Address, Block, Bytes, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing_for_test() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Chain double serving canned heads, blocks and code.
pub struct MockChain {
    head: Mutex<u64>,
    fail_head: AtomicBool,
    blocks: Mutex<HashMap<u64, Block<Transaction>>>,
    code: Mutex<HashMap<Address, Bytes>>,
}

impl MockChain {
    pub fn new(head: u64) -> Arc<Self> {
        Arc::new(Self {
            head: Mutex::new(head),
            fail_head: AtomicBool::new(false),
            blocks: Mutex::new(HashMap::new()),
            code: Mutex::new(HashMap::new()),
        })
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }

    pub fn set_head_failure(&self, fail: bool) {
        self.fail_head.store(fail, Ordering::Release);
    }

    pub fn add_block(&self, number: u64, transactions: Vec<Transaction>) {
        let block = Block {
            number: Some(number.into()),
            transactions,
            ..Default::default()
        };
        self.blocks.lock().unwrap().insert(number, block);
    }

    pub fn set_code(&self, address: Address, code: Vec<u8>) {
        self.code.lock().unwrap().insert(address, code.into());
    }
}

#[async_trait::async_trait]
impl BlockSource for MockChain {
    async fn block_number(&self) -> MonitorResult<u64> {
        if self.fail_head.load(Ordering::Acquire) {
            return Err(MonitorError::Rpc("mock: head unavailable".to_string()));
        }
        Ok(*self.head.lock().unwrap())
    }

    async fn block_with_txs(&self, number: u64) -> MonitorResult<Option<Block<Transaction>>> {
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }

    async fn code_at(&self, address: Address) -> MonitorResult<Bytes> {
        Ok(self
            .code
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }
}

/// HTTP double: canned bodies per URL, every request recorded.
pub struct MockHttpFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl MockHttpFetcher {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn add_response(&self, url: &str, body: Vec<u8>) {
        self.responses.lock().unwrap().insert(url.to_string(), body);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl HttpFetcher for MockHttpFetcher {
    async fn get_bytes(&self, url: &str) -> MonitorResult<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        match self.responses.lock().unwrap().get(url) {
            Some(body) => Ok(body.clone()),
            None => Err(MonitorError::GatewayStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// In-process IPFS double, recording every cat.
pub struct MockIpfsProvider {
    files: Mutex<HashMap<String, Vec<u8>>>,
    cats: Mutex<Vec<String>>,
}

impl MockIpfsProvider {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            cats: Mutex::new(Vec::new()),
        }
    }

    pub fn add_file(&self, cid: &str, body: Vec<u8>) {
        self.files.lock().unwrap().insert(cid.to_string(), body);
    }

    pub fn cats(&self) -> Vec<String> {
        self.cats.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IpfsProvider for MockIpfsProvider {
    async fn cat(&self, cid: &str) -> MonitorResult<Vec<u8>> {
        self.cats.lock().unwrap().push(cid.to_string());
        self.files
            .lock()
            .unwrap()
            .get(cid)
            .cloned()
            .ok_or_else(|| MonitorError::Gateway(format!("mock: {} not pinned", cid)))
    }
}

/// A contract-creation transaction from `from` with the given nonce.
pub fn creation_tx(from: Address, nonce: u64) -> Transaction {
    Transaction {
        from,
        nonce: nonce.into(),
        to: None,
        ..Default::default()
    }
}

/// Encode a CBOR auxdata footer: the map followed by its two-byte
/// big-endian length.
pub fn encode_footer(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let map = Value::Map(
        entries
            .iter()
            .map(|(key, bytes)| {
                (
                    Value::Text((*key).to_string()),
                    Value::Bytes(bytes.clone()),
                )
            })
            .collect(),
    );
    let mut out = Vec::new();
    ciborium::ser::into_writer(&map, &mut out).unwrap();
    let len = out.len() as u16;
    out.extend_from_slice(&len.to_be_bytes());
    out
}

/// A few bytes of runtime code with the footer appended.
pub fn bytecode_with_footer(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut code = vec![0x60, 0x80, 0x60, 0x40, 0x52];
    code.extend_from_slice(&encode_footer(entries));
    code
}

/// Minimal metadata document with the given sources map.
pub fn metadata_json(sources: &[(&str, SourceDescriptor)]) -> Vec<u8> {
    let sources: serde_json::Map<String, serde_json::Value> = sources
        .iter()
        .map(|(key, descriptor)| {
            (
                (*key).to_string(),
                serde_json::to_value(descriptor).unwrap(),
            )
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "compiler": { "version": "0.5.11+commit.c082d0b4" },
        "language": "Solidity",
        "sources": sources,
    }))
    .unwrap()
}
