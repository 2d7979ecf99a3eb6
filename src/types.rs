// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core data model shared across the pipeline stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Content-addressed pointer extracted from a deployed contract's CBOR
/// auxdata footer. Exactly one variant per contract; when the footer
/// carries both keys the Swarm hash wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataPointer {
    /// 32-byte Swarm `bzzr1` content hash
    Bzzr1([u8; 32]),
    /// IPFS CID (Base58-encoded multihash)
    Ipfs(String),
}

impl MetadataPointer {
    /// Storage origin label, used for logs and metrics
    pub fn origin(&self) -> &'static str {
        match self {
            MetadataPointer::Bzzr1(_) => "swarm",
            MetadataPointer::Ipfs(_) => "ipfs",
        }
    }
}

impl fmt::Display for MetadataPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataPointer::Bzzr1(hash) => write!(f, "bzzr1:{}", hex::encode(hash)),
            MetadataPointer::Ipfs(cid) => write!(f, "ipfs:{}", cid),
        }
    }
}

/// One entry of the metadata manifest's `sources` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Expected keccak-256 digest of the source content (hex, usually
    /// 0x-prefixed in the manifest)
    #[serde(default)]
    pub keccak256: String,
    /// Storage URLs to try, in manifest order
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Metadata document emitted by the compiler.
///
/// The schema is open; only `sources` is required here, everything else
/// is carried opaquely.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataDocument {
    pub sources: BTreeMap<String, SourceDescriptor>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Source-queue entry: the raw metadata document plus the sources still
/// waiting to be retrieved. The entry is removed once `pending` drains.
#[derive(Debug, Clone)]
pub struct SourceJob {
    pub raw_metadata: Vec<u8>,
    pub pending: BTreeMap<String, SourceDescriptor>,
}
