// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Content-addressed filesystem repository.
//!
//! Layout, relative to the configured root:
//!
//! ```text
//! swarm/bzzr1/<hex-hash>                         raw metadata bytes
//! ipfs/<cid>                                     raw metadata bytes
//! contract/<chain>/<address>/metadata.json       raw metadata bytes
//! contract/<chain>/<address>/sources/<key>       fetched source file
//! keccak256/<hex-digest>                         content-addressed cache (read-only side input)
//! ```
//!
//! Parent directories are created on demand; writes go through a
//! temporary file and a rename so a concurrent reader never observes a
//! partial artifact.

use crate::error::{MonitorError, MonitorResult};
use ethers::types::Address;
use sha3::{Digest, Keccak256};
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct Repository {
    root: PathBuf,
}

impl Repository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` at `relative` under the repository root, overwriting
    /// any existing file.
    pub async fn write(&self, relative: impl AsRef<Path>, bytes: &[u8]) -> MonitorResult<PathBuf> {
        let path = self.root.join(relative);
        let parent = path
            .parent()
            .ok_or_else(|| MonitorError::Io(std::io::Error::other("path has no parent")))?;
        fs::create_dir_all(parent).await?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MonitorError::Io(std::io::Error::other("path has no file name")))?;
        let tmp = parent.join(format!(".{}.tmp", file_name));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    pub fn swarm_path(hash_hex: &str) -> PathBuf {
        PathBuf::from("swarm").join("bzzr1").join(hash_hex)
    }

    pub fn ipfs_path(cid: &str) -> PathBuf {
        PathBuf::from("ipfs").join(cid)
    }

    pub fn metadata_path(chain: &str, address: &Address) -> PathBuf {
        PathBuf::from("contract")
            .join(chain)
            .join(format!("{:?}", address))
            .join("metadata.json")
    }

    pub fn source_path(chain: &str, address: &Address, sanitized_key: &str) -> PathBuf {
        PathBuf::from("contract")
            .join(chain)
            .join(format!("{:?}", address))
            .join("sources")
            // A leading separator is structural in the key but must not
            // escape the sources directory
            .join(sanitized_key.trim_start_matches('/'))
    }

    /// Look up cached source content by its keccak-256 digest.
    pub async fn read_keccak(&self, digest: &str) -> Option<Vec<u8>> {
        let normalized = normalize_digest(digest);
        if normalized.is_empty() {
            return None;
        }
        let path = self.root.join("keccak256").join(normalized);
        fs::read(path).await.ok()
    }
}

/// Lowercased hex digest without the `0x` prefix.
pub fn normalize_digest(digest: &str) -> String {
    digest.trim_start_matches("0x").to_ascii_lowercase()
}

pub fn keccak256_hex(bytes: &[u8]) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Sanitize a manifest source key for use as a repository path.
///
/// Every character outside `[A-Za-z0-9_./-]` becomes `_`, and inside any
/// `/`-separated segment consisting solely of dots every dot becomes `_`,
/// so traversal segments like `..` turn into `__`. Separators are kept.
pub fn sanitize_source_key(key: &str) -> String {
    key.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c == '.') {
                "_".repeat(segment.len())
            } else {
                segment
                    .chars()
                    .map(|c| {
                        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                            c
                        } else {
                            '_'
                        }
                    })
                    .collect()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
