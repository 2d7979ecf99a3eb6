// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Monitor configuration

use crate::storage::{DEFAULT_IPFS_CAT_REQUEST, DEFAULT_SWARM_GATEWAY};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Chains monitored when no explicit chain set is configured
pub const DEFAULT_CHAINS: &[&str] = &["mainnet", "ropsten", "rinkeby", "kovan", "goerli"];

/// A chain to monitor: name plus JSON-RPC endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEndpoint {
    pub name: String,
    pub url: String,
}

/// Complete monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Explicit chain endpoints; empty means the default Infura set
    #[serde(default)]
    pub chains: Vec<ChainEndpoint>,
    #[serde(default)]
    pub infura_project_id: String,
    /// Repository root all artifacts are written under
    #[serde(default = "default_repository")]
    pub repository: PathBuf,
    /// Seconds between pipeline ticks
    #[serde(default = "default_block_time")]
    pub block_time_seconds: u64,
    #[serde(default = "default_swarm_gateway")]
    pub swarm_gateway: String,
    /// URL prefix the IPFS CID is appended to when no in-process
    /// provider is configured
    #[serde(default = "default_ipfs_cat_request")]
    pub ipfs_cat_request: String,
}

fn default_repository() -> PathBuf {
    PathBuf::from("repository")
}

fn default_block_time() -> u64 {
    15
}

fn default_swarm_gateway() -> String {
    DEFAULT_SWARM_GATEWAY.to_string()
}

fn default_ipfs_cat_request() -> String {
    DEFAULT_IPFS_CAT_REQUEST.to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            chains: Vec::new(),
            infura_project_id: String::new(),
            repository: default_repository(),
            block_time_seconds: default_block_time(),
            swarm_gateway: default_swarm_gateway(),
            ipfs_cat_request: default_ipfs_cat_request(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from YAML file with environment variable substitution
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read monitor config file: {:?}", path))?;

        let contents = substitute_env_vars(&contents);

        let config: MonitorConfig =
            serde_yaml::from_str(&contents).context("Failed to parse monitor config YAML")?;
        Ok(config)
    }

    pub fn block_time(&self) -> Duration {
        Duration::from_secs(self.block_time_seconds)
    }

    pub fn infura_url(&self, chain: &str) -> String {
        format!(
            "https://{}.infura.io/v3/{}",
            chain, self.infura_project_id
        )
    }

    /// Resolve the chain set: a supplied custom chain wins, then the
    /// configured endpoints, then the default Infura set.
    pub fn chain_endpoints(&self, custom_chain: Option<ChainEndpoint>) -> Vec<ChainEndpoint> {
        if let Some(custom) = custom_chain {
            return vec![custom];
        }
        if !self.chains.is_empty() {
            return self.chains.clone();
        }
        DEFAULT_CHAINS
            .iter()
            .map(|name| ChainEndpoint {
                name: (*name).to_string(),
                url: self.infura_url(name),
            })
            .collect()
    }
}

/// Replace `${VAR_NAME}` placeholders with values from the environment.
/// Unset variables leave their placeholder in place.
fn substitute_env_vars(content: &str) -> String {
    use regex::{Captures, Regex};

    let placeholder = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    placeholder
        .replace_all(content, |caps: &Captures<'_>| {
            let name = &caps[1];
            std::env::var(name).unwrap_or_else(|_| {
                tracing::warn!("environment variable {} not set, keeping placeholder", name);
                caps[0].to_string()
            })
        })
        .into_owned()
}
