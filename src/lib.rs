// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Discovery and ingestion pipeline for smart-contract source
//! verification material.
//!
//! For every new block on the configured chains the monitor detects
//! contract-creation transactions, decodes the CBOR auxdata footer of
//! the deployed bytecode, and harvests the referenced metadata document
//! and compilation sources from decentralized storage into a
//! content-addressed filesystem repository.

pub mod chain_client;
pub mod config;
pub mod error;
pub mod footer;
pub mod metrics;
pub mod monitor;
pub mod queue;
pub mod repository;
pub mod storage;
pub mod types;

#[cfg(test)]
pub mod test_utils;
