// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

/// Error type for monitor operations.
///
/// Every variant is recovered locally: transport and RPC failures leave
/// queue entries in place for the next tick, decode and parse failures
/// drop or requeue the affected item, and filesystem failures are logged
/// by the calling stage. Nothing propagates out of the tick loop.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("gateway returned {status} for {url}")]
    GatewayStatus { url: String, status: u16 },

    #[error("unsupported storage url: {0}")]
    UnsupportedUrl(String),

    #[error("malformed metadata document: {0}")]
    MalformedMetadata(String),

    #[error("content digest mismatch for {key}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            MonitorError::Rpc(_) => "rpc",
            MonitorError::Gateway(_) => "gateway",
            MonitorError::GatewayStatus { .. } => "gateway_status",
            MonitorError::UnsupportedUrl(_) => "unsupported_url",
            MonitorError::MalformedMetadata(_) => "malformed_metadata",
            MonitorError::ChecksumMismatch { .. } => "checksum_mismatch",
            MonitorError::Io(_) => "io",
        }
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
