//! Client error types.

use alloy_primitives::B256;
use chaintrace_core::DecodeError;
use chaintrace_evm::ContractMapError;
use chaintrace_rpc::TransportError;
use chaintrace_trace::TraceError;
use std::path::PathBuf;
use thiserror::Error;

/// Nonce fetch or resync failure. Nonce state is left untouched.
#[derive(Debug, Error)]
pub enum NonceError {
    #[error("nonce fetch failed: {0}")]
    Transport(#[from] TransportError),

    #[error("nonce sync timed out after {ms}ms")]
    Timeout { ms: u64 },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("nonce error: {0}")]
    Nonce(#[from] NonceError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("no receipt for {tx_hash} after {ms}ms")]
    ReceiptTimeout { tx_hash: B256, ms: u64 },

    #[error("transaction {tx_hash} not found")]
    TransactionNotFound { tx_hash: B256 },

    #[error("no artifact named '{name}' is registered")]
    UnknownArtifact { name: String },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("I/O error at {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error(transparent)]
    ContractMap(#[from] ContractMapError),
}

impl ClientError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
