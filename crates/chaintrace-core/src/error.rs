//! Error types for the decode pipeline.
//!
//! Most decode failures never reach the caller: an unknown ABI or an
//! undecodable revert degrades the affected frame to raw bytes. These errors
//! are what the lower-level helpers return before that degradation happens.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("ABI decode failed: {reason}")]
    AbiDecodeFailed { reason: String },

    #[error("Invalid data: {reason}")]
    InvalidData { reason: String },

    #[error("Invalid ABI: {reason}")]
    InvalidAbi { reason: String },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
