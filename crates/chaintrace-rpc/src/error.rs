//! Transport-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;
use crate::retry::Retryable;

/// JSON-RPC code for "method not found".
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, reset, non-2xx status, ...
    #[error("HTTP error: {0}")]
    Http(String),

    /// Error object returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// `true` when the node does not expose the requested method.
    ///
    /// Nodes disagree on how they report this; some use the standard code,
    /// others a -32000 with a descriptive message.
    pub fn is_method_not_found(&self) -> bool {
        match self {
            Self::Rpc(e) => {
                let msg = e.message.to_ascii_lowercase();
                e.code == METHOD_NOT_FOUND
                    || msg.contains("method not found")
                    || msg.contains("does not exist/is not available")
                    || msg.contains("not supported")
            }
            _ => false,
        }
    }
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            // -32005: limit exceeded, returned by rate-limiting gateways
            Self::Rpc(e) => e.code == -32005,
            Self::Deserialization(_) | Self::Other(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc(code: i64, message: &str) -> TransportError {
        TransportError::Rpc(JsonRpcError {
            code,
            message: message.into(),
            data: None,
        })
    }

    #[test]
    fn method_not_found_variants() {
        assert!(rpc(-32601, "Method not found").is_method_not_found());
        assert!(rpc(-32000, "the method debug_traceTransaction does not exist/is not available")
            .is_method_not_found());
        assert!(!rpc(-32000, "execution reverted").is_method_not_found());
        assert!(!TransportError::Http("boom".into()).is_method_not_found());
    }

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Http("reset".into()).is_retryable());
        assert!(TransportError::Timeout { ms: 10 }.is_retryable());
        assert!(rpc(-32005, "limit exceeded").is_retryable());
        assert!(!rpc(-32000, "nonce too low").is_retryable());
    }
}
