//! Trace-fetch error types.

use alloy_primitives::B256;
use chaintrace_rpc::{Retryable, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The overall trace deadline expired, retries included.
    #[error("trace timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The node returned no trace (null or an empty list) for the transaction.
    #[error("node returned no trace for {tx_hash}")]
    EmptyTrace { tx_hash: B256 },

    #[error("malformed trace: {reason}")]
    Malformed { reason: String },

    /// The node does not expose the tracing method.
    #[error("trace method {method} not supported by node")]
    Unsupported { method: String },

    #[error("no trace source configured")]
    NoSources,
}

impl TraceError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Map a transport error from `method`, recognising "method not found".
    pub fn from_transport(method: &str, err: TransportError) -> Self {
        if err.is_method_not_found() {
            Self::Unsupported {
                method: method.to_string(),
            }
        } else {
            Self::Transport(err)
        }
    }
}

impl Retryable for TraceError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            // A node that is still indexing may briefly return an empty trace.
            Self::EmptyTrace { .. } => true,
            Self::Timeout { .. } | Self::Malformed { .. } | Self::Unsupported { .. } | Self::NoSources => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaintrace_rpc::JsonRpcError;

    #[test]
    fn method_not_found_becomes_unsupported() {
        let err = TransportError::Rpc(JsonRpcError {
            code: -32601,
            message: "the method debug_traceTransaction does not exist/is not available".into(),
            data: None,
        });
        assert!(matches!(
            TraceError::from_transport("debug_traceTransaction", err),
            TraceError::Unsupported { ref method } if method == "debug_traceTransaction"
        ));
    }

    #[test]
    fn retry_classification() {
        assert!(TraceError::from_transport("x", TransportError::Http("reset".into())).is_retryable());
        assert!(!TraceError::malformed("bad").is_retryable());
        assert!(!TraceError::Unsupported { method: "x".into() }.is_retryable());
    }
}
