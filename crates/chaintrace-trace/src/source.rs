//! Pluggable trace sources.
//!
//! A node exposes call traces through one of several vendor methods; each
//! source wraps one of them and produces the same [`CallFrame`] tree.

use alloy_primitives::B256;
use async_trait::async_trait;
use chaintrace_core::CallFrame;

use crate::error::TraceError;

#[async_trait]
pub trait CallTraceSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Fetch and materialise the call tree of `tx_hash`.
    ///
    /// Must return [`TraceError::Unsupported`] when the node lacks the
    /// underlying method, so the tracer can move on to the next source.
    async fn trace(&self, tx_hash: B256) -> Result<CallFrame, TraceError>;
}
