//! chaintrace-trace: fetches a transaction's execution trace from the node
//! and materialises it as a [`CallFrame`](chaintrace_core::CallFrame) tree.
//!
//! # Sources
//!
//! | Source | RPC method | Per-frame logs |
//! |--------|-----------|----------------|
//! | [`CallTracerSource`] | `debug_traceTransaction` + `callTracer` | yes (`withLog`) |
//! | [`ParityTraceSource`] | `trace_transaction` | no |
//!
//! [`Tracer`] tries them in order and falls back when a node lacks a method.

pub mod call_tracer;
pub mod error;
pub mod parity;
pub mod source;
pub mod tracer;

pub use call_tracer::{parse_call_tracer, CallTracerSource};
pub use error::TraceError;
pub use parity::{parse_parity_traces, ParityTraceSource};
pub use source::CallTraceSource;
pub use tracer::{Tracer, TracerConfig};
