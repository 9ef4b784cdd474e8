//! chaintrace-rpc: JSON-RPC plumbing for ChainTrace.
//!
//! - [`RpcTransport`]: async transport trait, object-safe (`Arc<dyn RpcTransport>`)
//! - [`HttpRpcClient`]: reqwest-backed transport with retry on transient errors
//! - [`RetryPolicy`]: exponential backoff shared by the transport, tracer and nonce resync
//! - [`EthApi`]: typed `eth_*`, `debug_*` and `trace_*` calls with a per-call deadline

pub mod error;
pub mod eth;
pub mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod request;
pub mod retry;
pub mod transport;

pub use error::TransportError;
pub use eth::{BlockTag, EthApi};
pub use http::{HttpClientConfig, HttpRpcClient};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use retry::{RetryConfig, RetryPolicy, Retryable};
pub use transport::RpcTransport;
