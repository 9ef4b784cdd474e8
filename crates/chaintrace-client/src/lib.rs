//! chaintrace-client: the test client that ties ChainTrace together.
//!
//! - [`NonceManager`]: per-address nonce allocation for concurrent workers
//! - [`TraceClient`]: submit a signed transaction, wait for its receipt,
//!   trace it and return a [`DecodedTransaction`](chaintrace_core::DecodedTransaction)
//! - [`ClientConfig`]: TOML-loadable settings
//! - [`init_tracing`]: log subscriber setup

pub mod client;
pub mod config;
pub mod error;
pub mod nonce;
pub mod observability;

pub use client::TraceClient;
pub use config::{ClientConfig, TracingMode};
pub use error::{ClientError, NonceError};
pub use nonce::{NonceManager, NonceSource};
pub use observability::{init_tracing, LogConfig};
