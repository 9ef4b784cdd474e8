//! chaintrace-core: shared types for the ChainTrace tracing and decoding engine.
//!
//! # Overview
//!
//! - [`CallFrame`]: one node of a traced transaction's call tree, as reported by the node
//! - [`DecodedCall`] / [`DecodedEvent`] / [`RevertReason`]: the decoded view of a frame
//! - [`DecodedTransaction`]: transaction, receipt, decoded call tree and events
//! - [`NormalizedValue`]: ABI values in a chain-agnostic, serialisable form
//! - [`Transaction`] / [`TransactionReceipt`] / [`Log`]: `eth_*` wire types
//! - [`SigningKey`]: an address plus opaque key material

pub mod decoded;
pub mod error;
pub mod frame;
pub mod key;
pub mod tx;
pub mod types;

pub use decoded::{
    AbiMatchKind, DecodeState, DecodedCall, DecodedEvent, DecodedField, DecodedTransaction,
    RevertReason, UNKNOWN,
};
pub use error::DecodeError;
pub use frame::{CallFrame, CallKind, RawLog};
pub use key::SigningKey;
pub use tx::{Log, Transaction, TransactionReceipt};
pub use types::NormalizedValue;
