//! # chaintrace-evm
//!
//! ABI resolution and decoding for traced EVM transactions.
//!
//! ## Implementation notes
//! - Uses `alloy-core` for ABI decode and encode
//! - [`AbiStore`] holds compiled artifacts by name; [`ContractMap`] maps deployed addresses to them
//! - [`AbiFinder`] resolves a frame's callee: address, then code hash, then EIP-1167 clone
//! - [`TransactionDecoder`] turns a call tree into a decoded tree; it never fails as a whole
//! - Revert data: `Error(string)`, custom errors from any known ABI, `Panic(uint256)`, raw

pub mod abi;
pub mod contract_map;
pub mod custom;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod event;
pub mod finder;
pub mod normalizer;
pub mod panic;
pub mod proxy;
pub mod revert;
pub mod store;

pub use contract_map::{
    load_deployed_contracts, save_deployed_contract, ContractDeployment, ContractMap,
};
pub use decoder::TransactionDecoder;
pub use encoder::EvmEncoder;
pub use error::ContractMapError;
pub use event::EventDecoder;
pub use finder::{AbiFinder, AbiMatch};
pub use panic::PanicCode;
pub use revert::RevertDecoder;
pub use store::{AbiStore, ContractArtifact};
