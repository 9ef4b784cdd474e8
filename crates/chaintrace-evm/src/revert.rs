//! Revert payload decoding.
//!
//! Priority:
//! 1. Empty data                       → `RevertReason::Empty`
//! 2. `0x08c379a0` prefix              → `RevertReason::ErrorString`  (Error(string))
//! 3. Error declared in the frame's ABI → `RevertReason::CustomError`
//! 4. Error declared in any known ABI  → `RevertReason::CustomError`
//! 5. `0x4e487b71` prefix              → `RevertReason::Panic`        (Panic(uint256))
//! 6. Fallback                         → `RevertReason::Raw`
//!
//! Unknown selectors are never guessed at; they fall through to raw bytes.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_json_abi::JsonAbi;
use alloy_primitives::Bytes;
use chaintrace_core::RevertReason;
use std::sync::Arc;

use crate::custom::decode_in_abi;
use crate::panic::decode_panic;
use crate::store::AbiStore;

/// `keccak256("Error(string)")[..4]`
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// `Some(message)` if `data` is a well-formed `Error(string)` payload.
pub fn decode_error_string(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR[..])?;
    match DynSolType::String.abi_decode(payload) {
        Ok(DynSolValue::String(s)) => Some(s),
        _ => None,
    }
}

/// Revert decoder with access to every known ABI for custom-error lookup.
pub struct RevertDecoder {
    store: Arc<AbiStore>,
}

impl RevertDecoder {
    pub fn new(store: Arc<AbiStore>) -> Self {
        Self { store }
    }

    /// Decode `data`, preferring errors declared in `abi` (the reverting frame's ABI).
    pub fn decode(&self, data: &[u8], abi: Option<&JsonAbi>) -> RevertReason {
        // ── Case 1: no data ─────────────────────────────────────────────────
        if data.is_empty() {
            return RevertReason::Empty;
        }

        // ── Case 2: Error(string) ───────────────────────────────────────────
        if let Some(message) = decode_error_string(data) {
            return RevertReason::ErrorString { message };
        }

        // ── Case 3: custom error in the frame's own ABI ─────────────────────
        if let Some((name, args)) = abi.and_then(|abi| decode_in_abi(data, abi)) {
            return RevertReason::CustomError { name, args };
        }

        // ── Case 4: custom error in any other known ABI ─────────────────────
        for artifact in self.store.artifacts() {
            if let Some((name, args)) = decode_in_abi(data, &artifact.abi) {
                tracing::debug!(error = %name, contract = %artifact.name, "custom error matched outside the frame's ABI");
                return RevertReason::CustomError { name, args };
            }
        }

        // ── Case 5: Panic(uint256) ──────────────────────────────────────────
        if let Some(panic) = decode_panic(data) {
            return panic.into();
        }

        // ── Case 6: raw ─────────────────────────────────────────────────────
        let selector = data.get(..4).and_then(|s| s.try_into().ok());
        tracing::debug!(len = data.len(), "revert data matched no known format");
        RevertReason::Raw {
            selector,
            data: Bytes::copy_from_slice(data),
        }
    }
}
