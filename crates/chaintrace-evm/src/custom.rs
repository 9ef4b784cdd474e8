//! Custom errors (Solidity 0.8.4+): `error InsufficientBalance(uint256 available, uint256 required)`.
//!
//! Encoded as `selector ++ abi_encode_params(args)`.

use alloy_json_abi::{Error as AbiError, JsonAbi};
use chaintrace_core::NormalizedValue;

use crate::abi::{decode_params, find_error};

/// Decode `data` against one declared error. `None` if the selector differs
/// or the arguments do not decode.
pub fn decode_custom_error(
    data: &[u8],
    error: &AbiError,
) -> Option<Vec<(String, NormalizedValue)>> {
    let payload = data.strip_prefix(&error.selector().0[..])?;
    decode_params(payload, &error.inputs, "arg").ok()
}

/// Find and decode a custom error declared in `abi`.
pub fn decode_in_abi(data: &[u8], abi: &JsonAbi) -> Option<(String, Vec<(String, NormalizedValue)>)> {
    let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;
    let error = find_error(abi, selector)?;
    let args = decode_custom_error(data, error)?;
    Some((error.name.clone(), args))
}
