//! ABI lookups and parameter decoding shared by the call, revert and event decoders.

use alloy_core::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::{Error as AbiError, Function, JsonAbi, Param};
use alloy_primitives::B256;
use chaintrace_core::{DecodeError, NormalizedValue};
use tiny_keccak::{Hasher, Keccak};

use crate::normalizer::normalize_with;

pub fn keccak256(data: &[u8]) -> B256 {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    B256::from(out)
}

/// `keccak256(signature)[..4]`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn parse_abi(json: &str) -> Result<JsonAbi, DecodeError> {
    serde_json::from_str(json).map_err(|e| DecodeError::InvalidAbi {
        reason: format!("invalid ABI JSON: {e}"),
    })
}

pub fn find_function(abi: &JsonAbi, selector: [u8; 4]) -> Option<&Function> {
    abi.functions().find(|f| f.selector().0 == selector)
}

pub fn find_error(abi: &JsonAbi, selector: [u8; 4]) -> Option<&AbiError> {
    abi.errors().find(|e| e.selector().0 == selector)
}

pub fn resolve_types(params: &[Param]) -> Result<Vec<DynSolType>, DecodeError> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            p.resolve().map_err(|e| DecodeError::AbiDecodeFailed {
                reason: format!("param {i} ({}): {e}", p.ty),
            })
        })
        .collect()
}

/// ABI-decode a parameter list (calldata body, return data, error arguments).
///
/// Unnamed parameters are keyed `{prefix}{index}`.
pub fn decode_params(
    data: &[u8],
    params: &[Param],
    prefix: &str,
) -> Result<Vec<(String, NormalizedValue)>, DecodeError> {
    let types = resolve_types(params)?;
    let decoded = DynSolType::Tuple(types)
        .abi_decode_params(data)
        .map_err(|e| DecodeError::AbiDecodeFailed {
            reason: e.to_string(),
        })?;

    let values = match decoded {
        DynSolValue::Tuple(values) => values,
        other => vec![other],
    };

    Ok(params
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (param, value))| {
            let name = if param.name.is_empty() {
                format!("{prefix}{i}")
            } else {
                param.name.clone()
            };
            (name, normalize_with(value, &param.components))
        })
        .collect())
}

/// Decode a function's calldata. `calldata` includes the selector.
pub fn decode_inputs(
    func: &Function,
    calldata: &[u8],
) -> Result<Vec<(String, NormalizedValue)>, DecodeError> {
    let body = calldata.get(4..).ok_or_else(|| DecodeError::InvalidData {
        reason: format!("calldata too short: {} bytes", calldata.len()),
    })?;
    decode_params(body, &func.inputs, "arg")
}

/// Decode a function's return data. Unnamed outputs are keyed "0", "1", ...
pub fn decode_outputs(
    func: &Function,
    data: &[u8],
) -> Result<Vec<(String, NormalizedValue)>, DecodeError> {
    decode_params(data, &func.outputs, "")
}
