//! ABI encoder, the inverse of the decoders in this crate.
//!
//! Builds calldata, return data and custom-error revert payloads from
//! `NormalizedValue` arguments. Tests use it to produce frames whose decoding
//! must reproduce the encoded arguments.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_json_abi::{JsonAbi, Param};
use alloy_primitives::{Address, FixedBytes, I256, U256};
use chaintrace_core::{DecodeError, NormalizedValue};
use std::str::FromStr;
use std::sync::Arc;

use crate::abi::resolve_types;

pub struct EvmEncoder {
    abi: Arc<JsonAbi>,
}

impl EvmEncoder {
    pub fn new(abi: Arc<JsonAbi>) -> Self {
        Self { abi }
    }

    /// `selector ++ abi_encode_params(args)` for the first function named `function_name`.
    pub fn encode_call(
        &self,
        function_name: &str,
        args: &[NormalizedValue],
    ) -> Result<Vec<u8>, DecodeError> {
        let func = self
            .abi
            .functions()
            .find(|f| f.name == function_name)
            .ok_or_else(|| DecodeError::Other(format!("function '{function_name}' not found in ABI")))?;

        let mut out = func.selector().to_vec();
        out.extend(encode_params(&func.inputs, args)?);
        Ok(out)
    }

    /// Return data for `function_name`'s declared outputs.
    pub fn encode_return(
        &self,
        function_name: &str,
        values: &[NormalizedValue],
    ) -> Result<Vec<u8>, DecodeError> {
        let func = self
            .abi
            .functions()
            .find(|f| f.name == function_name)
            .ok_or_else(|| DecodeError::Other(format!("function '{function_name}' not found in ABI")))?;
        encode_params(&func.outputs, values)
    }

    /// Revert payload for the custom error `error_name`.
    pub fn encode_error(
        &self,
        error_name: &str,
        args: &[NormalizedValue],
    ) -> Result<Vec<u8>, DecodeError> {
        let err = self
            .abi
            .errors()
            .find(|e| e.name == error_name)
            .ok_or_else(|| DecodeError::Other(format!("error '{error_name}' not found in ABI")))?;

        let mut out = err.selector().to_vec();
        out.extend(encode_params(&err.inputs, args)?);
        Ok(out)
    }
}

/// ABI-encode `args` against a declared parameter list.
pub fn encode_params(params: &[Param], args: &[NormalizedValue]) -> Result<Vec<u8>, DecodeError> {
    if args.len() != params.len() {
        return Err(DecodeError::AbiDecodeFailed {
            reason: format!(
                "argument count mismatch: ABI has {}, got {}",
                params.len(),
                args.len()
            ),
        });
    }
    let types = resolve_types(params)?;
    let values = types
        .iter()
        .zip(args)
        .zip(params)
        .map(|((ty, arg), param)| {
            normalized_to_dyn_value(arg, ty).map_err(|reason| DecodeError::AbiDecodeFailed {
                reason: format!("param '{}': {reason}", param.name),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// Convert a `NormalizedValue` to the alloy `DynSolValue` for the expected type.
pub fn normalized_to_dyn_value(
    val: &NormalizedValue,
    expected: &DynSolType,
) -> Result<DynSolValue, String> {
    match (val, expected) {
        (NormalizedValue::Bool(b), DynSolType::Bool) => Ok(DynSolValue::Bool(*b)),

        (NormalizedValue::Uint(u), DynSolType::Uint(bits)) => {
            Ok(DynSolValue::Uint(U256::from(*u), *bits))
        }
        (NormalizedValue::BigUint(s), DynSolType::Uint(bits)) => {
            let u = U256::from_str(s).map_err(|e| format!("uint parse: {e}"))?;
            Ok(DynSolValue::Uint(u, *bits))
        }

        (NormalizedValue::Int(i), DynSolType::Int(bits)) => {
            let i = I256::try_from(*i).map_err(|e| e.to_string())?;
            Ok(DynSolValue::Int(i, *bits))
        }
        (NormalizedValue::Uint(u), DynSolType::Int(bits)) => {
            let i = I256::try_from(*u).map_err(|e| e.to_string())?;
            Ok(DynSolValue::Int(i, *bits))
        }
        (NormalizedValue::BigInt(s), DynSolType::Int(bits)) => {
            let i = I256::from_str(s).map_err(|e| format!("int parse: {e}"))?;
            Ok(DynSolValue::Int(i, *bits))
        }

        (NormalizedValue::Address(s), DynSolType::Address) => {
            let addr = Address::from_str(s).map_err(|e| format!("address parse: {e}"))?;
            Ok(DynSolValue::Address(addr))
        }

        (NormalizedValue::Str(s), DynSolType::String) => Ok(DynSolValue::String(s.clone())),

        (NormalizedValue::Bytes(b), DynSolType::Bytes) => Ok(DynSolValue::Bytes(b.clone())),

        (NormalizedValue::Bytes(b), DynSolType::FixedBytes(n)) => {
            if b.len() > *n {
                return Err(format!("bytes{n}: got {} bytes", b.len()));
            }
            let mut word = [0u8; 32];
            word[..b.len()].copy_from_slice(b);
            Ok(DynSolValue::FixedBytes(FixedBytes::from(word), *n))
        }

        (NormalizedValue::Array(items), DynSolType::Array(inner)) => Ok(DynSolValue::Array(
            items
                .iter()
                .map(|v| normalized_to_dyn_value(v, inner))
                .collect::<Result<_, _>>()?,
        )),

        (NormalizedValue::Array(items), DynSolType::FixedArray(inner, len)) => {
            if items.len() != *len {
                return Err(format!("fixed array: expected {len} items, got {}", items.len()));
            }
            Ok(DynSolValue::FixedArray(
                items
                    .iter()
                    .map(|v| normalized_to_dyn_value(v, inner))
                    .collect::<Result<_, _>>()?,
            ))
        }

        (NormalizedValue::Tuple(fields), DynSolType::Tuple(types)) => {
            if fields.len() != types.len() {
                return Err(format!(
                    "tuple: expected {} fields, got {}",
                    types.len(),
                    fields.len()
                ));
            }
            Ok(DynSolValue::Tuple(
                fields
                    .iter()
                    .zip(types)
                    .map(|((_, v), ty)| normalized_to_dyn_value(v, ty))
                    .collect::<Result<_, _>>()?,
            ))
        }

        (val, ty) => Err(format!("cannot encode {val:?} as {}", ty.sol_type_name())),
    }
}
