//! Converts alloy `DynSolValue` into `NormalizedValue`.
//!
//! The ABI declaration is threaded through so that struct components keep
//! their declared names; without it, tuple fields are keyed "0", "1", ...

use alloy_core::dyn_abi::DynSolValue;
use alloy_json_abi::Param;
use chaintrace_core::NormalizedValue;

/// Convert a decoded value with no declaration information.
pub fn normalize(val: DynSolValue) -> NormalizedValue {
    normalize_with(val, &[])
}

/// Convert a decoded value, naming tuple fields after `components`.
///
/// For `tuple[]` / `tuple[N]` parameters the components describe the element
/// tuple, so they are passed through unchanged to each element.
pub fn normalize_with(val: DynSolValue, components: &[Param]) -> NormalizedValue {
    match val {
        DynSolValue::Bool(b) => NormalizedValue::Bool(b),

        DynSolValue::Int(i, _) => match i128::try_from(i) {
            Ok(v) => NormalizedValue::Int(v),
            Err(_) => NormalizedValue::BigInt(i.to_string()),
        },

        DynSolValue::Uint(u, _) => match u128::try_from(u) {
            Ok(v) => NormalizedValue::Uint(v),
            Err(_) => NormalizedValue::BigUint(u.to_string()),
        },

        DynSolValue::FixedBytes(word, size) => NormalizedValue::Bytes(word[..size].to_vec()),

        DynSolValue::Bytes(b) => NormalizedValue::Bytes(b),

        DynSolValue::String(s) => NormalizedValue::Str(s),

        DynSolValue::Address(a) => NormalizedValue::Address(a.to_checksum(None)),

        DynSolValue::Function(f) => NormalizedValue::Bytes(f.to_vec()),

        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => NormalizedValue::Array(
            vals.into_iter()
                .map(|v| normalize_with(v, components))
                .collect(),
        ),

        DynSolValue::Tuple(fields) => NormalizedValue::Tuple(
            fields
                .into_iter()
                .enumerate()
                .map(|(i, v)| match components.get(i) {
                    Some(p) => (field_name(&p.name, i), normalize_with(v, &p.components)),
                    None => (i.to_string(), normalize_with(v, &[])),
                })
                .collect(),
        ),

        #[allow(unreachable_patterns)]
        _ => NormalizedValue::Null,
    }
}

fn field_name(name: &str, index: usize) -> String {
    if name.is_empty() {
        index.to_string()
    } else {
        name.to_string()
    }
}
