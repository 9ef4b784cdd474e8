//! Normalized ABI values.
//!
//! Decoded calldata, return data, revert arguments and event fields are all
//! expressed as `NormalizedValue` so test code can compare them without
//! touching alloy's dynamic value types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded, normalized ABI value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum NormalizedValue {
    Uint(u128),
    /// Uints that do not fit in u128, as a decimal string
    BigUint(String),
    Int(i128),
    /// Ints that do not fit in i128, as a decimal string
    BigInt(String),
    Bool(bool),
    #[serde(with = "hex_bytes")]
    Bytes(Vec<u8>),
    Str(String),
    /// 20-byte address, EIP-55 checksummed with 0x prefix
    Address(String),
    Array(Vec<NormalizedValue>),
    /// Struct or tuple; unnamed components are keyed by position
    Tuple(Vec<(String, NormalizedValue)>),
    Null,
}

impl NormalizedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, NormalizedValue::Null)
    }

    /// Returns the value as u128 if it is an unsigned integer that fits.
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            NormalizedValue::Uint(v) => Some(*v),
            NormalizedValue::BigUint(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            NormalizedValue::Int(v) => Some(*v),
            NormalizedValue::Uint(v) => i128::try_from(*v).ok(),
            NormalizedValue::BigInt(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NormalizedValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NormalizedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&str> {
        match self {
            NormalizedValue::Address(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            NormalizedValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[NormalizedValue]> {
        match self {
            NormalizedValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a named component of a tuple value.
    pub fn field(&self, name: &str) -> Option<&NormalizedValue> {
        match self {
            NormalizedValue::Tuple(fields) => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::Uint(v) => write!(f, "{v}"),
            NormalizedValue::BigUint(s) | NormalizedValue::BigInt(s) => write!(f, "{s}"),
            NormalizedValue::Int(v) => write!(f, "{v}"),
            NormalizedValue::Bool(b) => write!(f, "{b}"),
            NormalizedValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            NormalizedValue::Str(s) => write!(f, "{s:?}"),
            NormalizedValue::Address(a) => write!(f, "{a}"),
            NormalizedValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            NormalizedValue::Tuple(fields) => {
                write!(f, "(")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, ")")
            }
            NormalizedValue::Null => write!(f, "null"),
        }
    }
}

/// Serialises byte vectors as `0x`-prefixed hex instead of integer arrays.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nested_tuple() {
        let v = NormalizedValue::Tuple(vec![
            ("id".into(), NormalizedValue::Uint(7)),
            (
                "tags".into(),
                NormalizedValue::Array(vec![
                    NormalizedValue::Str("a".into()),
                    NormalizedValue::Str("b".into()),
                ]),
            ),
        ]);
        assert_eq!(v.to_string(), r#"(id: 7, tags: ["a", "b"])"#);
    }

    #[test]
    fn bytes_serialize_as_hex() {
        let v = NormalizedValue::Bytes(vec![0xde, 0xad]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"type":"bytes","value":"0xdead"}"#);
        let back: NormalizedValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn big_uint_coerces_when_it_fits() {
        assert_eq!(NormalizedValue::BigUint("42".into()).as_u128(), Some(42));
        assert_eq!(NormalizedValue::Str("42".into()).as_u128(), None);
    }

    #[test]
    fn tuple_field_lookup() {
        let v = NormalizedValue::Tuple(vec![("owner".into(), NormalizedValue::Bool(true))]);
        assert_eq!(v.field("owner"), Some(&NormalizedValue::Bool(true)));
        assert!(v.field("missing").is_none());
    }
}
