//! Compiler panics: `Panic(uint256)`, emitted by Solidity >= 0.8 for failed
//! asserts, checked arithmetic and similar runtime checks.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use chaintrace_core::RevertReason;

/// `keccak256("Panic(uint256)")[..4]`
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicCode {
    Generic,
    AssertFailed,
    ArithmeticOverflow,
    DivisionByZero,
    InvalidEnumValue,
    CorruptStorageArray,
    PopEmptyArray,
    IndexOutOfBounds,
    OutOfMemory,
    UninitializedFunction,
    Other(u64),
}

impl PanicCode {
    pub fn from_code(code: u64) -> Self {
        match code {
            0x00 => Self::Generic,
            0x01 => Self::AssertFailed,
            0x11 => Self::ArithmeticOverflow,
            0x12 => Self::DivisionByZero,
            0x21 => Self::InvalidEnumValue,
            0x22 => Self::CorruptStorageArray,
            0x31 => Self::PopEmptyArray,
            0x32 => Self::IndexOutOfBounds,
            0x41 => Self::OutOfMemory,
            0x51 => Self::UninitializedFunction,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u64 {
        match self {
            Self::Generic => 0x00,
            Self::AssertFailed => 0x01,
            Self::ArithmeticOverflow => 0x11,
            Self::DivisionByZero => 0x12,
            Self::InvalidEnumValue => 0x21,
            Self::CorruptStorageArray => 0x22,
            Self::PopEmptyArray => 0x31,
            Self::IndexOutOfBounds => 0x32,
            Self::OutOfMemory => 0x41,
            Self::UninitializedFunction => 0x51,
            Self::Other(code) => *code,
        }
    }

    pub fn meaning(&self) -> &'static str {
        match self {
            Self::Generic => "generic panic",
            Self::AssertFailed => "assertion failed",
            Self::ArithmeticOverflow => "arithmetic overflow or underflow in checked math",
            Self::DivisionByZero => "division or modulo by zero",
            Self::InvalidEnumValue => "value out of range for enum conversion",
            Self::CorruptStorageArray => "incorrectly encoded storage byte array",
            Self::PopEmptyArray => "pop from an empty array",
            Self::IndexOutOfBounds => "array index out of bounds",
            Self::OutOfMemory => "memory allocation too large",
            Self::UninitializedFunction => "call to an uninitialised function pointer",
            Self::Other(_) => "unrecognised panic code",
        }
    }
}

impl From<PanicCode> for RevertReason {
    fn from(panic: PanicCode) -> Self {
        RevertReason::Panic {
            code: panic.code(),
            meaning: panic.meaning().to_string(),
        }
    }
}

/// The panic carried by `data`, if it is a well-formed `Panic(uint256)` payload.
///
/// Codes too large for a `u64` are reported as `Other(u64::MAX)`.
pub fn decode_panic(data: &[u8]) -> Option<PanicCode> {
    let payload = data.strip_prefix(&PANIC_SELECTOR[..])?;
    let DynSolValue::Uint(value, _) = DynSolType::Uint(256).abi_decode(payload).ok()? else {
        return None;
    };
    Some(PanicCode::from_code(u64::try_from(value).unwrap_or(u64::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(code: u8) -> Vec<u8> {
        let mut data = PANIC_SELECTOR.to_vec();
        data.extend_from_slice(&[0u8; 31]);
        data.push(code);
        data
    }

    #[test]
    fn known_codes() {
        assert_eq!(decode_panic(&payload(0x11)), Some(PanicCode::ArithmeticOverflow));
        assert_eq!(decode_panic(&payload(0x32)), Some(PanicCode::IndexOutOfBounds));
        assert_eq!(decode_panic(&payload(0x01)), Some(PanicCode::AssertFailed));
    }

    #[test]
    fn unlisted_code_is_kept() {
        let panic = decode_panic(&payload(0x99)).unwrap();
        assert_eq!(panic, PanicCode::Other(0x99));
        assert_eq!(panic.code(), 0x99);
    }

    #[test]
    fn into_revert_reason() {
        let reason: RevertReason = PanicCode::DivisionByZero.into();
        assert_eq!(
            reason,
            RevertReason::Panic {
                code: 0x12,
                meaning: "division or modulo by zero".into()
            }
        );
    }

    #[test]
    fn other_selectors_and_short_payloads() {
        let mut data = payload(0x11);
        data[0] = 0x08;
        assert!(decode_panic(&data).is_none());
        assert!(decode_panic(&PANIC_SELECTOR).is_none());
        assert!(decode_panic(&[0x4e, 0x48]).is_none());
    }
}
