//! EIP-1167 minimal proxy (clone) detection.
//!
//! Clone factories deploy 45-byte stubs that delegate every call to a fixed
//! implementation. The implementation address sits at bytes 10..30.

use alloy_primitives::Address;

pub const EIP1167_PREFIX: &[u8] = &[0x36, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36, 0x3d, 0x73];

pub const EIP1167_SUFFIX: &[u8] = &[
    0x5a, 0xf4, 0x3d, 0x82, 0x80, 0x3e, 0x90, 0x3d, 0x91, 0x60, 0x2b, 0x57, 0xfd, 0x5b, 0xf3,
];

const EIP1167_LEN: usize = 45;

/// The implementation address of an EIP-1167 clone, or `None` if `code` is not one.
pub fn eip1167_implementation(code: &[u8]) -> Option<Address> {
    if code.len() != EIP1167_LEN
        || !code.starts_with(EIP1167_PREFIX)
        || !code.ends_with(EIP1167_SUFFIX)
    {
        return None;
    }
    Some(Address::from_slice(&code[10..30]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clone_code(implementation: Address) -> Vec<u8> {
        let mut code = EIP1167_PREFIX.to_vec();
        code.extend_from_slice(implementation.as_slice());
        code.extend_from_slice(EIP1167_SUFFIX);
        code
    }

    #[test]
    fn detects_clone() {
        let imp = Address::repeat_byte(0xbe);
        assert_eq!(eip1167_implementation(&clone_code(imp)), Some(imp));
    }

    #[test]
    fn rejects_other_code() {
        assert!(eip1167_implementation(&[0x60, 0x80, 0x60, 0x40]).is_none());
        let mut code = clone_code(Address::ZERO);
        code.push(0x00);
        assert!(eip1167_implementation(&code).is_none());
    }
}
