use alloy_primitives::Address;
use std::fmt;

/// A signing address and its key material.
///
/// The material is never inspected here; transactions reach the client
/// already signed. It is carried so callers can keep key and address together.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    address: Address,
    secret: Vec<u8>,
}

impl SigningKey {
    pub fn new(address: Address, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            address,
            secret: secret.into(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let key = SigningKey::new(Address::repeat_byte(1), vec![0xaa; 32]);
        let dbg = format!("{key:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("170"));
    }
}
