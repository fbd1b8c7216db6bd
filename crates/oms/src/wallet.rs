//! Deposit addresses
//!
//! Placeholder custody: addresses are random and not backed by a chain
//! wallet.

use uuid::Uuid;

const PREFIX: &str = "demo_";

/// A fresh deposit address: `demo_` followed by 16 hex characters
pub fn deposit_address() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", PREFIX, &hex[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_shape() {
        let address = deposit_address();
        assert!(address.starts_with("demo_"));
        assert_eq!(address.len(), 21);
        assert!(address[5..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(address, deposit_address());
    }
}
