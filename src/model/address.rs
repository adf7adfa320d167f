use alloy_primitives::Address;
use std::str::FromStr;

use crate::error::AddressError;

/// Parse a user supplied account address.
///
/// Requires a `0x` prefix and 40 hex digits. All-lowercase and all-uppercase
/// digits are accepted as is; mixed case must match the EIP-55 checksum.
pub fn parse_address(input: &str) -> Result<Address, AddressError> {
    let invalid = || AddressError::InvalidAddress(input.to_string());

    let digits = input.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let address = Address::from_str(digits).map_err(|_| invalid())?;

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && address.to_checksum(None)[2..] != *digits {
        return Err(invalid());
    }

    Ok(address)
}

pub fn short_address(address: &Address) -> String {
    let s = address.to_checksum(None);
    format!("{}...{}", &s[..6], &s[s.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: &str = "0x5f18C75AbDAe578b483E5F43f12a39cF75b973a9";

    #[test]
    fn accepts_checksummed() {
        let addr = parse_address(CHECKSUMMED).unwrap();
        assert_eq!(addr.to_checksum(None), CHECKSUMMED);
    }

    #[test]
    fn accepts_single_case() {
        assert!(parse_address(&CHECKSUMMED.to_lowercase()).is_ok());
        let upper = format!("0x{}", CHECKSUMMED[2..].to_uppercase());
        assert!(parse_address(&upper).is_ok());
    }

    #[test]
    fn rejects_bad_checksum() {
        // flip the case of one letter
        let bad = CHECKSUMMED.replacen("C75", "c75", 1);
        assert_eq!(parse_address(&bad), Err(AddressError::InvalidAddress(bad.clone())));
    }

    #[test]
    fn rejects_malformed() {
        for input in [
            "",
            "0x",
            "5f18c75abdae578b483e5f43f12a39cf75b973a9",
            "0x5f18c75abdae578b483e5f43f12a39cf75b973a",
            "0x5f18c75abdae578b483e5f43f12a39cf75b973a90",
            "0x5f18c75abdae578b483e5f43f12a39cf75b973zz",
            " 0x5f18c75abdae578b483e5f43f12a39cf75b973a9",
        ] {
            assert!(parse_address(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn shortens_for_display() {
        let addr = parse_address(CHECKSUMMED).unwrap();
        assert_eq!(short_address(&addr), "0x5f18...73a9");
    }
}
