//! Just enough of the Solidity ABI to read the vault's view methods and
//! ERC20 `Transfer` logs.

use alloy_primitives::{keccak256, Address, B256, U256};

use crate::error::GatewayError;

pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

const WORD: usize = 32;

pub fn transfer_topic() -> B256 {
    keccak256(TRANSFER_EVENT.as_bytes())
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn word(data: &[u8], index: usize, what: &'static str) -> Result<[u8; WORD], GatewayError> {
    let start = index * WORD;
    data.get(start..start + WORD)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| GatewayError::decode(what, format!("need word {} of {} bytes", index, data.len())))
}

pub fn decode_uint(data: &[u8]) -> Result<U256, GatewayError> {
    Ok(U256::from_be_bytes(word(data, 0, "uint256")?))
}

pub fn decode_address(data: &[u8]) -> Result<Address, GatewayError> {
    let w = word(data, 0, "address")?;
    if w[..12].iter().any(|b| *b != 0) {
        return Err(GatewayError::decode("address", "dirty high bytes"));
    }
    Ok(Address::from_slice(&w[12..]))
}

/// Dynamic `string` return value: offset word, length word, then bytes.
pub fn decode_string(data: &[u8]) -> Result<String, GatewayError> {
    let offset = to_usize(decode_uint(data)?, "string offset")?;
    let tail = data
        .get(offset..)
        .ok_or_else(|| GatewayError::decode("string", "offset past end"))?;
    let len = to_usize(decode_uint(tail)?, "string length")?;
    let end = WORD
        .checked_add(len)
        .ok_or_else(|| GatewayError::decode("string", "length overflow"))?;
    let bytes = tail
        .get(WORD..end)
        .ok_or_else(|| GatewayError::decode("string", "length past end"))?;

    String::from_utf8(bytes.to_vec()).map_err(|e| GatewayError::decode("string", e.to_string()))
}

fn to_usize(value: U256, what: &'static str) -> Result<usize, GatewayError> {
    usize::try_from(value).map_err(|_| GatewayError::decode(what, "too large"))
}

/// Value field of an ERC20 `Transfer` log (the only non-indexed argument).
pub fn decode_transfer_value(data: &[u8]) -> Result<U256, GatewayError> {
    decode_uint(data)
}

pub fn encode_uint(value: U256) -> Vec<u8> {
    value.to_be_bytes::<WORD>().to_vec()
}

#[cfg(test)]
pub fn encode_address(address: Address) -> Vec<u8> {
    address.into_word().to_vec()
}

#[cfg(test)]
pub fn encode_string(value: &str) -> Vec<u8> {
    let mut out = encode_uint(U256::from(WORD));
    out.extend(encode_uint(U256::from(value.len())));
    let mut bytes = value.as_bytes().to_vec();
    bytes.resize(value.len().div_ceil(WORD) * WORD, 0);
    out.extend(bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::hex;

    #[test]
    fn well_known_hashes() {
        assert_eq!(
            hex::encode(transfer_topic()),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        assert_eq!(selector("decimals()"), [0x31, 0x3c, 0xe5, 0x67]);
        assert_eq!(selector("name()"), [0x06, 0xfd, 0xde, 0x03]);
    }

    #[test]
    fn decodes_uint_word() {
        let data = encode_uint(U256::from(1_052_631u64));
        assert_eq!(decode_uint(&data).unwrap(), U256::from(1_052_631u64));
        assert!(decode_uint(&data[..31]).is_err());
    }

    #[test]
    fn decodes_address_word() {
        let addr = Address::repeat_byte(0x5f);
        assert_eq!(decode_address(&encode_address(addr)).unwrap(), addr);

        let mut dirty = encode_address(addr);
        dirty[0] = 1;
        assert!(decode_address(&dirty).is_err());
    }

    #[test]
    fn decodes_vault_name() {
        let data = encode_string("USDC yVault");
        assert_eq!(data.len(), 96);
        assert_eq!(decode_string(&data).unwrap(), "USDC yVault");
    }

    #[test]
    fn decodes_real_name_return_data() {
        // eth_call name() on a Yearn v2 vault
        let raw = hex::decode(concat!(
            "0000000000000000000000000000000000000000000000000000000000000020",
            "000000000000000000000000000000000000000000000000000000000000000b",
            "5553444320795661756c74000000000000000000000000000000000000000000",
        ))
        .unwrap();
        assert_eq!(decode_string(&raw).unwrap(), "USDC yVault");
    }

    #[test]
    fn truncated_string_is_an_error() {
        let data = encode_string("USDC yVault");
        assert!(decode_string(&data[..70]).is_err());
        assert!(decode_string(&data[..40]).is_err());
    }

    #[test]
    fn huge_string_length_is_an_error() {
        let mut data = encode_uint(U256::from(WORD));
        data.extend(encode_uint(U256::from(usize::MAX)));
        data.extend([0u8; WORD]);
        assert!(matches!(
            decode_string(&data),
            Err(GatewayError::Decode { what: "string", .. })
        ));

        let mut data = encode_uint(U256::from(WORD));
        data.extend(encode_uint(U256::from(u64::MAX)));
        assert!(decode_string(&data).is_err());
    }
}
