use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::PositionError;

/// Snapshot of a vault's metadata and live share price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultInfo {
    pub name: String,
    pub decimals: u8,
    /// Underlying per share, scaled by `mantissa`.
    pub share_price: U256,
    /// `10^decimals`
    pub mantissa: U256,
    pub token_address: Address,
    pub vault_address: Address,
}

impl VaultInfo {
    pub fn new(
        name: String,
        decimals: u8,
        share_price: U256,
        token_address: Address,
        vault_address: Address,
    ) -> Result<Self, PositionError> {
        let mantissa = U256::from(10u64)
            .checked_pow(U256::from(decimals))
            .ok_or(PositionError::DecimalsOutOfRange(decimals))?;

        Ok(Self {
            name,
            decimals,
            share_price,
            mantissa,
            token_address,
            vault_address,
        })
    }
}
