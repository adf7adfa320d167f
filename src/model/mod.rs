pub mod address;
pub mod units;
pub mod vault;

pub use vault::VaultInfo;

use alloy_primitives::{Address, B256, I256, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::PositionError;

/// A log as returned by `eth_getLogs` or inside a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub success: bool,
    pub logs: Vec<LogEntry>,
}

/// One reconstructed deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub tx_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
    /// Underlying asset moved into the vault.
    pub token_amount: U256,
    /// Vault shares minted to the depositor.
    pub share_amount: U256,
    /// `token_amount * mantissa / share_amount`, truncated.
    pub price: U256,
}

impl TransferRecord {
    /// Returns `None` when the amounts can't describe a deposit
    /// (zero shares, or a product that does not fit in 256 bits).
    pub fn from_amounts(
        tx_hash: B256,
        block_number: u64,
        log_index: u64,
        token_amount: U256,
        share_amount: U256,
        mantissa: U256,
    ) -> Option<Self> {
        if share_amount.is_zero() {
            return None;
        }
        let price = token_amount.checked_mul(mantissa)? / share_amount;

        Some(Self {
            tx_hash,
            block_number,
            log_index,
            token_amount,
            share_amount,
            price,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub total_invested: U256,
    pub total_shares: U256,
    pub current_value: U256,
    pub net_return: I256,
}

impl PositionSummary {
    pub fn from_records(records: &[TransferRecord], vault: &VaultInfo) -> Result<Self, PositionError> {
        let mut total_invested = U256::ZERO;
        let mut total_shares = U256::ZERO;

        for record in records {
            total_invested = total_invested
                .checked_add(record.token_amount)
                .ok_or(PositionError::Overflow("total invested"))?;
            total_shares = total_shares
                .checked_add(record.share_amount)
                .ok_or(PositionError::Overflow("total shares"))?;
        }

        let current_value = total_shares
            .checked_mul(vault.share_price)
            .ok_or(PositionError::Overflow("current value"))?
            / vault.mantissa;

        let net_return = signed_difference(current_value, total_invested)?;

        Ok(Self {
            total_invested,
            total_shares,
            current_value,
            net_return,
        })
    }

    /// Net return as a percentage of the amount invested, for display.
    pub fn return_pct(&self) -> Option<Decimal> {
        if self.total_invested.is_zero() {
            return None;
        }
        let net = Decimal::from_str(&self.net_return.to_string()).ok()?;
        let invested = Decimal::from_str(&self.total_invested.to_string()).ok()?;

        net.checked_div(invested)?
            .checked_mul(dec!(100))
            .map(|pct| pct.round_dp(2))
    }
}

fn signed_difference(a: U256, b: U256) -> Result<I256, PositionError> {
    let overflow = |_| PositionError::Overflow("net return");
    if a >= b {
        I256::try_from(a - b).map_err(overflow)
    } else {
        I256::try_from(b - a).map(|v| -v).map_err(overflow)
    }
}

/// Everything reconstructed for one watched address in one fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub records: Vec<TransferRecord>,
    pub summary: PositionSummary,
    /// Deposit events whose receipts did not look like a plain deposit.
    pub skipped: usize,
    pub latest_block: u64,
}

/// Outcome of one output slot.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Idle,
    Loading,
    Ready(T),
    Empty,
    Failed(String),
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        FetchState::Idle
    }
}

impl<T> FetchState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            FetchState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchState::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            FetchState::Idle => "not loaded",
            FetchState::Loading => "loading",
            FetchState::Ready(_) => "ready",
            FetchState::Empty => "empty",
            FetchState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub level: AlertLevel,
    pub topic: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc_vault(share_price: u64, decimals: u8) -> VaultInfo {
        VaultInfo::new(
            "USDC yVault".to_string(),
            decimals,
            U256::from(share_price),
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
        )
        .unwrap()
    }

    fn record(token: u64, shares: u64, mantissa: U256) -> TransferRecord {
        TransferRecord::from_amounts(B256::ZERO, 1, 0, U256::from(token), U256::from(shares), mantissa).unwrap()
    }

    #[test]
    fn price_truncates() {
        let vault = usdc_vault(1_000_000, 6);
        let r = record(1_000_000, 950_000, vault.mantissa);
        assert_eq!(r.price, U256::from(1_052_631u64));
    }

    #[test]
    fn zero_shares_is_not_a_record() {
        let r = TransferRecord::from_amounts(B256::ZERO, 1, 0, U256::from(5u64), U256::ZERO, U256::from(1u64));
        assert!(r.is_none());
    }

    #[test]
    fn summary_of_two_deposits() {
        let vault = usdc_vault(2, 0);
        let records = vec![record(500, 500, vault.mantissa), record(300, 290, vault.mantissa)];

        let summary = PositionSummary::from_records(&records, &vault).unwrap();
        assert_eq!(summary.total_invested, U256::from(800u64));
        assert_eq!(summary.total_shares, U256::from(790u64));
        assert_eq!(summary.current_value, U256::from(1580u64));
        assert_eq!(summary.net_return, I256::try_from(780i64).unwrap());
        assert_eq!(summary.return_pct(), Some(dec!(97.50)));
    }

    #[test]
    fn net_return_can_be_negative() {
        // price 0.9 with 6 decimals
        let vault = usdc_vault(900_000, 6);
        let records = vec![record(1_000_000, 1_000_000, vault.mantissa)];

        let summary = PositionSummary::from_records(&records, &vault).unwrap();
        assert_eq!(summary.current_value, U256::from(900_000u64));
        assert_eq!(summary.net_return, I256::try_from(-100_000i64).unwrap());
        assert_eq!(summary.return_pct(), Some(dec!(-10)));
    }

    #[test]
    fn current_value_floors() {
        let vault = usdc_vault(1_500_001, 6);
        let records = vec![record(3, 3, vault.mantissa)];

        let summary = PositionSummary::from_records(&records, &vault).unwrap();
        // 3 * 1_500_001 / 1_000_000 = 4.500003
        assert_eq!(summary.current_value, U256::from(4u64));
    }

    #[test]
    fn empty_ledger_summary() {
        let vault = usdc_vault(1_000_000, 6);
        let summary = PositionSummary::from_records(&[], &vault).unwrap();
        assert!(summary.total_invested.is_zero());
        assert!(summary.net_return.is_zero());
        assert_eq!(summary.return_pct(), None);
    }

    #[test]
    fn fetch_state_defaults_to_idle() {
        let state: FetchState<u8> = FetchState::default();
        assert_eq!(state, FetchState::Idle);
        assert_eq!(state.ready(), None);
        assert!(FetchState::<u8>::Failed("boom".into()).is_failed());
    }
}
