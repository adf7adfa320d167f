use alloy_primitives::{address, Address, B256, U256};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::api::abi;
use crate::api::provider::{ChainGateway, DataSourceStatus, EventFilter, ReadCall, ReadValue};
use crate::error::GatewayError;
use crate::model::{LogEntry, TransactionReceipt};

pub const DEMO_ACCOUNT: Address = address!("9f2b1c3e4d5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c");
pub const DEMO_TOKEN: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

#[derive(Debug, Clone)]
struct VaultFixture {
    name: String,
    decimals: u8,
    price_per_share: U256,
    token: Address,
}

/// In-memory chain used by demo mode and tests.
#[derive(Debug, Default)]
pub struct StaticGateway {
    chain_id: u64,
    latest_block: u64,
    accounts: Vec<Address>,
    balances: HashMap<Address, U256>,
    vaults: HashMap<Address, VaultFixture>,
    events: Vec<LogEntry>,
    receipts: HashMap<B256, TransactionReceipt>,
    receipt_delays: HashMap<B256, Duration>,
    pending_polls: Mutex<HashMap<B256, u32>>,
    queried_ranges: Mutex<Vec<(u64, u64)>>,
    offline: bool,
    fail_receipts: bool,
}

impl StaticGateway {
    pub fn new(chain_id: u64, latest_block: u64) -> Self {
        Self {
            chain_id,
            latest_block,
            ..Default::default()
        }
    }

    /// A USDC vault with three deposits and one plain share transfer.
    pub fn demo(vault: Address) -> Self {
        let usdc = |whole: u64, micro: u64| U256::from(whole * 1_000_000 + micro);
        let other_holder = Address::repeat_byte(0x42);

        Self::new(1, 12_480_000)
            .with_account(DEMO_ACCOUNT)
            .with_balance(DEMO_ACCOUNT, U256::from(1_734_500_000_000_000_000u64))
            .with_vault(vault, "USDC yVault", 6, usdc(1, 84_211), DEMO_TOKEN)
            .with_deposit(vault, DEMO_ACCOUNT, B256::repeat_byte(0xa1), 11_903_112, usdc(10_000, 0), usdc(9_834, 552_118))
            .with_deposit(vault, DEMO_ACCOUNT, B256::repeat_byte(0xa2), 12_004_871, usdc(2_500, 0), usdc(2_415, 7_301))
            .with_share_transfer(vault, other_holder, DEMO_ACCOUNT, B256::repeat_byte(0xa3), 12_150_006, usdc(100, 0))
            .with_deposit(vault, DEMO_ACCOUNT, B256::repeat_byte(0xa4), 12_311_540, usdc(5_000, 0), usdc(4_660, 412_009))
    }

    pub fn with_account(mut self, account: Address) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn with_balance(mut self, account: Address, wei: U256) -> Self {
        self.balances.insert(account, wei);
        self
    }

    pub fn with_vault(mut self, vault: Address, name: &str, decimals: u8, price_per_share: U256, token: Address) -> Self {
        self.vaults.insert(
            vault,
            VaultFixture {
                name: name.to_string(),
                decimals,
                price_per_share,
                token,
            },
        );
        self
    }

    pub fn with_price_per_share(mut self, vault: Address, price_per_share: U256) -> Self {
        if let Some(fixture) = self.vaults.get_mut(&vault) {
            fixture.price_per_share = price_per_share;
        }
        self
    }

    /// `depositor` sends `token_amount` of the vault's asset and receives
    /// `share_amount` freshly minted shares in one transaction.
    pub fn with_deposit(
        self,
        vault: Address,
        depositor: Address,
        tx_hash: B256,
        block_number: u64,
        token_amount: U256,
        share_amount: U256,
    ) -> Self {
        let token = self.vaults.get(&vault).map(|v| v.token).unwrap_or_default();
        let asset_log = transfer_log(token, depositor, vault, token_amount, block_number, 0, tx_hash);
        let share_log = transfer_log(vault, Address::ZERO, depositor, share_amount, block_number, 1, tx_hash);
        self.with_transaction(share_log.clone(), vec![asset_log, share_log])
    }

    /// Shares moved between holders; no asset transfer in the receipt.
    pub fn with_share_transfer(
        self,
        vault: Address,
        from: Address,
        to: Address,
        tx_hash: B256,
        block_number: u64,
        share_amount: U256,
    ) -> Self {
        let share_log = transfer_log(vault, from, to, share_amount, block_number, 0, tx_hash);
        self.with_transaction(share_log.clone(), vec![share_log])
    }

    /// Registers `event` as queryable and `logs` as its transaction's receipt.
    pub fn with_transaction(mut self, event: LogEntry, logs: Vec<LogEntry>) -> Self {
        let receipt = TransactionReceipt {
            tx_hash: event.tx_hash,
            block_number: event.block_number,
            success: true,
            logs,
        };
        self.receipts.insert(event.tx_hash, receipt);
        self.events.push(event);
        self.events.sort_by_key(|e| (e.block_number, e.log_index));
        self
    }

    pub fn with_receipt_delay(mut self, tx_hash: B256, delay: Duration) -> Self {
        self.receipt_delays.insert(tx_hash, delay);
        self
    }

    /// The receipt reads as pending for the first `polls` requests.
    pub fn with_pending_receipt(self, tx_hash: B256, polls: u32) -> Self {
        if let Ok(mut pending) = self.pending_polls.lock() {
            pending.insert(tx_hash, polls);
        }
        self
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn failing_receipts(mut self) -> Self {
        self.fail_receipts = true;
        self
    }

    pub fn queried_ranges(&self) -> Vec<(u64, u64)> {
        self.queried_ranges.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn ensure_online(&self) -> Result<(), GatewayError> {
        if self.offline {
            Err(GatewayError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn vault(&self, contract: Address) -> Result<&VaultFixture, GatewayError> {
        self.vaults.get(&contract).ok_or_else(|| GatewayError::Rpc {
            code: -32000,
            message: "execution reverted".to_string(),
        })
    }
}

pub fn transfer_log(
    emitter: Address,
    from: Address,
    to: Address,
    value: U256,
    block_number: u64,
    log_index: u64,
    tx_hash: B256,
) -> LogEntry {
    LogEntry {
        address: emitter,
        topics: vec![abi::transfer_topic(), from.into_word(), to.into_word()],
        data: abi::encode_uint(value),
        block_number,
        log_index,
        tx_hash,
    }
}

#[async_trait]
impl ChainGateway for StaticGateway {
    async fn chain_id(&self) -> Result<u64, GatewayError> {
        self.ensure_online()?;
        Ok(self.chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>, GatewayError> {
        self.ensure_online()?;
        Ok(self.accounts.clone())
    }

    async fn block_number(&self) -> Result<u64, GatewayError> {
        self.ensure_online()?;
        Ok(self.latest_block)
    }

    async fn get_balance(&self, address: Address) -> Result<U256, GatewayError> {
        self.ensure_online()?;
        Ok(self.balances.get(&address).copied().unwrap_or_default())
    }

    async fn call_read(&self, contract: Address, call: ReadCall) -> Result<ReadValue, GatewayError> {
        self.ensure_online()?;
        let vault = self.vault(contract)?;
        Ok(match call {
            ReadCall::Decimals => ReadValue::Uint(U256::from(vault.decimals)),
            ReadCall::PricePerShare => ReadValue::Uint(vault.price_per_share),
            ReadCall::Name => ReadValue::Text(vault.name.clone()),
            ReadCall::Token => ReadValue::Address(vault.token),
        })
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEntry>, GatewayError> {
        self.ensure_online()?;
        if let Ok(mut ranges) = self.queried_ranges.lock() {
            ranges.push((from_block, to_block));
        }
        Ok(self
            .events
            .iter()
            .filter(|e| (from_block..=to_block).contains(&e.block_number) && filter.matches(e))
            .cloned()
            .collect())
    }

    async fn get_transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>, GatewayError> {
        self.ensure_online()?;
        if self.fail_receipts {
            return Err(GatewayError::Rpc {
                code: -32000,
                message: "header not found".to_string(),
            });
        }
        if let Some(delay) = self.receipt_delays.get(&tx_hash) {
            tokio::time::sleep(*delay).await;
        }

        let still_pending = match self.pending_polls.lock() {
            Ok(mut pending) => match pending.get_mut(&tx_hash) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            },
            Err(_) => false,
        };
        if still_pending {
            debug!("⏳ receipt {} still pending", tx_hash);
            return Ok(None);
        }

        Ok(self.receipts.get(&tx_hash).cloned())
    }

    async fn get_status(&self) -> DataSourceStatus {
        if self.offline {
            DataSourceStatus::Disconnected
        } else {
            DataSourceStatus::Connected
        }
    }
}
