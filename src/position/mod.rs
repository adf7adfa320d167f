use alloy_primitives::{Address, B256};
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::time::Duration;

use crate::api::abi;
use crate::api::pager::EventPager;
use crate::api::provider::{ChainGateway, EventFilter, ReadCall};
use crate::config::Config;
use crate::error::{GatewayError, PositionError};
use crate::model::{LogEntry, Position, PositionSummary, TransactionReceipt, TransferRecord, VaultInfo};

#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    pub start_block: u64,
    pub page_size: u64,
    pub max_concurrent_receipts: usize,
    pub receipt_poll: Duration,
    pub receipt_max_polls: u32,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            start_block: 0,
            page_size: 100_000,
            max_concurrent_receipts: 8,
            receipt_poll: Duration::from_millis(4_000),
            receipt_max_polls: 30,
        }
    }
}

impl From<&Config> for ReconstructOptions {
    fn from(config: &Config) -> Self {
        Self {
            start_block: config.start_block,
            page_size: config.log_page_size,
            max_concurrent_receipts: config.max_concurrent_receipts,
            receipt_poll: Duration::from_millis(config.receipt_poll_ms),
            receipt_max_polls: config.receipt_max_polls,
        }
    }
}

pub async fn fetch_vault_info<G: ChainGateway + ?Sized>(
    gateway: &G,
    vault_address: Address,
) -> Result<VaultInfo, PositionError> {
    info!("📊 Fetching vault metadata for {}", vault_address);

    let (decimals, share_price, name, token) = tokio::try_join!(
        gateway.call_read(vault_address, ReadCall::Decimals),
        gateway.call_read(vault_address, ReadCall::PricePerShare),
        gateway.call_read(vault_address, ReadCall::Name),
        gateway.call_read(vault_address, ReadCall::Token),
    )?;

    let decimals = u8::try_from(decimals.into_uint()?)
        .map_err(|_| GatewayError::decode("decimals", "does not fit in uint8"))?;

    let vault = VaultInfo::new(
        name.into_text()?,
        decimals,
        share_price.into_uint()?,
        token.into_address()?,
        vault_address,
    )?;

    info!("✅ Vault {} - decimals: {}, share price: {}", vault.name, vault.decimals, vault.share_price);
    Ok(vault)
}

/// Rebuild the deposit ledger of `watched` in `vault` and fold it into a summary.
pub async fn reconstruct_position<G: ChainGateway + ?Sized>(
    gateway: &G,
    watched: Address,
    vault: &VaultInfo,
    options: &ReconstructOptions,
) -> Result<Position, PositionError> {
    let latest_block = gateway.block_number().await?;
    let filter = EventFilter::transfers_to(vault.vault_address, watched);

    info!(
        "📊 Reconstructing position of {} in {} (blocks {}..={})",
        watched, vault.name, options.start_block, latest_block
    );

    let mut events = EventPager::new(filter, options.start_block, latest_block, options.page_size)
        .collect_all(gateway)
        .await?;

    let mut seen = HashSet::new();
    events.retain(|event| seen.insert(event.tx_hash));
    debug!("📊 {} share transfers into {}", events.len(), watched);

    let concurrency = options.max_concurrent_receipts.max(1);
    let confirmed: Vec<Result<(LogEntry, TransactionReceipt), GatewayError>> = stream::iter(events)
        .map(|event| async move {
            let receipt = wait_for_receipt(gateway, event.tx_hash, options).await?;
            Ok::<_, GatewayError>((event, receipt))
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut records = Vec::with_capacity(confirmed.len());
    let mut skipped = 0;
    for item in confirmed {
        let (event, receipt) = item?;
        match record_from_receipt(&receipt, event.log_index, vault) {
            Some(record) => records.push(record),
            None => {
                debug!("⏭️ {} is not a plain deposit, skipping", receipt.tx_hash);
                skipped += 1;
            }
        }
    }
    records.sort_by_key(|r| (r.block_number, r.log_index));

    let summary = PositionSummary::from_records(&records, vault)?;
    info!(
        "✅ Position rebuilt - {} deposits, {} skipped, invested {}, shares {}",
        records.len(),
        skipped,
        summary.total_invested,
        summary.total_shares
    );

    Ok(Position {
        records,
        summary,
        skipped,
        latest_block,
    })
}

/// Polls until the receipt exists. Receipts that never show up are a failure.
async fn wait_for_receipt<G: ChainGateway + ?Sized>(
    gateway: &G,
    tx_hash: B256,
    options: &ReconstructOptions,
) -> Result<TransactionReceipt, GatewayError> {
    let mut polls = 0;
    loop {
        if let Some(receipt) = gateway.get_transaction_receipt(tx_hash).await? {
            return Ok(receipt);
        }
        polls += 1;
        if polls >= options.receipt_max_polls {
            warn!("⚠️ Receipt {} still pending after {} polls", tx_hash, polls);
            return Err(GatewayError::Unconfirmed(tx_hash, polls));
        }
        tokio::time::sleep(options.receipt_poll).await;
    }
}

/// A deposit moves the asset into the vault and mints shares in the same
/// transaction. Anything else yields `None`.
pub fn record_from_receipt(receipt: &TransactionReceipt, log_index: u64, vault: &VaultInfo) -> Option<TransferRecord> {
    if !receipt.success {
        return None;
    }

    let topic = abi::transfer_topic();
    let transfer_from = |emitter: Address| {
        receipt
            .logs
            .iter()
            .find(|log| log.address == emitter && log.topics.first() == Some(&topic))
    };

    let asset_log = transfer_from(vault.token_address)?;
    let share_log = transfer_from(vault.vault_address)?;

    let token_amount = abi::decode_transfer_value(&asset_log.data).ok()?;
    let share_amount = abi::decode_transfer_value(&share_log.data).ok()?;

    TransferRecord::from_amounts(
        receipt.tx_hash,
        receipt.block_number,
        log_index,
        token_amount,
        share_amount,
        vault.mantissa,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fixture::{transfer_log, StaticGateway};
    use alloy_primitives::{I256, U256};

    const VAULT: Address = Address::new([0x22; 20]);
    const TOKEN: Address = Address::new([0x11; 20]);
    const ME: Address = Address::new([0x01; 20]);
    const SOMEONE: Address = Address::new([0x02; 20]);

    fn tx(n: u8) -> B256 {
        B256::repeat_byte(n)
    }

    fn quick() -> ReconstructOptions {
        ReconstructOptions {
            page_size: 1_000,
            receipt_poll: Duration::from_millis(1),
            receipt_max_polls: 3,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn two_deposit_scenario() {
        let gw = StaticGateway::new(1, 5_000)
            .with_vault(VAULT, "Test Vault", 0, U256::from(2u64), TOKEN)
            .with_deposit(VAULT, ME, tx(1), 100, U256::from(500u64), U256::from(500u64))
            .with_deposit(VAULT, ME, tx(2), 200, U256::from(300u64), U256::from(290u64));

        let vault = fetch_vault_info(&gw, VAULT).await.unwrap();
        assert_eq!(vault.mantissa, U256::from(1u64));
        assert_eq!(vault.token_address, TOKEN);

        let position = reconstruct_position(&gw, ME, &vault, &quick()).await.unwrap();
        assert_eq!(position.records.len(), 2);
        assert_eq!(position.skipped, 0);
        assert_eq!(position.latest_block, 5_000);

        let s = &position.summary;
        assert_eq!(s.total_invested, U256::from(800u64));
        assert_eq!(s.total_shares, U256::from(790u64));
        assert_eq!(s.current_value, U256::from(1580u64));
        assert_eq!(s.net_return, I256::try_from(780i64).unwrap());

        assert_eq!(position.records[1].price, U256::from(1u64));
    }

    #[tokio::test]
    async fn ledger_is_in_block_order_despite_completion_order() {
        let gw = StaticGateway::new(1, 1_000)
            .with_vault(VAULT, "v", 6, U256::from(1_000_000u64), TOKEN)
            .with_deposit(VAULT, ME, tx(1), 10, U256::from(1u64), U256::from(1u64))
            .with_deposit(VAULT, ME, tx(2), 20, U256::from(2u64), U256::from(2u64))
            .with_deposit(VAULT, ME, tx(3), 30, U256::from(3u64), U256::from(3u64))
            .with_receipt_delay(tx(1), Duration::from_millis(60))
            .with_receipt_delay(tx(2), Duration::from_millis(30));

        let vault = fetch_vault_info(&gw, VAULT).await.unwrap();
        let position = reconstruct_position(&gw, ME, &vault, &quick()).await.unwrap();

        let blocks: Vec<u64> = position.records.iter().map(|r| r.block_number).collect();
        assert_eq!(blocks, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn non_conforming_transactions_are_skipped() {
        let gw = StaticGateway::new(1, 1_000)
            .with_vault(VAULT, "v", 6, U256::from(1_000_000u64), TOKEN)
            .with_deposit(VAULT, ME, tx(1), 10, U256::from(1_000_000u64), U256::from(950_000u64))
            .with_share_transfer(VAULT, SOMEONE, ME, tx(2), 20, U256::from(7u64));

        let vault = fetch_vault_info(&gw, VAULT).await.unwrap();
        let position = reconstruct_position(&gw, ME, &vault, &quick()).await.unwrap();

        assert_eq!(position.records.len(), 1);
        assert_eq!(position.skipped, 1);
        assert_eq!(position.records[0].price, U256::from(1_052_631u64));
        assert_eq!(position.summary.total_shares, U256::from(950_000u64));
    }

    #[test]
    fn receipt_without_asset_log_yields_nothing() {
        let vault = VaultInfo::new("v".into(), 0, U256::from(1u64), TOKEN, VAULT).unwrap();
        let share = transfer_log(VAULT, Address::ZERO, ME, U256::from(5u64), 1, 0, tx(9));
        let asset = transfer_log(TOKEN, ME, VAULT, U256::from(5u64), 1, 1, tx(9));
        let receipt = |logs| TransactionReceipt {
            tx_hash: tx(9),
            block_number: 1,
            success: true,
            logs,
        };

        assert!(record_from_receipt(&receipt(vec![share.clone()]), 0, &vault).is_none());
        assert!(record_from_receipt(&receipt(vec![asset.clone()]), 0, &vault).is_none());
        assert!(record_from_receipt(&receipt(vec![]), 0, &vault).is_none());

        let record = record_from_receipt(&receipt(vec![share, asset]), 0, &vault).unwrap();
        assert_eq!(record.token_amount, U256::from(5u64));
        assert_eq!(record.share_amount, U256::from(5u64));
    }

    #[test]
    fn non_transfer_logs_from_the_asset_are_ignored() {
        let vault = VaultInfo::new("v".into(), 0, U256::from(1u64), TOKEN, VAULT).unwrap();
        let mut approval = transfer_log(TOKEN, ME, VAULT, U256::from(5u64), 1, 0, tx(9));
        approval.topics[0] = B256::repeat_byte(0x8c);
        let share = transfer_log(VAULT, Address::ZERO, ME, U256::from(5u64), 1, 1, tx(9));

        let receipt = TransactionReceipt {
            tx_hash: tx(9),
            block_number: 1,
            success: true,
            logs: vec![approval, share],
        };
        assert!(record_from_receipt(&receipt, 1, &vault).is_none());
    }

    #[tokio::test]
    async fn duplicate_events_in_one_transaction_count_once() {
        let asset = transfer_log(TOKEN, ME, VAULT, U256::from(4u64), 10, 0, tx(1));
        let minted = transfer_log(VAULT, Address::ZERO, ME, U256::from(4u64), 10, 1, tx(1));
        let moved = transfer_log(VAULT, SOMEONE, ME, U256::from(6u64), 10, 2, tx(1));
        let logs = vec![asset, minted.clone(), moved.clone()];

        let gw = StaticGateway::new(1, 100)
            .with_vault(VAULT, "v", 0, U256::from(1u64), TOKEN)
            .with_transaction(minted, logs.clone())
            .with_transaction(moved, logs);

        let vault = fetch_vault_info(&gw, VAULT).await.unwrap();
        let position = reconstruct_position(&gw, ME, &vault, &quick()).await.unwrap();
        assert_eq!(position.records.len(), 1);
        assert_eq!(position.records[0].share_amount, U256::from(4u64));
    }

    #[tokio::test]
    async fn waits_for_pending_receipts() {
        let gw = StaticGateway::new(1, 100)
            .with_vault(VAULT, "v", 0, U256::from(1u64), TOKEN)
            .with_deposit(VAULT, ME, tx(1), 10, U256::from(5u64), U256::from(5u64))
            .with_pending_receipt(tx(1), 2);

        let vault = fetch_vault_info(&gw, VAULT).await.unwrap();
        let position = reconstruct_position(&gw, ME, &vault, &quick()).await.unwrap();
        assert_eq!(position.records.len(), 1);
    }

    #[tokio::test]
    async fn receipt_that_never_confirms_fails() {
        let gw = StaticGateway::new(1, 100)
            .with_vault(VAULT, "v", 0, U256::from(1u64), TOKEN)
            .with_deposit(VAULT, ME, tx(1), 10, U256::from(5u64), U256::from(5u64))
            .with_pending_receipt(tx(1), 10);

        let vault = fetch_vault_info(&gw, VAULT).await.unwrap();
        let err = reconstruct_position(&gw, ME, &vault, &quick()).await.unwrap_err();
        assert!(matches!(err, PositionError::Gateway(GatewayError::Unconfirmed(_, 3))));
    }

    #[tokio::test]
    async fn receipt_failure_is_a_query_failure() {
        let gw = StaticGateway::new(1, 100)
            .with_vault(VAULT, "v", 0, U256::from(1u64), TOKEN)
            .with_deposit(VAULT, ME, tx(1), 10, U256::from(5u64), U256::from(5u64))
            .failing_receipts();

        let vault = fetch_vault_info(&gw, VAULT).await.unwrap();
        let err = reconstruct_position(&gw, ME, &vault, &quick()).await.unwrap_err();
        assert!(matches!(err, PositionError::Gateway(GatewayError::Rpc { .. })));
    }

    #[tokio::test]
    async fn other_accounts_deposits_are_not_included() {
        let gw = StaticGateway::new(1, 100)
            .with_vault(VAULT, "v", 0, U256::from(1u64), TOKEN)
            .with_deposit(VAULT, SOMEONE, tx(1), 10, U256::from(5u64), U256::from(5u64));

        let vault = fetch_vault_info(&gw, VAULT).await.unwrap();
        let position = reconstruct_position(&gw, ME, &vault, &quick()).await.unwrap();
        assert!(position.records.is_empty());
        assert!(position.summary.total_invested.is_zero());
    }

    #[tokio::test]
    async fn unknown_vault_fails_metadata_fetch() {
        let gw = StaticGateway::new(1, 100);
        assert!(fetch_vault_info(&gw, VAULT).await.is_err());
    }
}
