use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::abi;
use crate::error::GatewayError;
use crate::model::{LogEntry, TransactionReceipt};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum DataSourceStatus {
    Connected,
    #[default]
    Disconnected,
    Error(String),
}

/// Read-only view methods of the vault contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadCall {
    Decimals,
    PricePerShare,
    Name,
    Token,
}

impl ReadCall {
    pub fn signature(&self) -> &'static str {
        match self {
            ReadCall::Decimals => "decimals()",
            ReadCall::PricePerShare => "pricePerShare()",
            ReadCall::Name => "name()",
            ReadCall::Token => "token()",
        }
    }

    pub fn calldata(&self) -> Vec<u8> {
        abi::selector(self.signature()).to_vec()
    }

    pub fn decode(&self, data: &[u8]) -> Result<ReadValue, GatewayError> {
        match self {
            ReadCall::Decimals | ReadCall::PricePerShare => abi::decode_uint(data).map(ReadValue::Uint),
            ReadCall::Name => abi::decode_string(data).map(ReadValue::Text),
            ReadCall::Token => abi::decode_address(data).map(ReadValue::Address),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadValue {
    Uint(U256),
    Text(String),
    Address(Address),
}

impl ReadValue {
    pub fn into_uint(self) -> Result<U256, GatewayError> {
        match self {
            ReadValue::Uint(v) => Ok(v),
            other => Err(GatewayError::decode("uint256", format!("got {:?}", other))),
        }
    }

    pub fn into_text(self) -> Result<String, GatewayError> {
        match self {
            ReadValue::Text(v) => Ok(v),
            other => Err(GatewayError::decode("string", format!("got {:?}", other))),
        }
    }

    pub fn into_address(self) -> Result<Address, GatewayError> {
        match self {
            ReadValue::Address(v) => Ok(v),
            other => Err(GatewayError::decode("address", format!("got {:?}", other))),
        }
    }
}

/// Log filter over one emitting contract. `None` topics match anything.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFilter {
    pub contract: Address,
    pub topics: [Option<B256>; 3],
}

impl EventFilter {
    /// ERC20 `Transfer(_, to, _)` events emitted by `contract`.
    pub fn transfers_to(contract: Address, to: Address) -> Self {
        Self {
            contract,
            topics: [Some(abi::transfer_topic()), None, Some(to.into_word())],
        }
    }

    pub fn matches(&self, log: &LogEntry) -> bool {
        log.address == self.contract
            && self.topics.iter().enumerate().all(|(i, topic)| match topic {
                Some(expected) => log.topics.get(i) == Some(expected),
                None => true,
            })
    }
}

#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn chain_id(&self) -> Result<u64, GatewayError>;
    /// Accounts the provider exposes, i.e. the connected wallet.
    async fn accounts(&self) -> Result<Vec<Address>, GatewayError>;
    async fn block_number(&self) -> Result<u64, GatewayError>;
    async fn get_balance(&self, address: Address) -> Result<U256, GatewayError>;
    async fn call_read(&self, contract: Address, call: ReadCall) -> Result<ReadValue, GatewayError>;
    /// Logs matching `filter` in `[from_block, to_block]`, ascending.
    async fn query_events(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEntry>, GatewayError>;
    /// `None` while the transaction is not yet mined.
    async fn get_transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>, GatewayError>;
    async fn get_status(&self) -> DataSourceStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(address: Address, topics: Vec<B256>) -> LogEntry {
        LogEntry {
            address,
            topics,
            data: vec![],
            block_number: 1,
            log_index: 0,
            tx_hash: B256::ZERO,
        }
    }

    #[test]
    fn filter_matches_recipient_only() {
        let vault = Address::repeat_byte(0xaa);
        let me = Address::repeat_byte(0x01);
        let other = Address::repeat_byte(0x02);
        let filter = EventFilter::transfers_to(vault, me);

        let t = abi::transfer_topic();
        assert!(filter.matches(&log(vault, vec![t, other.into_word(), me.into_word()])));
        assert!(!filter.matches(&log(vault, vec![t, me.into_word(), other.into_word()])));
        assert!(!filter.matches(&log(other, vec![t, other.into_word(), me.into_word()])));
        assert!(!filter.matches(&log(vault, vec![t])));
    }

    #[test]
    fn read_value_type_mismatch_is_decode_error() {
        let err = ReadValue::Text("x".into()).into_uint().unwrap_err();
        assert!(matches!(err, GatewayError::Decode { what: "uint256", .. }));
    }
}
