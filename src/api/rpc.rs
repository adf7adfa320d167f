use alloy_primitives::{hex, Address, B256, U256};
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::api::provider::{ChainGateway, DataSourceStatus, EventFilter, ReadCall, ReadValue};
use crate::config::Config;
use crate::error::GatewayError;
use crate::model::{LogEntry, TransactionReceipt};

/// Gas bound for read-only `eth_call`s.
const READ_GAS_LIMIT: u64 = 60_000;

pub struct JsonRpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("📡 {} #{} -> {}", method, id, self.url);

        let response = self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("❌ HTTP request failed: {}", e);
                GatewayError::Transport(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("❌ {} failed with status {}: {}", method, status, body);
            return Err(GatewayError::Rpc {
                code: i64::from(status.as_u16()),
                message: body,
            });
        }

        let body: Value = response.json().await?;
        take_result(body)
    }
}

fn take_result(mut body: Value) -> Result<Value, GatewayError> {
    if let Some(err) = body.get("error") {
        return Err(GatewayError::Rpc {
            code: err["code"].as_i64().unwrap_or(0),
            message: err["message"].as_str().unwrap_or("unknown").to_string(),
        });
    }
    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(GatewayError::decode("rpc response", "missing result")),
    }
}

/// `ChainGateway` over an Ethereum JSON-RPC endpoint.
pub struct EthereumProvider {
    rpc: JsonRpcClient,
}

impl EthereumProvider {
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        info!("🔌 Using JSON-RPC endpoint {}", config.rpc_url);
        let rpc = JsonRpcClient::new(
            config.rpc_url.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )?;
        Ok(Self { rpc })
    }
}

#[async_trait]
impl ChainGateway for EthereumProvider {
    async fn chain_id(&self) -> Result<u64, GatewayError> {
        let value = self.rpc.request("eth_chainId", json!([])).await?;
        parse_u64(&value, "chain id")
    }

    async fn accounts(&self) -> Result<Vec<Address>, GatewayError> {
        let value = self.rpc.request("eth_accounts", json!([])).await?;
        value
            .as_array()
            .map(|list| list.iter().map(|v| parse_address(v, "account")).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn block_number(&self) -> Result<u64, GatewayError> {
        let value = self.rpc.request("eth_blockNumber", json!([])).await?;
        parse_u64(&value, "block number")
    }

    async fn get_balance(&self, address: Address) -> Result<U256, GatewayError> {
        let value = self
            .rpc
            .request("eth_getBalance", json!([hex::encode_prefixed(address), "latest"]))
            .await?;
        parse_u256(&value, "balance")
    }

    async fn call_read(&self, contract: Address, call: ReadCall) -> Result<ReadValue, GatewayError> {
        debug!("📊 eth_call {} on {}", call.signature(), contract);
        let tx = json!({
            "to": hex::encode_prefixed(contract),
            "data": hex::encode_prefixed(call.calldata()),
            "gas": quantity(READ_GAS_LIMIT),
        });
        let value = self.rpc.request("eth_call", json!([tx, "latest"])).await?;
        let data = parse_bytes(&value, call.signature())?;
        call.decode(&data)
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEntry>, GatewayError> {
        let topics: Vec<Value> = filter
            .topics
            .iter()
            .map(|t| t.map(|t| Value::String(hex::encode_prefixed(t))).unwrap_or(Value::Null))
            .collect();
        let params = json!([{
            "address": hex::encode_prefixed(filter.contract),
            "fromBlock": quantity(from_block),
            "toBlock": quantity(to_block),
            "topics": topics,
        }]);

        let value = self.rpc.request("eth_getLogs", params).await?;
        let logs = value
            .as_array()
            .ok_or_else(|| GatewayError::decode("logs", "expected array"))?
            .iter()
            .map(parse_log)
            .collect::<Result<Vec<_>, _>>()?;

        debug!("📊 {} logs in blocks {}..={}", logs.len(), from_block, to_block);
        Ok(logs)
    }

    async fn get_transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>, GatewayError> {
        let value = self
            .rpc
            .request("eth_getTransactionReceipt", json!([hex::encode_prefixed(tx_hash)]))
            .await?;
        parse_receipt(&value)
    }

    async fn get_status(&self) -> DataSourceStatus {
        match self.block_number().await {
            Ok(block) => {
                debug!("✅ RPC status: Connected at block {}", block);
                DataSourceStatus::Connected
            }
            Err(e) if matches!(e, GatewayError::Transport(_)) => {
                debug!("❌ RPC status: Disconnected - {}", e);
                DataSourceStatus::Disconnected
            }
            Err(e) => DataSourceStatus::Error(e.to_string()),
        }
    }
}

fn quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

fn as_hex_str<'a>(value: &'a Value, what: &'static str) -> Result<&'a str, GatewayError> {
    value
        .as_str()
        .ok_or_else(|| GatewayError::decode(what, format!("expected hex string, got {}", value)))
}

pub(crate) fn parse_u256(value: &Value, what: &'static str) -> Result<U256, GatewayError> {
    let s = as_hex_str(value, what)?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|e| GatewayError::decode(what, e.to_string()))
}

pub(crate) fn parse_u64(value: &Value, what: &'static str) -> Result<u64, GatewayError> {
    let wide = parse_u256(value, what)?;
    u64::try_from(wide).map_err(|_| GatewayError::decode(what, "exceeds u64"))
}

pub(crate) fn parse_b256(value: &Value, what: &'static str) -> Result<B256, GatewayError> {
    B256::from_str(as_hex_str(value, what)?).map_err(|e| GatewayError::decode(what, e.to_string()))
}

pub(crate) fn parse_address(value: &Value, what: &'static str) -> Result<Address, GatewayError> {
    Address::from_str(as_hex_str(value, what)?).map_err(|e| GatewayError::decode(what, e.to_string()))
}

pub(crate) fn parse_bytes(value: &Value, what: &'static str) -> Result<Vec<u8>, GatewayError> {
    let s = as_hex_str(value, what)?;
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| GatewayError::decode(what, e.to_string()))
}

pub(crate) fn parse_log(value: &Value) -> Result<LogEntry, GatewayError> {
    let topics = value["topics"]
        .as_array()
        .ok_or_else(|| GatewayError::decode("log topics", "expected array"))?
        .iter()
        .map(|t| parse_b256(t, "log topic"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LogEntry {
        address: parse_address(&value["address"], "log address")?,
        topics,
        data: parse_bytes(&value["data"], "log data")?,
        block_number: parse_u64(&value["blockNumber"], "log block")?,
        log_index: parse_u64(&value["logIndex"], "log index")?,
        tx_hash: parse_b256(&value["transactionHash"], "log tx hash")?,
    })
}

pub(crate) fn parse_receipt(value: &Value) -> Result<Option<TransactionReceipt>, GatewayError> {
    if value.is_null() {
        return Ok(None);
    }
    // pre-Byzantium receipts carry a state root instead of a status
    let success = match value.get("status") {
        Some(status) if !status.is_null() => parse_u64(status, "receipt status")? == 1,
        _ => true,
    };
    let logs = value["logs"]
        .as_array()
        .ok_or_else(|| GatewayError::decode("receipt logs", "expected array"))?
        .iter()
        .map(parse_log)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(TransactionReceipt {
        tx_hash: parse_b256(&value["transactionHash"], "receipt tx hash")?,
        block_number: parse_u64(&value["blockNumber"], "receipt block")?,
        success,
        logs,
    }))
}
