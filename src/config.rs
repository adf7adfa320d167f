use anyhow::Result;
use figment::{Figment, providers::{Format, Toml, Env, Serialized}};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::model::address::parse_address;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub operating_mode: OperatingMode,
    pub rpc_url: String,
    pub vault_address: String,
    pub watched_address: Option<String>,
    pub supported_chain_ids: Vec<u64>,
    pub explorer_url: String,
    pub start_block: u64,
    pub log_page_size: u64,
    pub max_concurrent_receipts: usize,
    pub receipt_poll_ms: u64,
    pub receipt_max_polls: u32,
    pub request_timeout_ms: u64,
    pub update_interval_ms: u64,
    pub ui_settings: UiSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperatingMode {
    Live,
    Demo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSettings {
    pub refresh_rate_ms: u64,
    pub show_debug_info: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operating_mode: OperatingMode::Live,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            vault_address: "0x5f18C75AbDAe578b483E5F43f12a39cF75b973a9".to_string(),
            watched_address: None,
            supported_chain_ids: vec![
                1,  // Mainnet
                3,  // Ropsten
                4,  // Rinkeby
                5,  // Goerli
                42, // Kovan
            ],
            explorer_url: "https://etherscan.io".to_string(),
            start_block: 0,
            log_page_size: 100_000,
            max_concurrent_receipts: 8,
            receipt_poll_ms: 4_000,
            receipt_max_polls: 30,
            request_timeout_ms: 10_000,
            update_interval_ms: 12_000,
            ui_settings: UiSettings::default(),
        }
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            refresh_rate_ms: 100,
            show_debug_info: false,
        }
    }
}

impl Config {
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }

    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_url.trim_end_matches('/'), address)
    }
}

pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let config_file = config_path.unwrap_or("config.toml");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_file))
        .merge(Env::prefixed("YSTATS_"))
        .extract()?;

    validate_config(&config)?;

    Ok(config)
}

pub fn generate_sample_config() -> Result<()> {
    let config = Config::default();
    let toml_content = toml::to_string_pretty(&config)?;

    fs::write("config.toml", toml_content)?;

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<()> {
    url::Url::parse(&config.rpc_url)
        .map_err(|e| anyhow::anyhow!("rpc_url '{}' is not a valid URL: {}", config.rpc_url, e))?;

    parse_address(&config.vault_address)
        .map_err(|e| anyhow::anyhow!("vault_address: {}", e))?;

    if let Some(watched) = &config.watched_address {
        parse_address(watched).map_err(|e| anyhow::anyhow!("watched_address: {}", e))?;
    }

    if config.supported_chain_ids.is_empty() {
        return Err(anyhow::anyhow!("supported_chain_ids must list at least one network"));
    }

    if config.log_page_size == 0 {
        return Err(anyhow::anyhow!("log_page_size must be at least 1 block"));
    }

    if config.max_concurrent_receipts == 0 {
        return Err(anyhow::anyhow!("max_concurrent_receipts must be at least 1"));
    }

    if config.receipt_max_polls == 0 {
        return Err(anyhow::anyhow!("receipt_max_polls must be at least 1"));
    }

    if config.update_interval_ms < 1_000 {
        return Err(anyhow::anyhow!("update_interval_ms must be at least 1000ms"));
    }

    if config.ui_settings.refresh_rate_ms < 50 {
        return Err(anyhow::anyhow!("UI refresh_rate_ms must be at least 50ms"));
    }

    Ok(())
}

pub fn save_config_to_file(config: &Config, path: &str) -> Result<()> {
    let toml_content = toml::to_string_pretty(config)?;
    std::fs::write(path, toml_content)?;
    Ok(())
}
