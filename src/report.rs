use alloy_primitives::{hex, U256};
use serde::Serialize;
use std::fmt;

use crate::api::provider::DataSourceStatus;
use crate::config::Config;
use crate::model::units::{commify, format_ether, format_signed_units, format_units, truncate};
use crate::model::{FetchState, Position, VaultInfo};
use crate::session::Session;

/// Plain snapshot of a session for `--report --json`.
#[derive(Debug, Serialize)]
pub struct Report {
    pub address: Option<String>,
    pub chain_id: Option<u64>,
    pub status: DataSourceStatus,
    pub balance_wei: Option<U256>,
    pub vault: Option<VaultInfo>,
    pub position: Option<Position>,
    pub errors: Vec<String>,
}

impl From<&Session> for Report {
    fn from(session: &Session) -> Self {
        let mut errors = Vec::new();
        collect_error(&mut errors, "balance", &session.balance);
        collect_error(&mut errors, "vault", &session.vault);
        collect_error(&mut errors, "position", &session.position);

        Self {
            address: session.watched().map(|a| a.to_checksum(None)),
            chain_id: session.chain_id,
            status: session.status.clone(),
            balance_wei: session.balance.ready().copied(),
            vault: session.vault.ready().cloned(),
            position: session.position.ready().cloned(),
            errors,
        }
    }
}

fn collect_error<T>(errors: &mut Vec<String>, what: &str, slot: &FetchState<T>) {
    if let FetchState::Failed(reason) = slot {
        errors.push(format!("{}: {}", what, reason));
    }
}

fn slot_text<T>(slot: &FetchState<T>, render: impl Fn(&T) -> String) -> String {
    match slot {
        FetchState::Ready(value) => render(value),
        FetchState::Failed(reason) => format!("failed ({})", reason),
        other => other.label().to_string(),
    }
}

pub fn render_text(session: &Session, config: &Config) -> String {
    TextReport { session, config }.to_string()
}

/// Human readable report, one labelled value per line then the deposit table.
struct TextReport<'a> {
    session: &'a Session,
    config: &'a Config,
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.session;

        let address = session
            .watched()
            .map(|a| a.to_checksum(None))
            .unwrap_or_else(|| "none".to_string());
        writeln!(out, "Address        {}", address)?;
        writeln!(
            out,
            "Chain ID       {}",
            session.chain_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(
            out,
            "Balance        {}",
            slot_text(&session.balance, |wei| format!("{} ETH", commify(&format_ether(*wei))))
        )?;

        let vault = match &session.vault {
            FetchState::Ready(vault) => vault,
            other => return writeln!(out, "Vault          {}", slot_text(other, |_: &VaultInfo| String::new())),
        };
        let dollars = |v: U256| format!("${}", commify(&format_units(v, vault.decimals)));

        writeln!(out)?;
        writeln!(
            out,
            "{}  {}",
            vault.name,
            self.config.address_url(&vault.vault_address.to_checksum(None))
        )?;
        writeln!(out, "Share price    {}", dollars(vault.share_price))?;

        let position = match &session.position {
            FetchState::Ready(position) => position,
            FetchState::Empty => return writeln!(out, "No deposits found"),
            other => return writeln!(out, "Position       {}", slot_text(other, |_: &Position| String::new())),
        };

        let s = &position.summary;
        writeln!(out, "Total invested {}", dollars(s.total_invested))?;
        writeln!(out, "Total shares   {}", commify(&format_units(s.total_shares, vault.decimals)))?;
        writeln!(out, "Current value  {}", dollars(s.current_value))?;
        write!(out, "Net return     ${}", commify(&format_signed_units(s.net_return, vault.decimals)))?;
        if let Some(pct) = s.return_pct() {
            write!(out, " ({}%)", pct)?;
        }
        writeln!(out)?;

        writeln!(out)?;
        writeln!(out, "{:<24} {:>10} {:>18} {:>18} {:>12}", "Tx", "Block", "Amount", "Shares", "Price")?;
        for r in &position.records {
            writeln!(
                out,
                "{:<24} {:>10} {:>18} {:>18} {:>12}",
                truncate(&hex::encode_prefixed(r.tx_hash), 20, 0, 20),
                r.block_number,
                dollars(r.token_amount),
                format_units(r.share_amount, vault.decimals),
                dollars(r.price),
            )?;
        }
        if position.skipped > 0 {
            writeln!(out, "({} share transfer(s) without a matching deposit left out)", position.skipped)?;
        }
        Ok(())
    }
}
