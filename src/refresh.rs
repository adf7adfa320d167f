use alloy_primitives::Address;
use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::alert;
use crate::api::provider::{ChainGateway, DataSourceStatus};
use crate::config::Config;
use crate::error::GatewayError;
use crate::model::address::parse_address;
use crate::model::{Alert, FetchState};
use crate::position::{fetch_vault_info, reconstruct_position, ReconstructOptions};
use crate::session::{FetchTicket, Session};

const MAX_ALERTS: usize = 200;

/// What a fetch cycle needs to know besides the session.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub vault_address: Address,
    pub supported_chain_ids: Vec<u64>,
    pub options: ReconstructOptions,
}

impl CycleContext {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            vault_address: parse_address(&config.vault_address)?,
            supported_chain_ids: config.supported_chain_ids.clone(),
            options: ReconstructOptions::from(config),
        })
    }
}

/// One fetch cycle: connection check, then balance and vault/position
/// fetched side by side, each written to its own slot as it lands.
pub async fn run_cycle<G: ChainGateway + ?Sized>(gateway: &G, session: &RwLock<Session>, ctx: &CycleContext) {
    let status = gateway.get_status().await;
    if status != DataSourceStatus::Connected {
        warn!("⚠️ Chain provider not available ({:?}), skipping fetch", status);
        session.write().await.status = status;
        return;
    }

    let chain_id = match gateway.chain_id().await {
        Ok(id) => id,
        Err(e) => {
            error!("❌ Failed to read chain id: {}", e);
            session.write().await.status = DataSourceStatus::Error(e.to_string());
            return;
        }
    };

    {
        let mut guard = session.write().await;
        guard.chain_id = Some(chain_id);
        if !ctx.supported_chain_ids.contains(&chain_id) {
            warn!("⚠️ Chain {} is not supported", chain_id);
            guard.status = DataSourceStatus::Error(GatewayError::UnsupportedChain(chain_id).to_string());
            return;
        }
        guard.status = DataSourceStatus::Connected;
    }

    if session.read().await.watched().is_none() {
        match gateway.accounts().await {
            Ok(accounts) => {
                if let Some(account) = accounts.first() {
                    session.write().await.connect(*account);
                } else {
                    debug!("🔗 Provider exposes no accounts");
                }
            }
            Err(e) => warn!("⚠️ Failed to read provider accounts: {}", e),
        }
    }

    let ticket = match session.write().await.begin_cycle() {
        Some(ticket) => ticket,
        None => {
            debug!("👀 No watched address yet");
            return;
        }
    };

    tokio::join!(
        refresh_balance(gateway, session, &ticket),
        refresh_vault_and_position(gateway, session, ctx, &ticket),
    );
}

async fn refresh_balance<G: ChainGateway + ?Sized>(gateway: &G, session: &RwLock<Session>, ticket: &FetchTicket) {
    let state = match gateway.get_balance(ticket.address).await {
        Ok(balance) => FetchState::Ready(balance),
        Err(e) => {
            error!("❌ Failed to get balance of {}: {}", ticket.address, e);
            FetchState::Failed(e.to_string())
        }
    };
    session.write().await.apply_balance(ticket, state);
}

async fn refresh_vault_and_position<G: ChainGateway + ?Sized>(
    gateway: &G,
    session: &RwLock<Session>,
    ctx: &CycleContext,
    ticket: &FetchTicket,
) {
    let vault = match fetch_vault_info(gateway, ctx.vault_address).await {
        Ok(vault) => vault,
        Err(e) => {
            error!("❌ Failed to get vault info: {}", e);
            let mut guard = session.write().await;
            guard.apply_vault(ticket, FetchState::Failed(e.to_string()));
            guard.apply_position(ticket, FetchState::Failed("vault metadata unavailable".to_string()));
            return;
        }
    };

    if !session.write().await.apply_vault(ticket, FetchState::Ready(vault.clone())) {
        return;
    }

    let state = match reconstruct_position(gateway, ticket.address, &vault, &ctx.options).await {
        Ok(position) if position.records.is_empty() && position.skipped == 0 => FetchState::Empty,
        Ok(position) => FetchState::Ready(position),
        Err(e) => {
            error!("❌ Failed to reconstruct position: {}", e);
            FetchState::Failed(e.to_string())
        }
    };
    session.write().await.apply_position(ticket, state);
}

/// Runs a cycle every `update_interval_ms` and whenever a refresh is requested.
///
/// At most one cycle is in flight. A timer tick is skipped while the running
/// cycle still serves the current generation; a refresh request or an address
/// change aborts it and starts over.
pub async fn refresh_loop<G: ChainGateway + 'static>(
    gateway: Arc<G>,
    session: Arc<RwLock<Session>>,
    alerts: Arc<RwLock<Vec<Alert>>>,
    config: Config,
    mut requests: mpsc::Receiver<()>,
) {
    let ctx = match CycleContext::from_config(&config) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("❌ Invalid vault configuration: {}", e);
            return;
        }
    };

    let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(config.update_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycle_counter: u64 = 0;
    let mut running: Option<(u64, JoinHandle<()>)> = None;

    info!("📡 Starting refresh loop (interval: {}ms)", config.update_interval_ms);

    loop {
        let requested = tokio::select! {
            _ = interval.tick() => false,
            request = requests.recv() => {
                if request.is_none() {
                    info!("📡 Refresh channel closed, stopping");
                    break;
                }
                debug!("🔄 Refresh requested");
                true
            }
        };

        let generation = session.read().await.generation();
        if let Some((started_for, handle)) = &running {
            if !handle.is_finished() {
                if !requested && *started_for == generation {
                    debug!("⏭️ Cycle #{} still running, skipping tick", cycle_counter);
                    continue;
                }
                debug!("🛑 Aborting cycle #{}", cycle_counter);
                handle.abort();
            }
        }
        cycle_counter += 1;

        let gateway = gateway.clone();
        let session = session.clone();
        let alerts = alerts.clone();
        let ctx = ctx.clone();
        let cycle = cycle_counter;

        let handle = tokio::spawn(async move {
            debug!("📊 Starting fetch cycle #{}", cycle);
            let before = session.read().await.clone();
            run_cycle(&*gateway, &session, &ctx).await;
            let after = session.read().await.clone();

            let new_alerts = alert::check_alerts(&before, &after);
            if !new_alerts.is_empty() {
                info!("🔔 Generated {} new alerts", new_alerts.len());
                let mut guard = alerts.write().await;
                guard.extend(new_alerts);
                if guard.len() > MAX_ALERTS {
                    let excess = guard.len() - MAX_ALERTS;
                    guard.drain(0..excess);
                }
            }
            debug!("✅ Fetch cycle #{} done", cycle);
        });
        running = Some((generation, handle));
    }

    if let Some((_, handle)) = running {
        handle.abort();
    }
}
