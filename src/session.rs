use alloy_primitives::{Address, U256};
use log::{debug, info};

use crate::api::provider::DataSourceStatus;
use crate::error::AddressError;
use crate::model::address::parse_address;
use crate::model::{FetchState, Position, VaultInfo};

/// Identifies the session context a fetch cycle was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub address: Address,
}

/// The watched account and everything derived from it.
///
/// Every change of watched address bumps `generation` and resets the output
/// slots; results carrying an older generation are dropped on write.
#[derive(Debug, Clone, Default)]
pub struct Session {
    input: String,
    watched: Option<Address>,
    generation: u64,
    pub chain_id: Option<u64>,
    pub status: DataSourceStatus,
    pub balance: FetchState<U256>,
    pub vault: FetchState<VaultInfo>,
    pub position: FetchState<Position>,
}

impl Session {
    pub fn new(watched: Option<Address>) -> Self {
        let mut session = Self::default();
        if let Some(address) = watched {
            session.watch(address);
        }
        session
    }

    /// Text shown in the address field; may be an invalid address.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn watched(&self) -> Option<Address> {
        self.watched
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Adopt the wallet's account unless an address is already being watched.
    pub fn connect(&mut self, account: Address) -> bool {
        if self.watched.is_some() {
            return false;
        }
        info!("🔗 Wallet connected as {}", account);
        self.watch(account)
    }

    /// Update the address field. Returns `Ok(true)` when the watched address changed.
    pub fn set_input(&mut self, text: impl Into<String>) -> Result<bool, AddressError> {
        self.input = text.into();
        let address = parse_address(&self.input)?;
        Ok(self.watch(address))
    }

    fn watch(&mut self, address: Address) -> bool {
        self.input = address.to_checksum(None);
        if self.watched == Some(address) {
            return false;
        }

        self.watched = Some(address);
        self.generation += 1;
        self.balance = FetchState::Idle;
        self.vault = FetchState::Idle;
        self.position = FetchState::Idle;
        debug!("👀 Watching {} (generation {})", address, self.generation);
        true
    }

    pub fn begin_cycle(&mut self) -> Option<FetchTicket> {
        let address = self.watched?;
        for_idle(&mut self.balance);
        for_idle(&mut self.vault);
        for_idle(&mut self.position);
        Some(FetchTicket {
            generation: self.generation,
            address,
        })
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation && Some(ticket.address) == self.watched
    }

    pub fn apply_balance(&mut self, ticket: &FetchTicket, state: FetchState<U256>) -> bool {
        let current = self.is_current(ticket);
        store(current, ticket, "balance", &mut self.balance, state)
    }

    pub fn apply_vault(&mut self, ticket: &FetchTicket, state: FetchState<VaultInfo>) -> bool {
        let current = self.is_current(ticket);
        store(current, ticket, "vault", &mut self.vault, state)
    }

    pub fn apply_position(&mut self, ticket: &FetchTicket, state: FetchState<Position>) -> bool {
        let current = self.is_current(ticket);
        store(current, ticket, "position", &mut self.position, state)
    }
}

fn for_idle<T>(slot: &mut FetchState<T>) {
    if matches!(slot, FetchState::Idle) {
        *slot = FetchState::Loading;
    }
}

fn store<T>(current: bool, ticket: &FetchTicket, slot_name: &str, slot: &mut FetchState<T>, state: FetchState<T>) -> bool {
    if !current {
        debug!("🗑️ Dropping stale {} result from generation {}", slot_name, ticket.generation);
        return false;
    }
    *slot = state;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "0x5f18c75abdae578b483e5f43f12a39cf75b973a9";
    const B: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    #[test]
    fn invalid_input_keeps_text_but_not_address() {
        let mut session = Session::default();
        session.set_input(A).unwrap();
        let generation = session.generation();

        assert!(session.set_input("0x5f18").is_err());
        assert_eq!(session.input(), "0x5f18");
        assert_eq!(session.watched(), Some(parse_address(A).unwrap()));
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn changing_address_invalidates_slots() {
        let mut session = Session::default();
        assert!(session.set_input(A).unwrap());
        let ticket = session.begin_cycle().unwrap();
        assert!(session.apply_balance(&ticket, FetchState::Ready(U256::from(7u64))));

        assert!(session.set_input(B).unwrap());
        assert_eq!(session.balance, FetchState::Idle);
        assert_eq!(session.generation(), ticket.generation + 1);
    }

    #[test]
    fn same_address_is_not_a_change() {
        let mut session = Session::default();
        assert!(session.set_input(A).unwrap());
        // checksummed spelling of the same account
        assert!(!session.set_input("0x5f18C75AbDAe578b483E5F43f12a39cF75b973a9").unwrap());
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut session = Session::default();
        session.set_input(A).unwrap();
        let old = session.begin_cycle().unwrap();

        session.set_input(B).unwrap();
        let new = session.begin_cycle().unwrap();

        assert!(session.apply_balance(&new, FetchState::Ready(U256::from(2u64))));
        assert!(!session.apply_balance(&old, FetchState::Ready(U256::from(1u64))));
        assert_eq!(session.balance, FetchState::Ready(U256::from(2u64)));
    }

    #[test]
    fn connected_wallet_fills_empty_address_only() {
        let a = parse_address(A).unwrap();
        let b = parse_address(B).unwrap();

        let mut session = Session::default();
        assert!(session.begin_cycle().is_none());
        assert!(session.connect(a));
        assert_eq!(session.input(), "0x5f18C75AbDAe578b483E5F43f12a39cF75b973a9");

        assert!(!session.connect(b));
        assert_eq!(session.watched(), Some(a));
    }

    #[test]
    fn begin_cycle_marks_idle_slots_loading() {
        let mut session = Session::new(Some(parse_address(A).unwrap()));
        let ticket = session.begin_cycle().unwrap();
        assert_eq!(session.vault, FetchState::Loading);

        session.apply_vault(&ticket, FetchState::Failed("boom".into()));
        session.begin_cycle();
        assert!(session.vault.is_failed());
    }
}
