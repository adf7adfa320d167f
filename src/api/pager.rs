use log::{debug, warn};

use crate::api::provider::{ChainGateway, EventFilter};
use crate::error::GatewayError;
use crate::model::LogEntry;

/// Walks a block range in fixed-size pages so long histories never need a
/// single unbounded `eth_getLogs` call.
///
/// A failed page leaves the cursor where it was, so the same pager (or one
/// rebuilt with [`EventPager::resume`]) picks up from the failed page.
#[derive(Debug, Clone)]
pub struct EventPager {
    filter: EventFilter,
    next_from: u64,
    to_block: u64,
    page_size: u64,
    exhausted: bool,
}

impl EventPager {
    pub fn new(filter: EventFilter, from_block: u64, to_block: u64, page_size: u64) -> Self {
        Self {
            filter,
            next_from: from_block,
            to_block,
            page_size: page_size.max(1),
            exhausted: from_block > to_block,
        }
    }

    pub fn resume(filter: EventFilter, cursor: u64, to_block: u64, page_size: u64) -> Self {
        Self::new(filter, cursor, to_block, page_size)
    }

    /// Next block that will be queried, `None` once the range is covered.
    pub fn cursor(&self) -> Option<u64> {
        (!self.exhausted).then_some(self.next_from)
    }

    pub async fn next_page<G: ChainGateway + ?Sized>(
        &mut self,
        gateway: &G,
    ) -> Result<Option<Vec<LogEntry>>, GatewayError> {
        if self.exhausted {
            return Ok(None);
        }

        let end = self
            .next_from
            .saturating_add(self.page_size - 1)
            .min(self.to_block);
        let logs = gateway.query_events(&self.filter, self.next_from, end).await?;
        debug!("📄 page {}..={} returned {} events", self.next_from, end, logs.len());

        match end.checked_add(1) {
            Some(next) if next <= self.to_block => self.next_from = next,
            _ => self.exhausted = true,
        }
        Ok(Some(logs))
    }

    pub async fn collect_all<G: ChainGateway + ?Sized>(mut self, gateway: &G) -> Result<Vec<LogEntry>, GatewayError> {
        let mut all = Vec::new();
        loop {
            match self.next_page(gateway).await {
                Ok(Some(page)) => all.extend(page),
                Ok(None) => return Ok(all),
                Err(e) => {
                    warn!("⚠️ Log query failed at block {:?}: {}", self.cursor(), e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fixture::StaticGateway;
    use alloy_primitives::{Address, B256, U256};

    const VAULT: Address = Address::new([0x22; 20]);
    const TOKEN: Address = Address::new([0x11; 20]);
    const ME: Address = Address::new([0x01; 20]);

    fn gateway_with_deposits(blocks: &[u64]) -> StaticGateway {
        let mut gw = StaticGateway::new(1, 1_000).with_vault(VAULT, "v", 0, U256::from(1u64), TOKEN);
        for (i, block) in blocks.iter().enumerate() {
            gw = gw.with_deposit(VAULT, ME, B256::repeat_byte(i as u8 + 1), *block, U256::from(10u64), U256::from(10u64));
        }
        gw
    }

    #[tokio::test]
    async fn covers_range_in_pages() {
        let gw = gateway_with_deposits(&[0, 99, 100, 250, 1_000]);
        let filter = EventFilter::transfers_to(VAULT, ME);

        let logs = EventPager::new(filter, 0, 1_000, 100).collect_all(&gw).await.unwrap();
        let blocks: Vec<u64> = logs.iter().map(|l| l.block_number).collect();
        assert_eq!(blocks, vec![0, 99, 100, 250, 1_000]);

        let ranges = gw.queried_ranges();
        assert_eq!(ranges.len(), 11);
        assert_eq!(ranges[0], (0, 99));
        assert_eq!(ranges[9], (900, 999));
        assert_eq!(ranges[10], (1_000, 1_000));
    }

    #[tokio::test]
    async fn resumes_from_cursor() {
        let gw = gateway_with_deposits(&[5, 15, 25]);
        let filter = EventFilter::transfers_to(VAULT, ME);

        let mut pager = EventPager::new(filter.clone(), 0, 29, 10);
        let first = pager.next_page(&gw).await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        let cursor = pager.cursor().unwrap();
        assert_eq!(cursor, 10);

        let rest = EventPager::resume(filter, cursor, 29, 10).collect_all(&gw).await.unwrap();
        let blocks: Vec<u64> = rest.iter().map(|l| l.block_number).collect();
        assert_eq!(blocks, vec![15, 25]);
    }

    #[tokio::test]
    async fn failed_page_keeps_cursor() {
        let gw = gateway_with_deposits(&[5]).offline();
        let mut pager = EventPager::new(EventFilter::transfers_to(VAULT, ME), 0, 29, 10);

        assert!(pager.next_page(&gw).await.is_err());
        assert_eq!(pager.cursor(), Some(0));
    }

    #[tokio::test]
    async fn empty_range() {
        let gw = gateway_with_deposits(&[]);
        let mut pager = EventPager::new(EventFilter::transfers_to(VAULT, ME), 10, 9, 10);
        assert_eq!(pager.cursor(), None);
        assert!(pager.next_page(&gw).await.unwrap().is_none());
    }
}
