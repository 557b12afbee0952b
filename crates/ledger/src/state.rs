//! Stored state of the auction ledger.

use std::collections::BTreeMap;

use auction_types::{Address, Amount, AssetId, AuctionPhase, BidState, LedgerEvent, SaleTerms};
use tracing::info;

/// Ledger state.
///
/// The sale and bid registries share the asset-id key but are stored
/// separately. A bid record never exists without a sale record.
#[derive(Debug, Default)]
pub struct LedgerState {
    /// Address under which the ledger holds assets and funds
    pub ledger_address: Address,

    /// Sale registry: asset -> terms
    pub sales: BTreeMap<AssetId, SaleTerms>,

    /// Bid registry: asset -> current winning bid
    pub bids: BTreeMap<AssetId, BidState>,

    /// Funds held on behalf of current winning bidders
    pub escrow_balance: Amount,

    /// Public event log, append-only
    pub events: Vec<LedgerEvent>,
}

impl LedgerState {
    /// Create an empty ledger state.
    pub fn new(ledger_address: Address) -> Self {
        Self {
            ledger_address,
            ..Default::default()
        }
    }

    /// Get sale terms by asset.
    pub fn get_sale(&self, asset_id: AssetId) -> Option<&SaleTerms> {
        self.sales.get(&asset_id)
    }

    /// Get the current winning bid by asset.
    pub fn get_bid(&self, asset_id: AssetId) -> Option<&BidState> {
        self.bids.get(&asset_id)
    }

    /// Lifecycle phase of an asset at `now`.
    pub fn phase(&self, asset_id: AssetId, now: u64) -> AuctionPhase {
        AuctionPhase::of(self.get_sale(asset_id), now)
    }

    /// Remove both records of an asset.
    pub fn clear(&mut self, asset_id: AssetId) -> (Option<SaleTerms>, Option<BidState>) {
        (self.sales.remove(&asset_id), self.bids.remove(&asset_id))
    }

    /// Append an event to the log.
    pub fn emit(&mut self, event: LedgerEvent) {
        info!(
            event = event.name(),
            asset_id = event.asset_id(),
            seq = self.events.len(),
            "Event emitted"
        );
        self.events.push(event);
    }

    /// Events that refer to `asset_id`, oldest first.
    pub fn events_for(&self, asset_id: AssetId) -> Vec<&LedgerEvent> {
        self.events
            .iter()
            .filter(|event| event.asset_id() == asset_id)
            .collect()
    }

    /// Sum of all current winning bids. Equals `escrow_balance`.
    pub fn outstanding_bids(&self) -> Amount {
        self.bids.values().map(|bid| bid.amount).sum()
    }
}
