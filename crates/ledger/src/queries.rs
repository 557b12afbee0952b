//! Query handlers for the auction ledger.
//!
//! These functions provide read-only access to ledger state.

use crate::state::LedgerState;
use auction_types::{Address, Amount, AssetId, AuctionPhase, BidState, LedgerEvent, SaleTerms};
use serde::{Deserialize, Serialize};

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LedgerQuery {
    /// Get sale terms by asset.
    GetSale { asset_id: AssetId },

    /// Get the current winning bid by asset.
    GetBid { asset_id: AssetId },

    /// Get the lifecycle phase of an asset at `now`.
    GetPhase { asset_id: AssetId, now: u64 },

    /// List sales (paginated, ascending asset id).
    ListSales { offset: u64, limit: u64 },

    /// Read the event log (paginated, oldest first).
    GetEvents { offset: u64, limit: u64 },

    /// Get funds held for current winning bids.
    GetEscrowBalance,

    /// Get assets whose auction can be settled at `now`.
    GetSettleable { now: u64 },
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LedgerQueryResponse {
    /// Sale terms.
    Sale(Option<SaleTerms>),

    /// Current winning bid.
    Bid(Option<BidState>),

    /// Lifecycle phase.
    Phase(AuctionPhase),

    /// Sale summaries.
    SaleList(Vec<SaleSummary>),

    /// Event log slice.
    Events(Vec<LedgerEvent>),

    /// Escrow balance.
    EscrowBalance(Amount),

    /// Settleable assets.
    Settleable(Vec<AssetId>),
}

/// Handle a query.
pub fn handle_query(state: &LedgerState, query: LedgerQuery) -> LedgerQueryResponse {
    match query {
        LedgerQuery::GetSale { asset_id } => {
            LedgerQueryResponse::Sale(state.get_sale(asset_id).cloned())
        }

        LedgerQuery::GetBid { asset_id } => {
            LedgerQueryResponse::Bid(state.get_bid(asset_id).cloned())
        }

        LedgerQuery::GetPhase { asset_id, now } => {
            LedgerQueryResponse::Phase(state.phase(asset_id, now))
        }

        LedgerQuery::ListSales { offset, limit } => LedgerQueryResponse::SaleList(
            get_sale_summaries(state, offset as usize, limit as usize),
        ),

        LedgerQuery::GetEvents { offset, limit } => {
            let events = state
                .events
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect();
            LedgerQueryResponse::Events(events)
        }

        LedgerQuery::GetEscrowBalance => LedgerQueryResponse::EscrowBalance(state.escrow_balance),

        LedgerQuery::GetSettleable { now } => {
            LedgerQueryResponse::Settleable(get_pending_settlement(state, now))
        }
    }
}

/// Summary of a sale for listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSummary {
    pub asset_id: AssetId,
    pub seller: Address,
    pub reserve_price: Amount,
    pub bid_increment: u32,
    pub duration: u64,
    pub start_time: Option<u64>,
    pub highest_bidder: Option<Address>,
    pub highest_bid: Option<Amount>,
}

impl SaleSummary {
    /// Create summary from the two records of an asset.
    pub fn from_records(asset_id: AssetId, sale: &SaleTerms, bid: Option<&BidState>) -> Self {
        Self {
            asset_id,
            seller: sale.seller,
            reserve_price: sale.reserve_price,
            bid_increment: sale.bid_increment,
            duration: sale.duration,
            start_time: sale.start_time,
            highest_bidder: bid.map(|b| b.bidder),
            highest_bid: bid.map(|b| b.amount),
        }
    }
}

/// Get sale summaries for listing.
pub fn get_sale_summaries(state: &LedgerState, offset: usize, limit: usize) -> Vec<SaleSummary> {
    state
        .sales
        .iter()
        .skip(offset)
        .take(limit)
        .map(|(asset_id, sale)| SaleSummary::from_records(*asset_id, sale, state.get_bid(*asset_id)))
        .collect()
}

/// Get sales still accepting bids at `current_time`.
pub fn get_open_sales(state: &LedgerState, current_time: u64) -> Vec<SaleSummary> {
    state
        .sales
        .iter()
        .filter(|(_, sale)| sale.accepts_bids_at(current_time))
        .map(|(asset_id, sale)| SaleSummary::from_records(*asset_id, sale, state.get_bid(*asset_id)))
        .collect()
}

/// Get assets whose auction has ended with a winner.
pub fn get_pending_settlement(state: &LedgerState, current_time: u64) -> Vec<AssetId> {
    state
        .sales
        .iter()
        .filter(|(asset_id, sale)| {
            state.bids.contains_key(*asset_id) && current_time > sale.settlement_deadline()
        })
        .map(|(asset_id, _)| *asset_id)
        .collect()
}
