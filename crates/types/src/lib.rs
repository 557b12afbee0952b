//! Core type definitions for escrow-backed English auctions.
//!
//! This crate provides the shared data structures used across the auction
//! system: sale terms, bid records, the lifecycle phase view, the public event
//! log entries and the minimum-increment arithmetic.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

// =========================
// PRIMITIVES
// =========================

/// Generic address type (32 bytes)
pub type Address = [u8; 32];

/// Identifier of a non-fungible asset in the external registry
pub type AssetId = u64;

/// Native currency amount in its smallest unit
pub type Amount = u128;

/// The all-zero address. Never a valid seller, bidder or custodian.
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Denominator for basis-point quantities (1 bp = 1/10000)
pub const BASIS_POINTS: u128 = 10_000;

// =========================
// SALE RECORDS
// =========================

/// Terms of an active sale. At most one exists per asset.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SaleTerms {
    /// Account that deposited the asset
    pub seller: Address,

    /// Timestamp of the first accepted bid; the countdown starts here
    pub start_time: Option<u64>,

    /// Length of the bidding window in seconds, fixed at creation
    pub duration: u64,

    /// Minimum acceptable first bid
    pub reserve_price: Amount,

    /// Minimum step over the previous winning bid, in basis points
    pub bid_increment: u32,
}

impl SaleTerms {
    /// Fresh terms for a sale that has not received any bid.
    pub fn new(seller: Address, duration: u64, reserve_price: Amount, bid_increment: u32) -> Self {
        Self {
            seller,
            start_time: None,
            duration,
            reserve_price,
            bid_increment,
        }
    }

    /// End of the bidding window, once the first bid has started the clock.
    pub fn ends_at(&self) -> Option<u64> {
        self.start_time
            .map(|start| start.saturating_add(self.duration))
    }

    /// Time that must be strictly exceeded before settlement.
    ///
    /// A sale without bids counts its window from time zero.
    pub fn settlement_deadline(&self) -> u64 {
        self.start_time.unwrap_or(0).saturating_add(self.duration)
    }

    /// Whether a follow-up bid placed at `now` falls inside the window.
    pub fn accepts_bids_at(&self, now: u64) -> bool {
        match self.start_time {
            None => true,
            Some(start) => now >= start && now <= start.saturating_add(self.duration),
        }
    }

    /// Smallest amount that outbids `previous` under these terms.
    pub fn minimum_next_bid(&self, previous: Amount) -> Option<Amount> {
        minimum_next_bid(previous, self.bid_increment)
    }
}

/// Current winning bid for an asset.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BidState {
    pub bidder: Address,
    pub amount: Amount,
}

// =========================
// LIFECYCLE
// =========================

/// Lifecycle phase of an asset, derived from its records and the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionPhase {
    /// No sale exists
    Idle,
    /// Sale open, no bid yet (cancellable, never expires)
    Listed,
    /// Countdown running, follow-up bids accepted until `ends_at`
    Bidding { ends_at: u64 },
    /// Window closed, waiting for settlement
    Ended { ends_at: u64 },
}

impl AuctionPhase {
    /// Derive the phase of a sale at time `now`.
    pub fn of(sale: Option<&SaleTerms>, now: u64) -> Self {
        let Some(sale) = sale else {
            return AuctionPhase::Idle;
        };
        match sale.ends_at() {
            None => AuctionPhase::Listed,
            Some(ends_at) if now > ends_at => AuctionPhase::Ended { ends_at },
            Some(ends_at) => AuctionPhase::Bidding { ends_at },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionPhase::Idle => "idle",
            AuctionPhase::Listed => "listed",
            AuctionPhase::Bidding { .. } => "bidding",
            AuctionPhase::Ended { .. } => "ended",
        }
    }
}

// =========================
// EVENTS
// =========================

/// Entry of the public, append-only event log.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum LedgerEvent {
    SaleOpened {
        seller: Address,
        asset_id: AssetId,
        duration: u64,
        reserve_price: Amount,
        bid_increment: u32,
    },
    SaleCancelled {
        asset_id: AssetId,
    },
    Bid {
        bidder: Address,
        asset_id: AssetId,
        amount: Amount,
    },
    Purchased {
        seller: Address,
        buyer: Address,
        asset_id: AssetId,
        price: Amount,
    },
}

impl LedgerEvent {
    /// Asset the event refers to.
    pub fn asset_id(&self) -> AssetId {
        match self {
            LedgerEvent::SaleOpened { asset_id, .. }
            | LedgerEvent::SaleCancelled { asset_id }
            | LedgerEvent::Bid { asset_id, .. }
            | LedgerEvent::Purchased { asset_id, .. } => *asset_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::SaleOpened { .. } => "SaleOpened",
            LedgerEvent::SaleCancelled { .. } => "SaleCancelled",
            LedgerEvent::Bid { .. } => "Bid",
            LedgerEvent::Purchased { .. } => "Purchased",
        }
    }
}

/// Outcome of a completed settlement
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Settlement {
    pub asset_id: AssetId,
    pub seller: Address,
    pub buyer: Address,
    pub price: Amount,
    pub settled_at: u64,
    pub settler: Address,
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Minimum follow-up bid: `previous * (10000 + increment) / 10000`, truncated.
///
/// Returns `None` on overflow.
pub fn minimum_next_bid(previous: Amount, bid_increment: u32) -> Option<Amount> {
    previous
        .checked_mul(BASIS_POINTS + u128::from(bid_increment))
        .map(|scaled| scaled / BASIS_POINTS)
}
