//! Auction ledger error types.

use thiserror::Error;

use auction_types::{Amount, AssetId};

use crate::custody::CustodyError;
use crate::funds::FundsError;

/// Errors that can occur in the auction ledger.
///
/// Every error is a synchronous rejection: the ledger's stored state is left
/// exactly as it was before the call. The one exception is a custody release
/// that fails after the seller was paid, see [`crate::handlers::handle_settle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // === Validation ===
    #[error("Sale duration must be greater than zero")]
    InvalidDuration,

    #[error("Reserve price must be greater than zero")]
    InvalidReservePrice,

    #[error("Bid increment must be greater than zero")]
    InvalidBidIncrement,

    // === Authorization ===
    #[error("Caller is not the seller of asset {0}")]
    NotSeller(AssetId),

    #[error("Asset transfer unauthorized: {0}")]
    TransferUnauthorized(CustodyError),

    #[error("Zero address cannot sell or bid")]
    ZeroAddressCaller,

    // === State ===
    #[error("No active sale for asset {0}")]
    NoActiveSale(AssetId),

    #[error("Asset {0} already has a bid")]
    BidAlreadyPlaced(AssetId),

    #[error("Bidding window for asset {0} has closed")]
    AuctionExpired(AssetId),

    #[error("Auction for asset {asset_id} runs until {deadline}")]
    NotYetEnded { asset_id: AssetId, deadline: u64 },

    #[error("No bids placed on asset {0}")]
    NoBids(AssetId),

    // === Economic ===
    #[error("Attached value {attached} does not match declared amount {declared}")]
    AmountMismatch { declared: Amount, attached: Amount },

    #[error("Bid below reserve: need {reserve}, got {got}")]
    BelowReserve { reserve: Amount, got: Amount },

    #[error("Bid too low: need at least {required}, got {got}")]
    BidTooLow { required: Amount, got: Amount },

    #[error("Call does not accept value, got {0}")]
    UnexpectedValue(Amount),

    // === Transfers ===
    #[error("Refund to outbid bidder failed: {0}")]
    RefundFailed(FundsError),

    #[error("Payout to seller failed: {0}")]
    PayoutFailed(FundsError),

    #[error("Asset {0} is not held in custody by the ledger")]
    CustodyUnavailable(AssetId),

    // === Execution ===
    #[error("Re-entrant call rejected")]
    ReentrantCall,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

impl LedgerError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InvalidDuration => "InvalidDuration",
            LedgerError::InvalidReservePrice => "InvalidReservePrice",
            LedgerError::InvalidBidIncrement => "InvalidBidIncrement",
            LedgerError::NotSeller(_) => "NotSeller",
            LedgerError::TransferUnauthorized(_) => "TransferUnauthorized",
            LedgerError::ZeroAddressCaller => "ZeroAddressCaller",
            LedgerError::NoActiveSale(_) => "NoActiveSale",
            LedgerError::BidAlreadyPlaced(_) => "BidAlreadyPlaced",
            LedgerError::AuctionExpired(_) => "AuctionExpired",
            LedgerError::NotYetEnded { .. } => "NotYetEnded",
            LedgerError::NoBids(_) => "NoBids",
            LedgerError::AmountMismatch { .. } => "AmountMismatch",
            LedgerError::BelowReserve { .. } => "BelowReserve",
            LedgerError::BidTooLow { .. } => "BidTooLow",
            LedgerError::UnexpectedValue(_) => "UnexpectedValue",
            LedgerError::RefundFailed(_) => "RefundFailed",
            LedgerError::PayoutFailed(_) => "PayoutFailed",
            LedgerError::CustodyUnavailable(_) => "CustodyUnavailable",
            LedgerError::ReentrantCall => "ReentrantCall",
            LedgerError::ArithmeticOverflow => "ArithmeticOverflow",
        }
    }
}
