//! Client SDK for the auction ledger devnet.
//!
//! This crate provides a high-level API for:
//! - Working out the lowest acceptable next bid
//! - Encoding bids as ledger calls
//! - Driving sales and querying state over JSON-RPC

pub mod bid;
pub mod query;

pub use bid::{lowest_acceptable_bid, prepare_bid, BidError, PreparedBid};
pub use query::LedgerRpcClient;
