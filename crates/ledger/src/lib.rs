//! Escrow-and-auction settlement ledger.
//!
//! This crate implements the logic of single-asset English auctions:
//!
//! - Sellers deposit an asset and open a sale with a reserve price
//! - Bidders escrow funds; each outbid bidder is refunded in full
//! - The countdown starts with the first accepted bid
//! - Anyone may settle once the window closed, paying the seller and
//!   releasing the asset to the winner
//!
//! # Architecture
//!
//! - `call`: Message types for state-changing operations
//! - `handlers`: Business logic for processing calls
//! - `queries`: Read-only state access
//! - `state`: Sale and bid registries
//! - `custody`: Asset registry seam and in-memory registry
//! - `funds`: Native value seam and in-memory bank
//! - `ledger`: Serialized, re-entrancy-guarded entry point
//! - `genesis`: Initial configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```ignore
//! use auction_ledger::{AuctionLedger, CallContext, InMemoryAssetRegistry, InMemoryBank};
//!
//! let ledger = AuctionLedger::new(&config, registry.clone(), bank.channel(ledger_address))?;
//!
//! // Open a sale
//! ledger.open_sale(&CallContext::new(seller, now), asset_id, 3600, reserve, 50)?;
//!
//! // Bid with attached value
//! ledger.bid(&CallContext::new(bidder, now).with_value(amount), asset_id, amount)?;
//! ```

pub mod call;
pub mod custody;
pub mod error;
pub mod funds;
pub mod genesis;
pub mod handlers;
pub mod ledger;
pub mod queries;
pub mod state;

mod guard;

pub use call::{CallOutcome, LedgerCall};
pub use custody::{AssetCustodian, CustodyError, CustodyGateway, InMemoryAssetRegistry};
pub use error::LedgerError;
pub use funds::{BankChannel, FundsChannel, FundsError, InMemoryBank};
pub use genesis::{GenesisValidationError, LedgerGenesisConfig};
pub use handlers::{CallContext, HandlerResult};
pub use ledger::AuctionLedger;
pub use queries::{LedgerQuery, LedgerQueryResponse, SaleSummary};
pub use state::LedgerState;
