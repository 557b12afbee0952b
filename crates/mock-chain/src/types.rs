//! RPC-compatible types for the mock chain.
//!
//! These types are JSON-serializable versions of the ledger types. Addresses
//! travel as hex strings and amounts as decimal strings, since `u128` values
//! do not survive JSON number handling in most clients.

use auction_ledger::{CallOutcome, SaleSummary};
use auction_types::{Address, Amount, AuctionPhase, BidState, LedgerEvent, Settlement};
use serde::{Deserialize, Serialize};

/// Ledger account used when the genesis file does not name one.
pub const DEFAULT_LEDGER_ADDRESS: Address = [0xee; 32];

/// Seconds added to the clock by each produced block.
pub const DEFAULT_BLOCK_TIME: u64 = 12;

/// Devnet genesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainGenesis {
    pub initial_timestamp: u64,
    pub block_time: u64,
    /// Hex address of the ledger account
    pub ledger_address: Option<String>,
    pub balances: Vec<GenesisBalance>,
    pub assets: Vec<GenesisAsset>,
}

impl Default for ChainGenesis {
    fn default() -> Self {
        Self {
            initial_timestamp: 0,
            block_time: DEFAULT_BLOCK_TIME,
            ledger_address: None,
            balances: Vec::new(),
            assets: Vec::new(),
        }
    }
}

/// Initial native balance of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub account: String,
    pub amount: String,
}

/// Asset minted at genesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAsset {
    pub asset_id: u64,
    pub owner: String,
}

/// Block info response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

/// Parameters for opening a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSaleParams {
    pub sender: String,
    pub asset_id: u64,
    pub duration: u64,
    pub reserve_price: String,
    /// Minimum step over the previous bid, in basis points
    pub bid_increment: u32,
}

/// Parameters for placing a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidParams {
    pub sender: String,
    pub asset_id: u64,
    pub amount: String,
    /// Attached value; defaults to `amount`
    pub value: Option<String>,
}

/// Parameters for submitting an encoded call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitCallParams {
    pub sender: String,
    /// Hex-encoded borsh `LedgerCall`
    pub call: String,
    pub value: Option<String>,
}

/// Sale view for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRpc {
    pub asset_id: u64,
    pub seller: String,
    pub duration: u64,
    pub reserve_price: String,
    pub bid_increment: u32,
    pub start_time: Option<u64>,
    pub highest_bidder: Option<String>,
    pub highest_bid: Option<String>,
}

impl From<&SaleSummary> for SaleRpc {
    fn from(s: &SaleSummary) -> Self {
        Self {
            asset_id: s.asset_id,
            seller: hex::encode(s.seller),
            duration: s.duration,
            reserve_price: s.reserve_price.to_string(),
            bid_increment: s.bid_increment,
            start_time: s.start_time,
            highest_bidder: s.highest_bidder.map(hex::encode),
            highest_bid: s.highest_bid.map(|a| a.to_string()),
        }
    }
}

/// Winning bid for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRpc {
    pub bidder: String,
    pub amount: String,
}

impl From<&BidState> for BidRpc {
    fn from(b: &BidState) -> Self {
        Self {
            bidder: hex::encode(b.bidder),
            amount: b.amount.to_string(),
        }
    }
}

/// Lifecycle phase for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRpc {
    pub phase: String,
    pub ends_at: Option<u64>,
}

impl From<AuctionPhase> for PhaseRpc {
    fn from(p: AuctionPhase) -> Self {
        let ends_at = match p {
            AuctionPhase::Bidding { ends_at } | AuctionPhase::Ended { ends_at } => Some(ends_at),
            AuctionPhase::Idle | AuctionPhase::Listed => None,
        };
        Self {
            phase: p.as_str().to_string(),
            ends_at,
        }
    }
}

/// Settlement receipt for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRpc {
    pub asset_id: u64,
    pub seller: String,
    pub buyer: String,
    pub price: String,
    pub settled_at: u64,
    pub settler: String,
}

impl From<Settlement> for SettlementRpc {
    fn from(s: Settlement) -> Self {
        Self {
            asset_id: s.asset_id,
            seller: hex::encode(s.seller),
            buyer: hex::encode(s.buyer),
            price: s.price.to_string(),
            settled_at: s.settled_at,
            settler: hex::encode(s.settler),
        }
    }
}

/// Event log entry for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum EventRpc {
    SaleOpened {
        seller: String,
        asset_id: u64,
        duration: u64,
        reserve_price: String,
        bid_increment: u32,
    },
    SaleCancelled {
        asset_id: u64,
    },
    Bid {
        bidder: String,
        asset_id: u64,
        amount: String,
    },
    Purchased {
        seller: String,
        buyer: String,
        asset_id: u64,
        price: String,
    },
}

impl From<&LedgerEvent> for EventRpc {
    fn from(e: &LedgerEvent) -> Self {
        match e {
            LedgerEvent::SaleOpened {
                seller,
                asset_id,
                duration,
                reserve_price,
                bid_increment,
            } => EventRpc::SaleOpened {
                seller: hex::encode(seller),
                asset_id: *asset_id,
                duration: *duration,
                reserve_price: reserve_price.to_string(),
                bid_increment: *bid_increment,
            },
            LedgerEvent::SaleCancelled { asset_id } => EventRpc::SaleCancelled {
                asset_id: *asset_id,
            },
            LedgerEvent::Bid {
                bidder,
                asset_id,
                amount,
            } => EventRpc::Bid {
                bidder: hex::encode(bidder),
                asset_id: *asset_id,
                amount: amount.to_string(),
            },
            LedgerEvent::Purchased {
                seller,
                buyer,
                asset_id,
                price,
            } => EventRpc::Purchased {
                seller: hex::encode(seller),
                buyer: hex::encode(buyer),
                asset_id: *asset_id,
                price: price.to_string(),
            },
        }
    }
}

/// Outcome of a submitted call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOutcomeRpc {
    pub outcome: String,
    pub settlement: Option<SettlementRpc>,
}

impl From<CallOutcome> for CallOutcomeRpc {
    fn from(o: CallOutcome) -> Self {
        let (outcome, settlement) = match o {
            CallOutcome::SaleOpened => ("sale_opened", None),
            CallOutcome::SaleCancelled => ("sale_cancelled", None),
            CallOutcome::BidAccepted => ("bid_accepted", None),
            CallOutcome::Settled(s) => ("settled", Some(SettlementRpc::from(s))),
        };
        Self {
            outcome: outcome.to_string(),
            settlement,
        }
    }
}

/// Parse a 32-byte hex address, with or without `0x` prefix.
pub fn parse_address(s: &str) -> Result<Address, String> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| format!("Invalid address hex: {}", e))?;
    bytes
        .try_into()
        .map_err(|_| "Address must be 32 bytes".to_string())
}

/// Parse a decimal amount.
pub fn parse_amount(s: &str) -> Result<Amount, String> {
    s.trim()
        .parse::<Amount>()
        .map_err(|e| format!("Invalid amount {:?}: {}", s, e))
}
