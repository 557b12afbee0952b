//! Call message types for the auction ledger.

use auction_types::{Amount, AssetId, Settlement};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Call messages for the auction ledger.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum LedgerCall {
    // === Sale Lifecycle ===
    /// Deposit an asset and open its sale.
    OpenSale {
        asset_id: AssetId,
        duration: u64,
        reserve_price: Amount,
        bid_increment: u32,
    },

    /// Withdraw an asset that has not received any bid (seller only).
    CancelSale { asset_id: AssetId },

    // === Bidding ===
    /// Place a bid; the attached value must equal `amount`.
    Bid { asset_id: AssetId, amount: Amount },

    // === Settlement ===
    /// Exchange asset and funds after the window closed (permissionless).
    Settle { asset_id: AssetId },
}

impl LedgerCall {
    pub fn asset_id(&self) -> AssetId {
        match self {
            LedgerCall::OpenSale { asset_id, .. }
            | LedgerCall::CancelSale { asset_id }
            | LedgerCall::Bid { asset_id, .. }
            | LedgerCall::Settle { asset_id } => *asset_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LedgerCall::OpenSale { .. } => "open_sale",
            LedgerCall::CancelSale { .. } => "cancel_sale",
            LedgerCall::Bid { .. } => "bid",
            LedgerCall::Settle { .. } => "settle",
        }
    }

    /// Borsh encoding of the call, as submitted in transactions.
    pub fn encode(&self) -> std::io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> std::io::Result<Self> {
        borsh::from_slice(bytes)
    }
}

/// Result of a successfully dispatched call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutcome {
    SaleOpened,
    SaleCancelled,
    BidAccepted,
    Settled(Settlement),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_encoding() {
        let call = LedgerCall::Bid {
            asset_id: 3,
            amount: 1_005_000_000_000_000_000,
        };
        let bytes = call.encode().unwrap();
        assert_eq!(LedgerCall::decode(&bytes).unwrap(), call);
        assert_eq!(call.asset_id(), 3);
        assert_eq!(call.name(), "bid");
    }

    #[test]
    fn test_decode_garbage() {
        assert!(LedgerCall::decode(&[0xff, 0x01]).is_err());
    }
}
