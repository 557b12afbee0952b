//! Bid preparation.

use thiserror::Error;

use auction_ledger::LedgerCall;
use auction_types::{minimum_next_bid, Amount, AssetId};

/// Errors that can occur while preparing a bid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BidError {
    #[error("Invalid amount {0:?}")]
    InvalidAmount(String),

    #[error("Minimum next bid overflows")]
    Overflow,

    #[error("Bid {got} is below the minimum of {required}")]
    BelowMinimum { required: Amount, got: Amount },

    #[error("Call encoding failed: {0}")]
    Encoding(String),
}

/// A bid ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBid {
    pub asset_id: AssetId,
    /// Amount bid; also the value to attach
    pub amount: Amount,
    /// Borsh-encoded `LedgerCall::Bid`
    pub encoded_call: Vec<u8>,
}

impl PreparedBid {
    /// Hex form of the encoded call, as `auction_submitCall` expects it.
    pub fn call_hex(&self) -> String {
        hex::encode(&self.encoded_call)
    }
}

/// Lowest amount the ledger would accept as the next bid.
///
/// With no winning bid this is the reserve price; otherwise the previous bid
/// raised by `bid_increment` basis points, truncated.
pub fn lowest_acceptable_bid(
    reserve_price: Amount,
    bid_increment: u32,
    highest_bid: Option<Amount>,
) -> Result<Amount, BidError> {
    match highest_bid {
        None => Ok(reserve_price),
        Some(previous) => minimum_next_bid(previous, bid_increment).ok_or(BidError::Overflow),
    }
}

/// Prepare a bid, refusing amounts the ledger would reject as too low.
pub fn prepare_bid(
    asset_id: AssetId,
    amount: Amount,
    required: Amount,
) -> Result<PreparedBid, BidError> {
    if amount < required {
        return Err(BidError::BelowMinimum {
            required,
            got: amount,
        });
    }
    let encoded_call = LedgerCall::Bid { asset_id, amount }
        .encode()
        .map_err(|e| BidError::Encoding(e.to_string()))?;
    Ok(PreparedBid {
        asset_id,
        amount,
        encoded_call,
    })
}

/// Parse a decimal amount in the smallest currency unit.
pub fn parse_amount(s: &str) -> Result<Amount, BidError> {
    s.trim()
        .parse::<Amount>()
        .map_err(|_| BidError::InvalidAmount(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: Amount = 1_000_000_000_000_000_000;

    #[test]
    fn test_lowest_acceptable_bid() {
        assert_eq!(lowest_acceptable_bid(ONE, 50, None), Ok(ONE));
        assert_eq!(
            lowest_acceptable_bid(ONE, 50, Some(ONE)),
            Ok(1_005_000_000_000_000_000)
        );
        assert_eq!(
            lowest_acceptable_bid(ONE, 50, Some(Amount::MAX)),
            Err(BidError::Overflow)
        );
    }

    #[test]
    fn test_prepare_bid() {
        let bid = prepare_bid(4, 1_005_000_000_000_000_000, 1_005_000_000_000_000_000).unwrap();
        assert_eq!(
            LedgerCall::decode(&bid.encoded_call).unwrap(),
            LedgerCall::Bid {
                asset_id: 4,
                amount: 1_005_000_000_000_000_000
            }
        );
        assert_eq!(hex::decode(bid.call_hex()).unwrap(), bid.encoded_call);
    }

    #[test]
    fn test_prepare_bid_too_low() {
        assert_eq!(
            prepare_bid(4, 1_004_999_999_999_999_999, 1_005_000_000_000_000_000),
            Err(BidError::BelowMinimum {
                required: 1_005_000_000_000_000_000,
                got: 1_004_999_999_999_999_999
            })
        );
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 42 "), Ok(42));
        assert!(matches!(parse_amount("4.2"), Err(BidError::InvalidAmount(_))));
    }
}
