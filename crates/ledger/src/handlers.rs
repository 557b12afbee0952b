//! Call handlers for the auction ledger.
//!
//! These functions implement the business logic for each call type. Each one
//! validates first, performs its external transfer next and commits registry
//! changes last, so a rejected call leaves the state untouched.

use crate::custody::{AssetCustodian, CustodyError, CustodyGateway};
use crate::error::LedgerError;
use crate::funds::FundsChannel;
use crate::state::LedgerState;
use auction_types::{
    Address, Amount, AssetId, BidState, LedgerEvent, SaleTerms, Settlement, ZERO_ADDRESS,
};
use tracing::{debug, error, info};

/// Context provided by the host for each call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Sender of the call
    pub sender: Address,
    /// Current timestamp (seconds)
    pub timestamp: u64,
    /// Value attached to the call, already credited to the ledger
    pub value: Amount,
}

impl CallContext {
    pub fn new(sender: Address, timestamp: u64) -> Self {
        Self {
            sender,
            timestamp,
            value: 0,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, LedgerError>;

/// Only bids carry value; anything attached elsewhere would be owned by no one.
fn reject_value(ctx: &CallContext) -> HandlerResult<()> {
    if ctx.value != 0 {
        return Err(LedgerError::UnexpectedValue(ctx.value));
    }
    Ok(())
}

/// Handle OpenSale call.
pub fn handle_open_sale<C: AssetCustodian>(
    state: &mut LedgerState,
    custodian: &mut C,
    ctx: &CallContext,
    asset_id: AssetId,
    duration: u64,
    reserve_price: Amount,
    bid_increment: u32,
) -> HandlerResult<()> {
    reject_value(ctx)?;
    if ctx.sender == ZERO_ADDRESS {
        return Err(LedgerError::ZeroAddressCaller);
    }
    if duration == 0 {
        return Err(LedgerError::InvalidDuration);
    }
    if reserve_price == 0 {
        return Err(LedgerError::InvalidReservePrice);
    }
    if bid_increment == 0 {
        return Err(LedgerError::InvalidBidIncrement);
    }

    // The ledger already holds assets under sale, nobody else controls them
    if state.sales.contains_key(&asset_id) {
        return Err(LedgerError::TransferUnauthorized(CustodyError::NotOwner(
            asset_id,
        )));
    }

    CustodyGateway::new(custodian, state.ledger_address)
        .transfer_to_custody(asset_id, &ctx.sender)
        .map_err(LedgerError::TransferUnauthorized)?;

    state.sales.insert(
        asset_id,
        SaleTerms::new(ctx.sender, duration, reserve_price, bid_increment),
    );
    state.emit(LedgerEvent::SaleOpened {
        seller: ctx.sender,
        asset_id,
        duration,
        reserve_price,
        bid_increment,
    });

    info!(
        asset_id,
        duration,
        reserve_price = %reserve_price,
        bid_increment,
        "Sale opened"
    );
    Ok(())
}

/// Handle CancelSale call.
pub fn handle_cancel_sale<C: AssetCustodian>(
    state: &mut LedgerState,
    custodian: &mut C,
    ctx: &CallContext,
    asset_id: AssetId,
) -> HandlerResult<()> {
    reject_value(ctx)?;
    let seller = state.get_sale(asset_id).map(|sale| sale.seller);
    if seller != Some(ctx.sender) {
        return Err(LedgerError::NotSeller(asset_id));
    }

    // Bids lock the sale against cancellation
    if state.get_bid(asset_id).is_some() {
        return Err(LedgerError::BidAlreadyPlaced(asset_id));
    }

    CustodyGateway::new(custodian, state.ledger_address)
        .release(asset_id, &ctx.sender)
        .map_err(LedgerError::TransferUnauthorized)?;

    state.clear(asset_id);
    state.emit(LedgerEvent::SaleCancelled { asset_id });

    info!(asset_id, "Sale cancelled");
    Ok(())
}

/// Handle Bid call.
///
/// The attached value must equal `amount`. Outbidding refunds the previous
/// bidder in full; if that refund fails the new bid is rejected.
pub fn handle_bid<F: FundsChannel>(
    state: &mut LedgerState,
    funds: &mut F,
    ctx: &CallContext,
    asset_id: AssetId,
    amount: Amount,
) -> HandlerResult<()> {
    // The zero address is the absent-bidder sentinel and can never take delivery
    if ctx.sender == ZERO_ADDRESS {
        return Err(LedgerError::ZeroAddressCaller);
    }
    if ctx.value != amount {
        return Err(LedgerError::AmountMismatch {
            declared: amount,
            attached: ctx.value,
        });
    }

    let sale = state
        .get_sale(asset_id)
        .ok_or(LedgerError::NoActiveSale(asset_id))?;

    let (starts_countdown, outbid) = match state.get_bid(asset_id) {
        None => {
            if amount < sale.reserve_price {
                return Err(LedgerError::BelowReserve {
                    reserve: sale.reserve_price,
                    got: amount,
                });
            }
            (true, None)
        }
        Some(previous) => {
            if !sale.accepts_bids_at(ctx.timestamp) {
                return Err(LedgerError::AuctionExpired(asset_id));
            }
            let required = sale
                .minimum_next_bid(previous.amount)
                .ok_or(LedgerError::ArithmeticOverflow)?;
            if amount < required {
                return Err(LedgerError::BidTooLow {
                    required,
                    got: amount,
                });
            }
            (false, Some(previous.clone()))
        }
    };

    let refunded = outbid.as_ref().map_or(0, |previous| previous.amount);
    let escrow_balance = state
        .escrow_balance
        .checked_add(amount)
        .and_then(|balance| balance.checked_sub(refunded))
        .ok_or(LedgerError::ArithmeticOverflow)?;

    if let Some(previous) = &outbid {
        funds
            .send(&previous.bidder, previous.amount)
            .map_err(LedgerError::RefundFailed)?;
        debug!(asset_id, refund = %previous.amount, "Outbid bidder refunded");
    }

    if starts_countdown {
        if let Some(sale) = state.sales.get_mut(&asset_id) {
            sale.start_time = Some(ctx.timestamp);
        }
    }
    state.bids.insert(
        asset_id,
        BidState {
            bidder: ctx.sender,
            amount,
        },
    );
    state.escrow_balance = escrow_balance;
    state.emit(LedgerEvent::Bid {
        bidder: ctx.sender,
        asset_id,
        amount,
    });

    info!(asset_id, amount = %amount, first = starts_countdown, "Bid accepted");
    Ok(())
}

/// Handle Settle call (permissionless).
///
/// Pays the seller before the asset moves; a failed payout aborts the whole
/// settlement. Custody and the recipient are checked before any funds move.
/// If the registry still refuses the release after the seller was paid, the
/// bookkeeping is committed anyway so the payout cannot be repeated, and the
/// asset stays with the ledger.
pub fn handle_settle<C: AssetCustodian, F: FundsChannel>(
    state: &mut LedgerState,
    custodian: &mut C,
    funds: &mut F,
    ctx: &CallContext,
    asset_id: AssetId,
) -> HandlerResult<Settlement> {
    reject_value(ctx)?;

    // A missing sale reads as all-zero terms
    let deadline = state
        .get_sale(asset_id)
        .map_or(0, SaleTerms::settlement_deadline);
    if ctx.timestamp <= deadline {
        return Err(LedgerError::NotYetEnded { asset_id, deadline });
    }

    let winner = state
        .get_bid(asset_id)
        .cloned()
        .ok_or(LedgerError::NoBids(asset_id))?;
    let seller = state
        .get_sale(asset_id)
        .map(|sale| sale.seller)
        .ok_or(LedgerError::NoActiveSale(asset_id))?;

    let mut custody = CustodyGateway::new(custodian, state.ledger_address);
    if !custody.holds(asset_id) {
        error!(asset_id, "Asset under sale is not held by the ledger");
        return Err(LedgerError::CustodyUnavailable(asset_id));
    }
    if !custody.can_release(asset_id, &winner.bidder) {
        return Err(LedgerError::TransferUnauthorized(CustodyError::ZeroAddress));
    }

    let escrow_balance = state
        .escrow_balance
        .checked_sub(winner.amount)
        .ok_or(LedgerError::ArithmeticOverflow)?;

    funds
        .send(&seller, winner.amount)
        .map_err(LedgerError::PayoutFailed)?;
    debug!(asset_id, payout = %winner.amount, "Seller paid");

    if let Err(e) = custody.release(asset_id, &winner.bidder) {
        error!(asset_id, error = %e, "Release failed after payout, asset stranded in custody");
        state.escrow_balance = escrow_balance;
        state.clear(asset_id);
        return Err(LedgerError::TransferUnauthorized(e));
    }

    state.escrow_balance = escrow_balance;
    state.emit(LedgerEvent::Purchased {
        seller,
        buyer: winner.bidder,
        asset_id,
        price: winner.amount,
    });
    state.clear(asset_id);

    info!(asset_id, price = %winner.amount, "Auction settled");
    Ok(Settlement {
        asset_id,
        seller,
        buyer: winner.bidder,
        price: winner.amount,
        settled_at: ctx.timestamp,
        settler: ctx.sender,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::InMemoryAssetRegistry;
    use crate::funds::{BankChannel, FundsError, InMemoryBank};
    use auction_types::AuctionPhase;

    const LEDGER: Address = [9u8; 32];
    const SELLER: Address = [1u8; 32];
    const BIDDER_B: Address = [2u8; 32];
    const BIDDER_C: Address = [3u8; 32];
    const ASSET: AssetId = 7;

    struct Harness {
        state: LedgerState,
        registry: InMemoryAssetRegistry,
        bank: InMemoryBank,
        channel: BankChannel,
    }

    impl Harness {
        fn new() -> Self {
            let registry = InMemoryAssetRegistry::new();
            registry.mint(ASSET, SELLER).unwrap();
            registry.set_approval_for_all(SELLER, LEDGER, true);

            let bank = InMemoryBank::new();
            bank.credit(BIDDER_B, 1_000_000).unwrap();
            bank.credit(BIDDER_C, 1_000_000).unwrap();

            Self {
                state: LedgerState::new(LEDGER),
                channel: bank.channel(LEDGER),
                registry,
                bank,
            }
        }

        fn open(&mut self, duration: u64, reserve: Amount, increment: u32) -> HandlerResult<()> {
            let ctx = CallContext::new(SELLER, 100);
            handle_open_sale(
                &mut self.state,
                &mut self.registry,
                &ctx,
                ASSET,
                duration,
                reserve,
                increment,
            )
        }

        /// Attach payment the way a host does: debit first, return on failure.
        fn bid(&mut self, bidder: Address, amount: Amount, now: u64) -> HandlerResult<()> {
            self.bank.transfer(&bidder, &LEDGER, amount).unwrap();
            let ctx = CallContext::new(bidder, now).with_value(amount);
            let result = handle_bid(&mut self.state, &mut self.channel, &ctx, ASSET, amount);
            if result.is_err() {
                self.bank.revert_transfer(&LEDGER, &bidder, amount).unwrap();
            }
            result
        }

        fn settle(&mut self, now: u64) -> HandlerResult<Settlement> {
            self.settle_asset(ASSET, now)
        }

        fn settle_asset(&mut self, asset_id: AssetId, now: u64) -> HandlerResult<Settlement> {
            let ctx = CallContext::new([5u8; 32], now);
            handle_settle(
                &mut self.state,
                &mut self.registry,
                &mut self.channel,
                &ctx,
                asset_id,
            )
        }
    }

    #[test]
    fn test_open_sale() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();

        let sale = h.state.get_sale(ASSET).unwrap();
        assert_eq!(sale.seller, SELLER);
        assert_eq!(sale.start_time, None);
        assert_eq!(h.registry.owner_of(ASSET), Some(LEDGER));
        assert_eq!(
            h.state.events,
            vec![LedgerEvent::SaleOpened {
                seller: SELLER,
                asset_id: ASSET,
                duration: 3600,
                reserve_price: 100,
                bid_increment: 50,
            }]
        );
    }

    #[test]
    fn test_open_sale_zero_parameters() {
        let mut h = Harness::new();
        assert_eq!(h.open(0, 100, 50), Err(LedgerError::InvalidDuration));
        assert_eq!(h.open(3600, 0, 50), Err(LedgerError::InvalidReservePrice));
        assert_eq!(h.open(3600, 100, 0), Err(LedgerError::InvalidBidIncrement));
        // Duration is checked first
        assert_eq!(h.open(0, 0, 0), Err(LedgerError::InvalidDuration));

        assert_eq!(h.registry.owner_of(ASSET), Some(SELLER));
        assert!(h.state.sales.is_empty());
        assert!(h.state.events.is_empty());
    }

    #[test]
    fn test_open_sale_without_approval() {
        let mut h = Harness::new();
        h.registry.set_approval_for_all(SELLER, LEDGER, false);

        let result = h.open(3600, 100, 50);
        assert!(matches!(result, Err(LedgerError::TransferUnauthorized(_))));
        assert!(h.state.get_sale(ASSET).is_none());
    }

    #[test]
    fn test_open_sale_twice() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();
        assert!(matches!(
            h.open(10, 1, 1),
            Err(LedgerError::TransferUnauthorized(_))
        ));
        assert_eq!(h.state.get_sale(ASSET).unwrap().duration, 3600);
    }

    #[test]
    fn test_cancel_sale() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();

        let ctx = CallContext::new(SELLER, 200);
        handle_cancel_sale(&mut h.state, &mut h.registry, &ctx, ASSET).unwrap();

        assert!(h.state.get_sale(ASSET).is_none());
        assert!(h.state.get_bid(ASSET).is_none());
        assert_eq!(h.registry.owner_of(ASSET), Some(SELLER));
        assert_eq!(
            h.state.events.last(),
            Some(&LedgerEvent::SaleCancelled { asset_id: ASSET })
        );
    }

    #[test]
    fn test_cancel_sale_not_seller() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();

        let ctx = CallContext::new(BIDDER_B, 200);
        let result = handle_cancel_sale(&mut h.state, &mut h.registry, &ctx, ASSET);
        assert_eq!(result, Err(LedgerError::NotSeller(ASSET)));

        // No sale at all reads as a seller mismatch
        let ctx = CallContext::new(SELLER, 200);
        let result = handle_cancel_sale(&mut h.state, &mut h.registry, &ctx, 99);
        assert_eq!(result, Err(LedgerError::NotSeller(99)));
    }

    #[test]
    fn test_cancel_sale_after_bid() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();
        h.bid(BIDDER_B, 100, 1000).unwrap();

        let ctx = CallContext::new(SELLER, 1001);
        let result = handle_cancel_sale(&mut h.state, &mut h.registry, &ctx, ASSET);
        assert_eq!(result, Err(LedgerError::BidAlreadyPlaced(ASSET)));
        assert_eq!(h.registry.owner_of(ASSET), Some(LEDGER));
    }

    #[test]
    fn test_first_bid_starts_countdown() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();

        assert_eq!(
            h.bid(BIDDER_B, 99, 1000),
            Err(LedgerError::BelowReserve {
                reserve: 100,
                got: 99
            })
        );
        assert_eq!(h.state.phase(ASSET, 1000), AuctionPhase::Listed);

        h.bid(BIDDER_B, 100, 1000).unwrap();
        assert_eq!(h.state.get_sale(ASSET).unwrap().start_time, Some(1000));
        assert_eq!(
            h.state.get_bid(ASSET),
            Some(&BidState {
                bidder: BIDDER_B,
                amount: 100
            })
        );
        assert_eq!(h.state.escrow_balance, 100);
        assert_eq!(h.bank.balance_of(&LEDGER), 100);
    }

    #[test]
    fn test_bid_amount_mismatch() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();

        let ctx = CallContext::new(BIDDER_B, 1000).with_value(150);
        let result = handle_bid(&mut h.state, &mut h.channel, &ctx, ASSET, 200);
        assert_eq!(
            result,
            Err(LedgerError::AmountMismatch {
                declared: 200,
                attached: 150
            })
        );
        assert!(h.state.get_bid(ASSET).is_none());
    }

    #[test]
    fn test_bid_without_sale() {
        let mut h = Harness::new();
        assert_eq!(
            h.bid(BIDDER_B, 100, 1000),
            Err(LedgerError::NoActiveSale(ASSET))
        );
        assert_eq!(h.bank.balance_of(&BIDDER_B), 1_000_000);
    }

    #[test]
    fn test_outbid_refunds_previous_bidder() {
        let mut h = Harness::new();
        h.open(3600, 10_000, 50).unwrap();
        h.bid(BIDDER_B, 10_000, 1000).unwrap();

        // 10_000 * 1.005 = 10_050
        assert_eq!(
            h.bid(BIDDER_C, 10_049, 1500),
            Err(LedgerError::BidTooLow {
                required: 10_050,
                got: 10_049
            })
        );
        h.bid(BIDDER_C, 10_050, 1500).unwrap();

        assert_eq!(h.bank.balance_of(&BIDDER_B), 1_000_000);
        assert_eq!(h.bank.balance_of(&BIDDER_C), 1_000_000 - 10_050);
        assert_eq!(h.bank.balance_of(&LEDGER), 10_050);
        assert_eq!(h.state.escrow_balance, 10_050);
        assert_eq!(h.state.get_bid(ASSET).unwrap().bidder, BIDDER_C);
        // The countdown does not restart
        assert_eq!(h.state.get_sale(ASSET).unwrap().start_time, Some(1000));
    }

    #[test]
    fn test_bid_window_boundaries() {
        let mut h = Harness::new();
        h.open(100, 1000, 100).unwrap();
        h.bid(BIDDER_B, 1000, 1000).unwrap();

        // Last second of the window is still open
        h.bid(BIDDER_C, 1010, 1100).unwrap();
        assert_eq!(
            h.bid(BIDDER_B, 2000, 1101),
            Err(LedgerError::AuctionExpired(ASSET))
        );
    }

    #[test]
    fn test_failed_refund_rejects_new_bid() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();
        h.bid(BIDDER_B, 100, 1000).unwrap();
        h.bank.set_rejecting(BIDDER_B, true);

        assert_eq!(
            h.bid(BIDDER_C, 200, 1001),
            Err(LedgerError::RefundFailed(FundsError::Rejected))
        );
        assert_eq!(h.state.get_bid(ASSET).unwrap().bidder, BIDDER_B);
        assert_eq!(h.state.escrow_balance, 100);
        assert_eq!(h.bank.balance_of(&BIDDER_C), 1_000_000);
    }

    #[test]
    fn test_settle() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();
        h.bid(BIDDER_B, 100, 1000).unwrap();

        assert_eq!(
            h.settle(4600),
            Err(LedgerError::NotYetEnded {
                asset_id: ASSET,
                deadline: 4600
            })
        );

        let settlement = h.settle(4601).unwrap();
        assert_eq!(settlement.buyer, BIDDER_B);
        assert_eq!(settlement.seller, SELLER);
        assert_eq!(settlement.price, 100);

        assert_eq!(h.registry.owner_of(ASSET), Some(BIDDER_B));
        assert_eq!(h.bank.balance_of(&SELLER), 100);
        assert_eq!(h.bank.balance_of(&LEDGER), 0);
        assert_eq!(h.state.escrow_balance, 0);
        assert!(h.state.get_sale(ASSET).is_none());
        assert!(h.state.get_bid(ASSET).is_none());
        assert_eq!(
            h.state.events.last(),
            Some(&LedgerEvent::Purchased {
                seller: SELLER,
                buyer: BIDDER_B,
                asset_id: ASSET,
                price: 100,
            })
        );
    }

    #[test]
    fn test_settle_without_bids() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();

        // Unstarted sales count their window from time zero
        assert!(matches!(
            h.settle(3600),
            Err(LedgerError::NotYetEnded { deadline: 3600, .. })
        ));
        assert_eq!(h.settle(3601), Err(LedgerError::NoBids(ASSET)));
        // Unknown assets fail the same way
        let ctx = CallContext::new(SELLER, 10);
        let result = handle_settle(&mut h.state, &mut h.registry, &mut h.channel, &ctx, 99);
        assert_eq!(result, Err(LedgerError::NoBids(99)));
    }

    #[test]
    fn test_failed_payout_keeps_asset() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();
        h.bid(BIDDER_B, 100, 1000).unwrap();
        h.bank.set_rejecting(SELLER, true);

        assert_eq!(
            h.settle(5000),
            Err(LedgerError::PayoutFailed(FundsError::Rejected))
        );
        assert_eq!(h.registry.owner_of(ASSET), Some(LEDGER));
        assert!(h.state.get_sale(ASSET).is_some());
        assert!(h.state.get_bid(ASSET).is_some());
        assert_eq!(h.bank.balance_of(&LEDGER), 100);

        h.bank.set_rejecting(SELLER, false);
        h.settle(5000).unwrap();
        assert_eq!(h.registry.owner_of(ASSET), Some(BIDDER_B));
    }

    #[test]
    fn test_asset_reusable_after_settlement() {
        let mut h = Harness::new();
        h.open(10, 100, 50).unwrap();
        h.bid(BIDDER_B, 100, 1000).unwrap();
        h.settle(1011).unwrap();

        // The buyer can list the same asset again
        h.registry.set_approval_for_all(BIDDER_B, LEDGER, true);
        let ctx = CallContext::new(BIDDER_B, 2000);
        handle_open_sale(&mut h.state, &mut h.registry, &ctx, ASSET, 60, 500, 10).unwrap();
        assert_eq!(h.state.get_sale(ASSET).unwrap().seller, BIDDER_B);
    }

    #[test]
    fn test_zero_address_cannot_sell_or_bid() {
        let mut h = Harness::new();
        let ctx = CallContext::new(ZERO_ADDRESS, 100);
        let result = handle_open_sale(&mut h.state, &mut h.registry, &ctx, ASSET, 3600, 100, 50);
        assert_eq!(result, Err(LedgerError::ZeroAddressCaller));

        h.open(3600, 100, 50).unwrap();
        h.bank.credit(ZERO_ADDRESS, 1_000).unwrap();
        assert_eq!(
            h.bid(ZERO_ADDRESS, 100, 1000),
            Err(LedgerError::ZeroAddressCaller)
        );
        assert!(h.state.get_bid(ASSET).is_none());
        assert_eq!(h.bank.balance_of(&ZERO_ADDRESS), 1_000);
        assert_eq!(h.bank.balance_of(&LEDGER), 0);
    }

    #[test]
    fn test_settle_checks_recipient_before_payout() {
        let mut h = Harness::new();
        h.open(3600, 100, 50).unwrap();
        h.bid(BIDDER_B, 100, 1000).unwrap();
        // A winner the registry cannot deliver to
        h.state.bids.insert(
            ASSET,
            BidState {
                bidder: ZERO_ADDRESS,
                amount: 100,
            },
        );

        assert_eq!(
            h.settle(5000),
            Err(LedgerError::TransferUnauthorized(CustodyError::ZeroAddress))
        );
        assert_eq!(h.bank.balance_of(&SELLER), 0);
        assert_eq!(h.bank.balance_of(&LEDGER), 100);
        assert_eq!(h.state.escrow_balance, 100);
        assert_eq!(h.registry.owner_of(ASSET), Some(LEDGER));
    }

    #[test]
    fn test_non_bid_calls_reject_value() {
        let mut h = Harness::new();
        let paid = CallContext::new(SELLER, 100).with_value(300);

        let result = handle_open_sale(&mut h.state, &mut h.registry, &paid, ASSET, 3600, 100, 50);
        assert_eq!(result, Err(LedgerError::UnexpectedValue(300)));
        assert_eq!(h.registry.owner_of(ASSET), Some(SELLER));

        h.open(3600, 100, 50).unwrap();
        let result = handle_cancel_sale(&mut h.state, &mut h.registry, &paid, ASSET);
        assert_eq!(result, Err(LedgerError::UnexpectedValue(300)));
        assert!(h.state.get_sale(ASSET).is_some());

        h.bid(BIDDER_B, 100, 1000).unwrap();
        let paid = CallContext::new(BIDDER_C, 5000).with_value(1);
        let result = handle_settle(&mut h.state, &mut h.registry, &mut h.channel, &paid, ASSET);
        assert_eq!(result, Err(LedgerError::UnexpectedValue(1)));
        assert_eq!(h.bank.balance_of(&SELLER), 0);
        assert_eq!(h.state.escrow_balance, 100);
    }

    /// Registry that refuses to let the ledger hand assets out.
    struct FrozenReleases(InMemoryAssetRegistry);

    impl AssetCustodian for FrozenReleases {
        fn transfer_asset(
            &mut self,
            operator: &Address,
            asset_id: AssetId,
            from: &Address,
            to: &Address,
        ) -> Result<(), CustodyError> {
            if *from == LEDGER {
                return Err(CustodyError::NotApproved(asset_id));
            }
            self.0.transfer_asset(operator, asset_id, from, to)
        }

        fn owner_of(&self, asset_id: AssetId) -> Option<Address> {
            self.0.owner_of(asset_id)
        }
    }

    #[test]
    fn test_release_failure_after_payout_cannot_repeat() {
        let mut h = Harness::new();
        h.registry.mint(8, SELLER).unwrap();
        h.open(10, 100, 50).unwrap();
        let ctx = CallContext::new(SELLER, 100);
        handle_open_sale(&mut h.state, &mut h.registry, &ctx, 8, 10, 100, 50).unwrap();

        h.bid(BIDDER_B, 100, 1000).unwrap();
        h.bank.transfer(&BIDDER_C, &LEDGER, 100).unwrap();
        let ctx = CallContext::new(BIDDER_C, 1000).with_value(100);
        handle_bid(&mut h.state, &mut h.channel, &ctx, 8, 100).unwrap();
        assert_eq!(h.state.escrow_balance, 200);

        let mut frozen = FrozenReleases(h.registry.clone());
        let ctx = CallContext::new([5u8; 32], 2000);
        let result = handle_settle(&mut h.state, &mut frozen, &mut h.channel, &ctx, ASSET);
        assert_eq!(
            result,
            Err(LedgerError::TransferUnauthorized(CustodyError::NotApproved(ASSET)))
        );
        assert_eq!(h.bank.balance_of(&SELLER), 100);
        assert_eq!(h.state.escrow_balance, 100);
        assert_eq!(h.bank.balance_of(&LEDGER), 100);

        // The paid-out auction is gone, so the seller cannot be paid twice
        let result = handle_settle(&mut h.state, &mut frozen, &mut h.channel, &ctx, ASSET);
        assert_eq!(result, Err(LedgerError::NoBids(ASSET)));
        assert_eq!(h.bank.balance_of(&SELLER), 100);

        // The other auction's escrow is intact
        let settlement = h.settle_asset(8, 2000).unwrap();
        assert_eq!(settlement.buyer, BIDDER_C);
        assert_eq!(h.bank.balance_of(&SELLER), 200);
        assert_eq!(h.bank.balance_of(&LEDGER), 0);
        assert_eq!(h.state.escrow_balance, 0);
    }
}
