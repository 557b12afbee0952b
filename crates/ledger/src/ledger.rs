//! Thread-safe entry point to the auction ledger.
//!
//! [`AuctionLedger`] owns the state together with its two external
//! collaborators. Every public operation runs behind one serialization point:
//! calls from other threads wait their turn, while a call that re-enters the
//! ledger from inside a transfer callback on the same thread is rejected with
//! [`LedgerError::ReentrantCall`].

use std::cell::{Cell, RefCell};

use auction_types::{Address, Amount, AssetId, Settlement};
use parking_lot::ReentrantMutex;
use tracing::warn;

use crate::call::{CallOutcome, LedgerCall};
use crate::custody::AssetCustodian;
use crate::error::LedgerError;
use crate::funds::FundsChannel;
use crate::genesis::{GenesisValidationError, LedgerGenesisConfig};
use crate::guard::CallGuard;
use crate::handlers::{self, CallContext, HandlerResult};
use crate::queries::{handle_query, LedgerQuery, LedgerQueryResponse};
use crate::state::LedgerState;

struct LedgerCore<C, F> {
    state: LedgerState,
    custodian: C,
    funds: F,
}

struct Serialized<C, F> {
    entered: Cell<bool>,
    core: RefCell<LedgerCore<C, F>>,
}

/// Auction ledger shared between callers.
pub struct AuctionLedger<C, F> {
    address: Address,
    inner: ReentrantMutex<Serialized<C, F>>,
}

impl<C: AssetCustodian, F: FundsChannel> AuctionLedger<C, F> {
    /// Create a ledger from its genesis configuration and collaborators.
    pub fn new(
        config: &LedgerGenesisConfig,
        custodian: C,
        funds: F,
    ) -> Result<Self, GenesisValidationError> {
        config.validate()?;
        Ok(Self {
            address: config.ledger_address,
            inner: ReentrantMutex::new(Serialized {
                entered: Cell::new(false),
                core: RefCell::new(LedgerCore {
                    state: LedgerState::new(config.ledger_address),
                    custodian,
                    funds,
                }),
            }),
        })
    }

    /// Address under which the ledger holds assets and funds.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn open_sale(
        &self,
        ctx: &CallContext,
        asset_id: AssetId,
        duration: u64,
        reserve_price: Amount,
        bid_increment: u32,
    ) -> HandlerResult<()> {
        self.transact("open_sale", |core| {
            handlers::handle_open_sale(
                &mut core.state,
                &mut core.custodian,
                ctx,
                asset_id,
                duration,
                reserve_price,
                bid_increment,
            )
        })
    }

    pub fn cancel_sale(&self, ctx: &CallContext, asset_id: AssetId) -> HandlerResult<()> {
        self.transact("cancel_sale", |core| {
            handlers::handle_cancel_sale(&mut core.state, &mut core.custodian, ctx, asset_id)
        })
    }

    pub fn bid(&self, ctx: &CallContext, asset_id: AssetId, amount: Amount) -> HandlerResult<()> {
        self.transact("bid", |core| {
            handlers::handle_bid(&mut core.state, &mut core.funds, ctx, asset_id, amount)
        })
    }

    pub fn settle(&self, ctx: &CallContext, asset_id: AssetId) -> HandlerResult<Settlement> {
        self.transact("settle", |core| {
            handlers::handle_settle(
                &mut core.state,
                &mut core.custodian,
                &mut core.funds,
                ctx,
                asset_id,
            )
        })
    }

    /// Route a call message to its handler.
    pub fn dispatch(&self, ctx: &CallContext, call: LedgerCall) -> HandlerResult<CallOutcome> {
        match call {
            LedgerCall::OpenSale {
                asset_id,
                duration,
                reserve_price,
                bid_increment,
            } => self
                .open_sale(ctx, asset_id, duration, reserve_price, bid_increment)
                .map(|()| CallOutcome::SaleOpened),
            LedgerCall::CancelSale { asset_id } => self
                .cancel_sale(ctx, asset_id)
                .map(|()| CallOutcome::SaleCancelled),
            LedgerCall::Bid { asset_id, amount } => self
                .bid(ctx, asset_id, amount)
                .map(|()| CallOutcome::BidAccepted),
            LedgerCall::Settle { asset_id } => {
                self.settle(ctx, asset_id).map(CallOutcome::Settled)
            }
        }
    }

    /// Answer a read-only query.
    pub fn query(&self, query: LedgerQuery) -> HandlerResult<LedgerQueryResponse> {
        self.read(|state| handle_query(state, query))
    }

    /// Run `f` against a consistent snapshot of the state.
    ///
    /// Fails with [`LedgerError::ReentrantCall`] when invoked from inside an
    /// in-flight call, where the state may be half-updated.
    pub fn read<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> HandlerResult<R> {
        let serialized = self.inner.lock();
        if serialized.entered.get() {
            warn!("Read during in-flight call rejected");
            return Err(LedgerError::ReentrantCall);
        }
        let core = serialized.core.borrow();
        Ok(f(&core.state))
    }

    fn transact<R>(
        &self,
        call: &'static str,
        f: impl FnOnce(&mut LedgerCore<C, F>) -> HandlerResult<R>,
    ) -> HandlerResult<R> {
        let serialized = self.inner.lock();
        let _guard = CallGuard::enter(&serialized.entered).map_err(|e| {
            warn!(call, "Re-entrant call rejected");
            e
        })?;
        let mut core = serialized.core.borrow_mut();
        f(&mut core).map_err(|e| {
            warn!(call, error = %e, "Call rejected");
            e
        })
    }
}
