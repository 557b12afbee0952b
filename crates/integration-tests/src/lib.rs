//! End-to-end integration tests for the auction ledger.
//!
//! These tests drive the ledger the way a host chain does:
//! 1. Assets are minted and the ledger is approved
//! 2. Bids move attached value into the ledger account before the call
//! 3. Failed calls hand the attached value back
//! 4. Settlement pays the seller and releases the asset
//!
//! They also cover re-entrant callbacks, concurrent callers and randomized
//! call sequences checked against the escrow invariants.

use std::sync::{Arc, Weak};

use auction_ledger::{
    AssetCustodian, AuctionLedger, BankChannel, CallContext, CallOutcome, FundsChannel,
    FundsError, HandlerResult, InMemoryAssetRegistry, InMemoryBank, LedgerCall,
    LedgerGenesisConfig, LedgerQuery, LedgerQueryResponse,
};
use auction_types::{Address, Amount, AssetId, Settlement};
use parking_lot::Mutex;

pub const LEDGER: Address = [0xee; 32];
pub const SELLER: Address = [1u8; 32];
pub const BIDDER_B: Address = [2u8; 32];
pub const BIDDER_C: Address = [3u8; 32];

/// 1.0 in the smallest currency unit
pub const ONE: Amount = 1_000_000_000_000_000_000;

/// Host chain around one ledger: registry, bank and value attachment.
pub struct Host<F> {
    pub registry: InMemoryAssetRegistry,
    pub bank: InMemoryBank,
    pub ledger: AuctionLedger<InMemoryAssetRegistry, F>,
}

impl Host<BankChannel> {
    pub fn new() -> Self {
        let bank = InMemoryBank::new();
        let channel = bank.channel(LEDGER);
        Host::with_channel(bank, channel)
    }
}

impl<F: FundsChannel> Host<F> {
    pub fn with_channel(bank: InMemoryBank, channel: F) -> Self {
        let registry = InMemoryAssetRegistry::new();
        let ledger =
            AuctionLedger::new(&LedgerGenesisConfig::new(LEDGER), registry.clone(), channel)
                .unwrap();
        Self {
            registry,
            bank,
            ledger,
        }
    }

    /// Mint `asset_id` to `owner` and let the ledger take it.
    pub fn mint_approved(&self, asset_id: AssetId, owner: Address) {
        self.registry.mint(asset_id, owner).unwrap();
        self.registry.approve(&owner, asset_id, LEDGER).unwrap();
    }

    pub fn open(
        &self,
        asset_id: AssetId,
        duration: u64,
        reserve: Amount,
        increment: u32,
        now: u64,
    ) -> HandlerResult<()> {
        self.ledger.open_sale(
            &CallContext::new(SELLER, now),
            asset_id,
            duration,
            reserve,
            increment,
        )
    }

    /// Bid with the amount attached as value.
    pub fn bid(
        &self,
        bidder: Address,
        asset_id: AssetId,
        amount: Amount,
        now: u64,
    ) -> HandlerResult<()> {
        self.bid_with_value(bidder, asset_id, amount, amount, now)
    }

    pub fn bid_with_value(
        &self,
        bidder: Address,
        asset_id: AssetId,
        amount: Amount,
        value: Amount,
        now: u64,
    ) -> HandlerResult<()> {
        self.submit(bidder, LedgerCall::Bid { asset_id, amount }, value, now)
            .map(|_| ())
    }

    /// Debit the attached value first and return it if the call fails.
    pub fn submit(
        &self,
        sender: Address,
        call: LedgerCall,
        value: Amount,
        now: u64,
    ) -> HandlerResult<CallOutcome> {
        self.bank.transfer(&sender, &LEDGER, value).unwrap();
        let ctx = CallContext::new(sender, now).with_value(value);
        let result = self.ledger.dispatch(&ctx, call);
        if result.is_err() {
            self.bank.revert_transfer(&LEDGER, &sender, value).unwrap();
        }
        result
    }

    pub fn settle(&self, settler: Address, asset_id: AssetId, now: u64) -> HandlerResult<Settlement> {
        self.ledger.settle(&CallContext::new(settler, now), asset_id)
    }

    pub fn escrow(&self) -> Amount {
        match self.ledger.query(LedgerQuery::GetEscrowBalance).unwrap() {
            LedgerQueryResponse::EscrowBalance(balance) => balance,
            other => panic!("unexpected response {:?}", other),
        }
    }

    /// Check the ledger's accounting against the registry and the bank.
    pub fn assert_consistent(&self) {
        let (escrow, outstanding, orphan_bids, sales) = self
            .ledger
            .read(|state| {
                let orphan_bids = state
                    .bids
                    .keys()
                    .filter(|asset_id| !state.sales.contains_key(*asset_id))
                    .count();
                let sales: Vec<AssetId> = state.sales.keys().copied().collect();
                (
                    state.escrow_balance,
                    state.outstanding_bids(),
                    orphan_bids,
                    sales,
                )
            })
            .unwrap();

        assert_eq!(escrow, outstanding, "escrow must equal the winning bids");
        assert_eq!(
            escrow,
            self.bank.balance_of(&LEDGER),
            "escrow must equal the ledger's funds"
        );
        assert_eq!(orphan_bids, 0, "bid without a sale");
        for asset_id in sales {
            assert_eq!(
                self.registry.owner_of(asset_id),
                Some(LEDGER),
                "asset {} under sale but not in custody",
                asset_id
            );
        }
    }
}

impl Default for Host<BankChannel> {
    fn default() -> Self {
        Self::new()
    }
}

pub type Hook = Box<dyn FnMut(&Address) + Send>;

/// Funds channel whose recipients run code when paid.
pub struct HookedChannel {
    inner: BankChannel,
    hook: Arc<Mutex<Option<Hook>>>,
}

impl HookedChannel {
    pub fn new(bank: &InMemoryBank) -> (Self, Arc<Mutex<Option<Hook>>>) {
        let hook = Arc::new(Mutex::new(None));
        (
            Self {
                inner: bank.channel(LEDGER),
                hook: hook.clone(),
            },
            hook,
        )
    }
}

impl FundsChannel for HookedChannel {
    fn send(&mut self, recipient: &Address, amount: Amount) -> Result<(), FundsError> {
        if let Some(hook) = self.hook.lock().as_mut() {
            hook(recipient);
        }
        self.inner.send(recipient, amount)
    }
}
