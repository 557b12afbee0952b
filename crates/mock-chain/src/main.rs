//! Mock chain server for local testing of the auction ledger.
//!
//! This provides a JSON-RPC server that hosts one ledger together with an
//! in-memory asset registry and bank, without requiring a real blockchain.

use anyhow::{Context, Result};
use clap::Parser;
use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::Server;
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use auction_ledger::{
    queries, AssetCustodian, AuctionLedger, BankChannel, CallContext, HandlerResult,
    InMemoryAssetRegistry, InMemoryBank, LedgerCall, LedgerGenesisConfig,
};
use auction_types::{Address, Amount};

mod types;
use types::*;

type DevnetLedger = AuctionLedger<InMemoryAssetRegistry, BankChannel>;

#[derive(Parser)]
#[command(name = "mock-chain")]
#[command(about = "Local JSON-RPC devnet hosting an auction ledger")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:9944")]
    listen: SocketAddr,

    /// Genesis file (JSON)
    #[arg(long)]
    genesis: Option<PathBuf>,
}

/// Shared chain state.
struct ChainState {
    /// Ledger under test
    ledger: DevnetLedger,
    /// Handle on the asset registry the ledger uses
    registry: InMemoryAssetRegistry,
    /// Handle on the bank the ledger uses
    bank: InMemoryBank,
    /// Current block height (simulated)
    block_height: u64,
    /// Current timestamp (simulated, can be advanced)
    timestamp: u64,
    block_time: u64,
}

impl ChainState {
    fn from_genesis(genesis: &ChainGenesis) -> Result<Self, String> {
        let ledger_address = match &genesis.ledger_address {
            Some(addr) => parse_address(addr)?,
            None => DEFAULT_LEDGER_ADDRESS,
        };

        let registry = InMemoryAssetRegistry::new();
        for asset in &genesis.assets {
            registry
                .mint(asset.asset_id, parse_address(&asset.owner)?)
                .map_err(|e| e.to_string())?;
        }

        let bank = InMemoryBank::new();
        for balance in &genesis.balances {
            bank.credit(
                parse_address(&balance.account)?,
                parse_amount(&balance.amount)?,
            )
            .map_err(|e| e.to_string())?;
        }

        let ledger = AuctionLedger::new(
            &LedgerGenesisConfig::new(ledger_address),
            registry.clone(),
            bank.channel(ledger_address),
        )
        .map_err(|e| e.to_string())?;

        Ok(Self {
            ledger,
            registry,
            bank,
            block_height: 0,
            timestamp: genesis.initial_timestamp,
            block_time: genesis.block_time,
        })
    }

    fn advance_block(&mut self) {
        self.block_height += 1;
        self.timestamp = self.timestamp.saturating_add(self.block_time);
    }

    fn set_timestamp(&mut self, ts: u64) {
        self.timestamp = ts;
    }

    fn block_info(&self) -> BlockInfo {
        BlockInfo {
            height: self.block_height,
            timestamp: self.timestamp,
        }
    }

    /// Run a ledger call with `value` attached.
    ///
    /// The value moves from the sender to the ledger before the call and is
    /// moved back if the call fails.
    fn call_with_value<R>(
        &self,
        sender: Address,
        value: Amount,
        f: impl FnOnce(&DevnetLedger, &CallContext) -> HandlerResult<R>,
    ) -> Result<R, ErrorObjectOwned> {
        let ledger_address = self.ledger.address();
        if value > 0 {
            self.bank
                .transfer(&sender, &ledger_address, value)
                .map_err(|e| rpc_error(&format!("Failed to attach value: {}", e)))?;
        }

        let ctx = CallContext::new(sender, self.timestamp).with_value(value);
        let result = f(&self.ledger, &ctx);

        if result.is_err() && value > 0 {
            if let Err(e) = self.bank.revert_transfer(&ledger_address, &sender, value) {
                error!(error = %e, "Failed to return attached value");
            }
        }
        result.map_err(|e| rpc_error(&format!("{}: {}", e.kind(), e)))
    }
}

/// RPC API definition for the mock chain.
#[rpc(server)]
pub trait MockChainApi {
    // ============ Admin Methods ============

    /// Reset the chain to a fresh genesis.
    #[method(name = "admin_init")]
    async fn admin_init(&self, config: ChainGenesis) -> Result<bool, ErrorObjectOwned>;

    /// Advance the chain by one block.
    #[method(name = "admin_advanceBlock")]
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Set the current timestamp (for testing time-dependent logic).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    /// Mint a new asset.
    #[method(name = "admin_mint")]
    async fn admin_mint(&self, asset_id: u64, owner: String) -> Result<bool, ErrorObjectOwned>;

    /// Credit native currency to an account; returns the new balance.
    #[method(name = "admin_fund")]
    async fn admin_fund(&self, account: String, amount: String)
        -> Result<String, ErrorObjectOwned>;

    /// Make an account refuse incoming payments.
    #[method(name = "admin_setRejectPayments")]
    async fn admin_set_reject_payments(
        &self,
        account: String,
        reject: bool,
    ) -> Result<bool, ErrorObjectOwned>;

    // ============ Registry Methods ============

    /// Approve an operator for one asset.
    #[method(name = "registry_approve")]
    async fn registry_approve(
        &self,
        owner: String,
        asset_id: u64,
        operator: String,
    ) -> Result<bool, ErrorObjectOwned>;

    /// Approve or revoke an operator for all assets of an owner.
    #[method(name = "registry_setApprovalForAll")]
    async fn registry_set_approval_for_all(
        &self,
        owner: String,
        operator: String,
        approved: bool,
    ) -> Result<bool, ErrorObjectOwned>;

    // ============ Auction Methods ============

    /// Deposit an asset and open its sale.
    #[method(name = "auction_openSale")]
    async fn auction_open_sale(&self, params: OpenSaleParams) -> Result<bool, ErrorObjectOwned>;

    /// Withdraw an asset without bids.
    #[method(name = "auction_cancelSale")]
    async fn auction_cancel_sale(
        &self,
        sender: String,
        asset_id: u64,
    ) -> Result<bool, ErrorObjectOwned>;

    /// Place a bid with attached value.
    #[method(name = "auction_bid")]
    async fn auction_bid(&self, params: BidParams) -> Result<bool, ErrorObjectOwned>;

    /// Settle an ended auction.
    #[method(name = "auction_settle")]
    async fn auction_settle(
        &self,
        sender: String,
        asset_id: u64,
    ) -> Result<SettlementRpc, ErrorObjectOwned>;

    /// Submit a borsh-encoded call.
    #[method(name = "auction_submitCall")]
    async fn auction_submit_call(
        &self,
        params: SubmitCallParams,
    ) -> Result<CallOutcomeRpc, ErrorObjectOwned>;

    // ============ Query Methods ============

    /// Get current block info.
    #[method(name = "chain_getBlockInfo")]
    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Get the ledger account address.
    #[method(name = "chain_getLedgerAddress")]
    async fn chain_get_ledger_address(&self) -> Result<String, ErrorObjectOwned>;

    /// Get a sale by asset.
    #[method(name = "query_getSale")]
    async fn query_get_sale(&self, asset_id: u64) -> Result<Option<SaleRpc>, ErrorObjectOwned>;

    /// Get the winning bid by asset.
    #[method(name = "query_getBid")]
    async fn query_get_bid(&self, asset_id: u64) -> Result<Option<BidRpc>, ErrorObjectOwned>;

    /// Get the phase of an asset at the current time.
    #[method(name = "query_getPhase")]
    async fn query_get_phase(&self, asset_id: u64) -> Result<PhaseRpc, ErrorObjectOwned>;

    /// List sales.
    #[method(name = "query_listSales")]
    async fn query_list_sales(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<SaleRpc>, ErrorObjectOwned>;

    /// Read the event log.
    #[method(name = "query_getEvents")]
    async fn query_get_events(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned>;

    /// Get the funds escrowed for winning bids.
    #[method(name = "query_getEscrowBalance")]
    async fn query_get_escrow_balance(&self) -> Result<String, ErrorObjectOwned>;

    /// Get the owner of an asset.
    #[method(name = "query_ownerOf")]
    async fn query_owner_of(&self, asset_id: u64) -> Result<Option<String>, ErrorObjectOwned>;

    /// Get the native balance of an account.
    #[method(name = "query_balanceOf")]
    async fn query_balance_of(&self, account: String) -> Result<String, ErrorObjectOwned>;

    /// Get assets ready for settlement.
    #[method(name = "query_getSettleable")]
    async fn query_get_settleable(&self) -> Result<Vec<u64>, ErrorObjectOwned>;
}

/// Implementation of the mock chain RPC server.
struct MockChainServer {
    state: Arc<RwLock<ChainState>>,
}

impl MockChainServer {
    fn new(genesis: &ChainGenesis) -> Result<Self> {
        let state = ChainState::from_genesis(genesis).map_err(anyhow::Error::msg)?;
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }
}

fn rpc_error(msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(-32000, msg.to_string(), None::<()>)
}

fn address_param(s: &str) -> Result<Address, ErrorObjectOwned> {
    parse_address(s).map_err(|e| rpc_error(&e))
}

fn amount_param(s: &str) -> Result<Amount, ErrorObjectOwned> {
    parse_amount(s).map_err(|e| rpc_error(&e))
}

#[async_trait]
impl MockChainApiServer for MockChainServer {
    async fn admin_init(&self, config: ChainGenesis) -> Result<bool, ErrorObjectOwned> {
        let fresh = ChainState::from_genesis(&config).map_err(|e| rpc_error(&e))?;
        *self.state.write() = fresh;
        info!(
            assets = config.assets.len(),
            accounts = config.balances.len(),
            "Chain initialized"
        );
        Ok(true)
    }

    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.advance_block();
        Ok(state.block_info())
    }

    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.set_timestamp(timestamp);
        info!("Timestamp set to {}", timestamp);
        Ok(true)
    }

    async fn admin_mint(&self, asset_id: u64, owner: String) -> Result<bool, ErrorObjectOwned> {
        let owner = address_param(&owner)?;
        let state = self.state.read();
        state
            .registry
            .mint(asset_id, owner)
            .map_err(|e| rpc_error(&format!("Failed to mint: {}", e)))?;
        info!(asset_id, "Asset minted");
        Ok(true)
    }

    async fn admin_fund(
        &self,
        account: String,
        amount: String,
    ) -> Result<String, ErrorObjectOwned> {
        let account = address_param(&account)?;
        let amount = amount_param(&amount)?;
        let state = self.state.read();
        state
            .bank
            .credit(account, amount)
            .map_err(|e| rpc_error(&format!("Failed to fund: {}", e)))?;
        Ok(state.bank.balance_of(&account).to_string())
    }

    async fn admin_set_reject_payments(
        &self,
        account: String,
        reject: bool,
    ) -> Result<bool, ErrorObjectOwned> {
        let account = address_param(&account)?;
        self.state.read().bank.set_rejecting(account, reject);
        Ok(true)
    }

    async fn registry_approve(
        &self,
        owner: String,
        asset_id: u64,
        operator: String,
    ) -> Result<bool, ErrorObjectOwned> {
        let owner = address_param(&owner)?;
        let operator = address_param(&operator)?;
        let state = self.state.read();
        state
            .registry
            .approve(&owner, asset_id, operator)
            .map_err(|e| rpc_error(&format!("Failed to approve: {}", e)))?;
        Ok(true)
    }

    async fn registry_set_approval_for_all(
        &self,
        owner: String,
        operator: String,
        approved: bool,
    ) -> Result<bool, ErrorObjectOwned> {
        let owner = address_param(&owner)?;
        let operator = address_param(&operator)?;
        self.state
            .read()
            .registry
            .set_approval_for_all(owner, operator, approved);
        Ok(true)
    }

    async fn auction_open_sale(&self, params: OpenSaleParams) -> Result<bool, ErrorObjectOwned> {
        let sender = address_param(&params.sender)?;
        let reserve_price = amount_param(&params.reserve_price)?;
        let state = self.state.read();
        state.call_with_value(sender, 0, |ledger, ctx| {
            ledger.open_sale(
                ctx,
                params.asset_id,
                params.duration,
                reserve_price,
                params.bid_increment,
            )
        })?;
        Ok(true)
    }

    async fn auction_cancel_sale(
        &self,
        sender: String,
        asset_id: u64,
    ) -> Result<bool, ErrorObjectOwned> {
        let sender = address_param(&sender)?;
        let state = self.state.read();
        state.call_with_value(sender, 0, |ledger, ctx| ledger.cancel_sale(ctx, asset_id))?;
        Ok(true)
    }

    async fn auction_bid(&self, params: BidParams) -> Result<bool, ErrorObjectOwned> {
        let sender = address_param(&params.sender)?;
        let amount = amount_param(&params.amount)?;
        let value = match &params.value {
            Some(v) => amount_param(v)?,
            None => amount,
        };
        let state = self.state.read();
        state.call_with_value(sender, value, |ledger, ctx| {
            ledger.bid(ctx, params.asset_id, amount)
        })?;
        Ok(true)
    }

    async fn auction_settle(
        &self,
        sender: String,
        asset_id: u64,
    ) -> Result<SettlementRpc, ErrorObjectOwned> {
        let sender = address_param(&sender)?;
        let state = self.state.read();
        let settlement =
            state.call_with_value(sender, 0, |ledger, ctx| ledger.settle(ctx, asset_id))?;
        Ok(SettlementRpc::from(settlement))
    }

    async fn auction_submit_call(
        &self,
        params: SubmitCallParams,
    ) -> Result<CallOutcomeRpc, ErrorObjectOwned> {
        let sender = address_param(&params.sender)?;
        let value = match &params.value {
            Some(v) => amount_param(v)?,
            None => 0,
        };
        let bytes = hex::decode(params.call.trim_start_matches("0x"))
            .map_err(|e| rpc_error(&format!("Invalid call hex: {}", e)))?;
        let call = LedgerCall::decode(&bytes)
            .map_err(|e| rpc_error(&format!("Invalid call encoding: {}", e)))?;

        info!(call = call.name(), asset_id = call.asset_id(), "Call submitted");
        let state = self.state.read();
        let outcome =
            state.call_with_value(sender, value, |ledger, ctx| ledger.dispatch(ctx, call))?;
        Ok(CallOutcomeRpc::from(outcome))
    }

    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        Ok(self.state.read().block_info())
    }

    async fn chain_get_ledger_address(&self) -> Result<String, ErrorObjectOwned> {
        Ok(hex::encode(self.state.read().ledger.address()))
    }

    async fn query_get_sale(&self, asset_id: u64) -> Result<Option<SaleRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        state
            .ledger
            .read(|ledger| {
                ledger.get_sale(asset_id).map(|sale| {
                    let summary =
                        queries::SaleSummary::from_records(asset_id, sale, ledger.get_bid(asset_id));
                    SaleRpc::from(&summary)
                })
            })
            .map_err(|e| rpc_error(&e.to_string()))
    }

    async fn query_get_bid(&self, asset_id: u64) -> Result<Option<BidRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        state
            .ledger
            .read(|ledger| ledger.get_bid(asset_id).map(BidRpc::from))
            .map_err(|e| rpc_error(&e.to_string()))
    }

    async fn query_get_phase(&self, asset_id: u64) -> Result<PhaseRpc, ErrorObjectOwned> {
        let state = self.state.read();
        let now = state.timestamp;
        state
            .ledger
            .read(|ledger| PhaseRpc::from(ledger.phase(asset_id, now)))
            .map_err(|e| rpc_error(&e.to_string()))
    }

    async fn query_list_sales(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<SaleRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        state
            .ledger
            .read(|ledger| {
                queries::get_sale_summaries(ledger, offset as usize, limit as usize)
                    .iter()
                    .map(SaleRpc::from)
                    .collect()
            })
            .map_err(|e| rpc_error(&e.to_string()))
    }

    async fn query_get_events(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        state
            .ledger
            .read(|ledger| {
                ledger
                    .events
                    .iter()
                    .skip(offset as usize)
                    .take(limit as usize)
                    .map(EventRpc::from)
                    .collect()
            })
            .map_err(|e| rpc_error(&e.to_string()))
    }

    async fn query_get_escrow_balance(&self) -> Result<String, ErrorObjectOwned> {
        let state = self.state.read();
        state
            .ledger
            .read(|ledger| ledger.escrow_balance.to_string())
            .map_err(|e| rpc_error(&e.to_string()))
    }

    async fn query_owner_of(&self, asset_id: u64) -> Result<Option<String>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state.registry.owner_of(asset_id).map(hex::encode))
    }

    async fn query_balance_of(&self, account: String) -> Result<String, ErrorObjectOwned> {
        let account = address_param(&account)?;
        Ok(self.state.read().bank.balance_of(&account).to_string())
    }

    async fn query_get_settleable(&self) -> Result<Vec<u64>, ErrorObjectOwned> {
        let state = self.state.read();
        let now = state.timestamp;
        state
            .ledger
            .read(|ledger| queries::get_pending_settlement(ledger, now))
            .map_err(|e| rpc_error(&e.to_string()))
    }
}

fn load_genesis(path: Option<&PathBuf>) -> Result<ChainGenesis> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read genesis file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse genesis file {}", path.display()))
        }
        None => Ok(ChainGenesis::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mock_chain=info".parse()?)
                .add_directive("auction_ledger=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let genesis = load_genesis(args.genesis.as_ref())?;

    info!("Starting mock chain server on {}", args.listen);

    let server = Server::builder().build(args.listen).await?;
    let handle = server.start(MockChainServer::new(&genesis)?.into_rpc());

    info!("Mock chain server running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> String {
        hex::encode([byte; 32])
    }

    fn genesis() -> ChainGenesis {
        ChainGenesis {
            initial_timestamp: 1_000,
            block_time: 12,
            ledger_address: None,
            balances: vec![GenesisBalance {
                account: addr(2),
                amount: "500".to_string(),
            }],
            assets: vec![GenesisAsset {
                asset_id: 1,
                owner: addr(1),
            }],
        }
    }

    #[test]
    fn test_genesis_state() {
        let state = ChainState::from_genesis(&genesis()).unwrap();
        assert_eq!(state.timestamp, 1_000);
        assert_eq!(state.registry.owner_of(1), Some([1u8; 32]));
        assert_eq!(state.bank.balance_of(&[2u8; 32]), 500);
        assert_eq!(state.ledger.address(), DEFAULT_LEDGER_ADDRESS);
    }

    #[test]
    fn test_genesis_rejects_bad_address() {
        let mut bad = genesis();
        bad.assets[0].owner = "1234".to_string();
        assert!(ChainState::from_genesis(&bad).is_err());
    }

    #[test]
    fn test_advance_block() {
        let mut state = ChainState::from_genesis(&genesis()).unwrap();
        state.advance_block();
        let info = state.block_info();
        assert_eq!(info.height, 1);
        assert_eq!(info.timestamp, 1_012);
    }

    #[test]
    fn test_failed_call_returns_value() {
        let state = ChainState::from_genesis(&genesis()).unwrap();
        let bidder = [2u8; 32];

        // No sale is open, so the bid fails and the value comes back
        let result = state.call_with_value(bidder, 100, |ledger, ctx| ledger.bid(ctx, 1, 100));
        assert!(result.is_err());
        assert_eq!(state.bank.balance_of(&bidder), 500);
        assert_eq!(state.bank.balance_of(&DEFAULT_LEDGER_ADDRESS), 0);
    }

    #[test]
    fn test_value_attached_to_accepted_bid() {
        let state = ChainState::from_genesis(&genesis()).unwrap();
        let seller = [1u8; 32];
        let bidder = [2u8; 32];
        state
            .registry
            .set_approval_for_all(seller, DEFAULT_LEDGER_ADDRESS, true);

        state
            .call_with_value(seller, 0, |ledger, ctx| ledger.open_sale(ctx, 1, 60, 100, 50))
            .unwrap();
        state
            .call_with_value(bidder, 150, |ledger, ctx| ledger.bid(ctx, 1, 150))
            .unwrap();

        assert_eq!(state.bank.balance_of(&bidder), 350);
        assert_eq!(state.bank.balance_of(&DEFAULT_LEDGER_ADDRESS), 150);
    }

    #[test]
    fn test_value_on_open_sale_is_returned() {
        let state = ChainState::from_genesis(&genesis()).unwrap();
        let seller = [1u8; 32];
        state.bank.credit(seller, 500).unwrap();
        state
            .registry
            .set_approval_for_all(seller, DEFAULT_LEDGER_ADDRESS, true);

        let call = LedgerCall::OpenSale {
            asset_id: 1,
            duration: 60,
            reserve_price: 100,
            bid_increment: 50,
        };
        let result = state.call_with_value(seller, 300, |ledger, ctx| ledger.dispatch(ctx, call));
        assert!(result.is_err());
        assert_eq!(state.bank.balance_of(&seller), 500);
        assert_eq!(state.bank.balance_of(&DEFAULT_LEDGER_ADDRESS), 0);
        assert_eq!(state.registry.owner_of(1), Some(seller));
    }
}
