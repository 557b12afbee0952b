//! Typed access to the devnet JSON-RPC API.

use anyhow::{anyhow, Result};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::{Deserialize, Serialize};

use auction_types::{Address, Amount, AssetId};

use crate::bid::{parse_amount, PreparedBid};

/// Block info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

/// Sale as reported by the devnet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleView {
    pub asset_id: AssetId,
    pub seller: String,
    pub duration: u64,
    pub reserve_price: String,
    pub bid_increment: u32,
    pub start_time: Option<u64>,
    pub highest_bidder: Option<String>,
    pub highest_bid: Option<String>,
}

impl SaleView {
    pub fn reserve_price(&self) -> Result<Amount> {
        Ok(parse_amount(&self.reserve_price)?)
    }

    pub fn highest_bid(&self) -> Result<Option<Amount>> {
        Ok(self
            .highest_bid
            .as_deref()
            .map(parse_amount)
            .transpose()?)
    }
}

/// Winning bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidView {
    pub bidder: String,
    pub amount: String,
}

/// Lifecycle phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseView {
    pub phase: String,
    pub ends_at: Option<u64>,
}

/// Settlement receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementView {
    pub asset_id: AssetId,
    pub seller: String,
    pub buyer: String,
    pub price: String,
    pub settled_at: u64,
    pub settler: String,
}

/// Outcome of a submitted call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOutcomeView {
    pub outcome: String,
    pub settlement: Option<SettlementView>,
}

/// JSON-RPC client for the devnet.
pub struct LedgerRpcClient {
    client: HttpClient,
}

impl LedgerRpcClient {
    pub fn connect(url: &str) -> Result<Self> {
        let client = HttpClientBuilder::default().build(url)?;
        Ok(Self { client })
    }

    // ============ Admin ============

    pub async fn advance_block(&self) -> Result<BlockInfo> {
        Ok(self.client.request("admin_advanceBlock", rpc_params![]).await?)
    }

    pub async fn set_timestamp(&self, timestamp: u64) -> Result<()> {
        let _: bool = self
            .client
            .request("admin_setTimestamp", rpc_params![timestamp])
            .await?;
        Ok(())
    }

    pub async fn mint(&self, asset_id: AssetId, owner: &Address) -> Result<()> {
        let _: bool = self
            .client
            .request("admin_mint", rpc_params![asset_id, hex::encode(owner)])
            .await?;
        Ok(())
    }

    /// Credit `amount`; returns the new balance.
    pub async fn fund(&self, account: &Address, amount: Amount) -> Result<Amount> {
        let balance: String = self
            .client
            .request(
                "admin_fund",
                rpc_params![hex::encode(account), amount.to_string()],
            )
            .await?;
        Ok(parse_amount(&balance)?)
    }

    pub async fn set_reject_payments(&self, account: &Address, reject: bool) -> Result<()> {
        let _: bool = self
            .client
            .request(
                "admin_setRejectPayments",
                rpc_params![hex::encode(account), reject],
            )
            .await?;
        Ok(())
    }

    // ============ Registry ============

    pub async fn approve(&self, owner: &Address, asset_id: AssetId, operator: &Address) -> Result<()> {
        let _: bool = self
            .client
            .request(
                "registry_approve",
                rpc_params![hex::encode(owner), asset_id, hex::encode(operator)],
            )
            .await?;
        Ok(())
    }

    pub async fn set_approval_for_all(
        &self,
        owner: &Address,
        operator: &Address,
        approved: bool,
    ) -> Result<()> {
        let _: bool = self
            .client
            .request(
                "registry_setApprovalForAll",
                rpc_params![hex::encode(owner), hex::encode(operator), approved],
            )
            .await?;
        Ok(())
    }

    // ============ Auction ============

    pub async fn open_sale(
        &self,
        seller: &Address,
        asset_id: AssetId,
        duration: u64,
        reserve_price: Amount,
        bid_increment: u32,
    ) -> Result<()> {
        let params = serde_json::json!({
            "sender": hex::encode(seller),
            "asset_id": asset_id,
            "duration": duration,
            "reserve_price": reserve_price.to_string(),
            "bid_increment": bid_increment,
        });
        let _: bool = self
            .client
            .request("auction_openSale", rpc_params![params])
            .await?;
        Ok(())
    }

    pub async fn cancel_sale(&self, seller: &Address, asset_id: AssetId) -> Result<()> {
        let _: bool = self
            .client
            .request("auction_cancelSale", rpc_params![hex::encode(seller), asset_id])
            .await?;
        Ok(())
    }

    /// Place a bid, attaching `value` (the amount itself when `None`).
    pub async fn bid(
        &self,
        bidder: &Address,
        asset_id: AssetId,
        amount: Amount,
        value: Option<Amount>,
    ) -> Result<()> {
        let params = serde_json::json!({
            "sender": hex::encode(bidder),
            "asset_id": asset_id,
            "amount": amount.to_string(),
            "value": value.map(|v| v.to_string()),
        });
        let _: bool = self.client.request("auction_bid", rpc_params![params]).await?;
        Ok(())
    }

    pub async fn settle(&self, sender: &Address, asset_id: AssetId) -> Result<SettlementView> {
        Ok(self
            .client
            .request("auction_settle", rpc_params![hex::encode(sender), asset_id])
            .await?)
    }

    /// Submit a prepared bid as an encoded call.
    pub async fn submit_bid(&self, bidder: &Address, bid: &PreparedBid) -> Result<CallOutcomeView> {
        let params = serde_json::json!({
            "sender": hex::encode(bidder),
            "call": bid.call_hex(),
            "value": bid.amount.to_string(),
        });
        Ok(self
            .client
            .request("auction_submitCall", rpc_params![params])
            .await?)
    }

    // ============ Queries ============

    pub async fn block_info(&self) -> Result<BlockInfo> {
        Ok(self.client.request("chain_getBlockInfo", rpc_params![]).await?)
    }

    pub async fn ledger_address(&self) -> Result<Address> {
        let addr: String = self
            .client
            .request("chain_getLedgerAddress", rpc_params![])
            .await?;
        parse_address(&addr)
    }

    pub async fn sale(&self, asset_id: AssetId) -> Result<Option<SaleView>> {
        Ok(self
            .client
            .request("query_getSale", rpc_params![asset_id])
            .await?)
    }

    pub async fn winning_bid(&self, asset_id: AssetId) -> Result<Option<BidView>> {
        Ok(self.client.request("query_getBid", rpc_params![asset_id]).await?)
    }

    pub async fn phase(&self, asset_id: AssetId) -> Result<PhaseView> {
        Ok(self
            .client
            .request("query_getPhase", rpc_params![asset_id])
            .await?)
    }

    pub async fn list_sales(&self, offset: u64, limit: u64) -> Result<Vec<SaleView>> {
        Ok(self
            .client
            .request("query_listSales", rpc_params![offset, limit])
            .await?)
    }

    /// Raw event log entries, tagged by `event`.
    pub async fn events(&self, offset: u64, limit: u64) -> Result<Vec<serde_json::Value>> {
        Ok(self
            .client
            .request("query_getEvents", rpc_params![offset, limit])
            .await?)
    }

    pub async fn escrow_balance(&self) -> Result<Amount> {
        let balance: String = self
            .client
            .request("query_getEscrowBalance", rpc_params![])
            .await?;
        Ok(parse_amount(&balance)?)
    }

    pub async fn owner_of(&self, asset_id: AssetId) -> Result<Option<String>> {
        Ok(self
            .client
            .request("query_ownerOf", rpc_params![asset_id])
            .await?)
    }

    pub async fn balance_of(&self, account: &Address) -> Result<Amount> {
        let balance: String = self
            .client
            .request("query_balanceOf", rpc_params![hex::encode(account)])
            .await?;
        Ok(parse_amount(&balance)?)
    }

    pub async fn settleable(&self) -> Result<Vec<AssetId>> {
        Ok(self
            .client
            .request("query_getSettleable", rpc_params![])
            .await?)
    }
}

/// Parse a 32-byte hex address, with or without `0x` prefix.
pub fn parse_address(s: &str) -> Result<Address> {
    let bytes = hex::decode(s.trim_start_matches("0x"))?;
    bytes
        .try_into()
        .map_err(|_| anyhow!("Address must be 32 bytes"))
}
