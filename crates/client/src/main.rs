//! CLI for interacting with the auction ledger devnet.
//!
//! This binary provides commands for:
//! - Opening and cancelling sales
//! - Bidding with attached value
//! - Settling ended auctions
//! - Querying sales, bids, balances and the event log

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use auction_client::bid::parse_amount;
use auction_client::query::parse_address;
use auction_client::{lowest_acceptable_bid, prepare_bid, LedgerRpcClient};

#[derive(Parser)]
#[command(name = "auction-cli")]
#[command(about = "CLI for escrow-backed English auctions")]
struct Cli {
    /// Mock chain RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:9944")]
    rpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint an asset (devnet only)
    Mint {
        #[arg(long)]
        asset_id: u64,

        /// Owner address (hex)
        #[arg(long)]
        owner: String,
    },

    /// Credit native currency to an account (devnet only)
    Fund {
        /// Account address (hex)
        #[arg(long)]
        account: String,

        /// Amount in the smallest unit
        #[arg(long)]
        amount: String,
    },

    /// Make an account refuse or accept incoming payments (devnet only)
    RejectPayments {
        #[arg(long)]
        account: String,

        #[arg(long)]
        reject: bool,
    },

    /// Approve the ledger to take custody of an asset
    Approve {
        /// Owner address (hex)
        #[arg(long)]
        owner: String,

        #[arg(long)]
        asset_id: u64,
    },

    /// Approve or revoke the ledger for every asset of an owner
    ApproveAll {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        revoke: bool,
    },

    /// Deposit an asset and open its sale
    OpenSale {
        /// Seller address (hex)
        #[arg(long)]
        sender: String,

        #[arg(long)]
        asset_id: u64,

        /// Bidding window in seconds, counted from the first bid
        #[arg(long)]
        duration: u64,

        /// Minimum first bid
        #[arg(long)]
        reserve_price: String,

        /// Minimum raise over the previous bid, in basis points
        #[arg(long, default_value = "50")]
        bid_increment: u32,
    },

    /// Withdraw an asset that has no bids
    CancelSale {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        asset_id: u64,
    },

    /// Place a bid
    Bid {
        /// Bidder address (hex)
        #[arg(long)]
        sender: String,

        #[arg(long)]
        asset_id: u64,

        /// Bid amount; defaults to the lowest acceptable bid
        #[arg(long)]
        amount: Option<String>,

        /// Value to attach when it should differ from the amount
        #[arg(long)]
        value: Option<String>,
    },

    /// Settle an ended auction
    Settle {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        asset_id: u64,
    },

    /// Get sale details
    GetSale {
        #[arg(long)]
        asset_id: u64,
    },

    /// List sales
    ListSales {
        #[arg(long, default_value = "0")]
        offset: u64,

        #[arg(long, default_value = "100")]
        limit: u64,
    },

    /// Print the event log
    Events {
        #[arg(long, default_value = "0")]
        offset: u64,

        #[arg(long, default_value = "100")]
        limit: u64,
    },

    /// Get the native balance of an account
    Balance {
        #[arg(long)]
        account: String,
    },

    /// Get the owner of an asset
    OwnerOf {
        #[arg(long)]
        asset_id: u64,
    },

    /// List auctions ready for settlement
    Settleable,

    /// Advance chain time (for testing)
    AdvanceBlock,

    /// Set chain timestamp (for testing)
    SetTimestamp {
        #[arg(long)]
        timestamp: u64,
    },
}

async fn bid_cmd(
    client: &LedgerRpcClient,
    sender: &str,
    asset_id: u64,
    amount: Option<&str>,
    value: Option<&str>,
) -> Result<()> {
    let bidder = parse_address(sender)?;
    let sale = client
        .sale(asset_id)
        .await?
        .ok_or_else(|| anyhow!("No sale for asset {}", asset_id))?;
    let required = lowest_acceptable_bid(
        sale.reserve_price()?,
        sale.bid_increment,
        sale.highest_bid()?,
    )?;

    let amount = match amount {
        Some(a) => parse_amount(a)?,
        None => required,
    };

    match value {
        // A mismatched value is sent as-is and left for the ledger to reject
        Some(v) => {
            client
                .bid(&bidder, asset_id, amount, Some(parse_amount(v)?))
                .await?;
        }
        None => {
            let prepared = prepare_bid(asset_id, amount, required)?;
            client.submit_bid(&bidder, &prepared).await?;
        }
    }

    info!(asset_id, amount = %amount, "Bid placed");
    println!("Bid placed");
    println!("  Asset: {}", asset_id);
    println!("  Amount: {}", amount);
    Ok(())
}

async fn get_sale_cmd(client: &LedgerRpcClient, asset_id: u64) -> Result<()> {
    match client.sale(asset_id).await? {
        Some(s) => {
            let phase = client.phase(asset_id).await?;
            println!("Sale for asset {}:", s.asset_id);
            println!("  Seller: {}", s.seller);
            println!("  Phase: {}", phase.phase);
            println!("  Reserve: {}", s.reserve_price);
            println!("  Increment: {} bp", s.bid_increment);
            println!("  Duration: {}s", s.duration);
            if let Some(ends_at) = phase.ends_at {
                println!("  Ends: {}", ends_at);
            }
            if let (Some(bidder), Some(bid)) = (&s.highest_bidder, &s.highest_bid) {
                println!("  Highest bid: {} by {}", bid, bidder);
            }
        }
        None => {
            println!("No sale for asset {}", asset_id);
        }
    }
    Ok(())
}

async fn list_sales_cmd(client: &LedgerRpcClient, offset: u64, limit: u64) -> Result<()> {
    let sales = client.list_sales(offset, limit).await?;
    if sales.is_empty() {
        println!("No sales found");
    } else {
        println!("Sales:");
        for s in sales {
            println!(
                "  [{}] reserve {} - highest {} ({})",
                s.asset_id,
                s.reserve_price,
                s.highest_bid.as_deref().unwrap_or("none"),
                s.seller
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("auction_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let client = LedgerRpcClient::connect(&cli.rpc)?;

    match cli.command {
        Commands::Mint { asset_id, owner } => {
            client.mint(asset_id, &parse_address(&owner)?).await?;
            println!("Minted asset {}", asset_id);
        }

        Commands::Fund { account, amount } => {
            let balance = client
                .fund(&parse_address(&account)?, parse_amount(&amount)?)
                .await?;
            println!("Balance: {}", balance);
        }

        Commands::RejectPayments { account, reject } => {
            client
                .set_reject_payments(&parse_address(&account)?, reject)
                .await?;
            println!("Payments {}", if reject { "rejected" } else { "accepted" });
        }

        Commands::Approve { owner, asset_id } => {
            let ledger = client.ledger_address().await?;
            client
                .approve(&parse_address(&owner)?, asset_id, &ledger)
                .await?;
            println!("Ledger approved for asset {}", asset_id);
        }

        Commands::ApproveAll { owner, revoke } => {
            let ledger = client.ledger_address().await?;
            client
                .set_approval_for_all(&parse_address(&owner)?, &ledger, !revoke)
                .await?;
            println!("Ledger approval {}", if revoke { "revoked" } else { "granted" });
        }

        Commands::OpenSale {
            sender,
            asset_id,
            duration,
            reserve_price,
            bid_increment,
        } => {
            client
                .open_sale(
                    &parse_address(&sender)?,
                    asset_id,
                    duration,
                    parse_amount(&reserve_price)?,
                    bid_increment,
                )
                .await?;
            info!(asset_id, "Sale opened");
            println!("Sale opened for asset {}", asset_id);
        }

        Commands::CancelSale { sender, asset_id } => {
            client
                .cancel_sale(&parse_address(&sender)?, asset_id)
                .await?;
            println!("Sale for asset {} cancelled", asset_id);
        }

        Commands::Bid {
            sender,
            asset_id,
            amount,
            value,
        } => {
            bid_cmd(
                &client,
                &sender,
                asset_id,
                amount.as_deref(),
                value.as_deref(),
            )
            .await?;
        }

        Commands::Settle { sender, asset_id } => {
            let s = client.settle(&parse_address(&sender)?, asset_id).await?;
            println!("Auction settled:");
            println!("  Asset: {}", s.asset_id);
            println!("  Buyer: {}", s.buyer);
            println!("  Price: {}", s.price);
            println!("  Seller: {}", s.seller);
        }

        Commands::GetSale { asset_id } => {
            get_sale_cmd(&client, asset_id).await?;
        }

        Commands::ListSales { offset, limit } => {
            list_sales_cmd(&client, offset, limit).await?;
        }

        Commands::Events { offset, limit } => {
            for (i, event) in client.events(offset, limit).await?.iter().enumerate() {
                println!("  [{}] {}", offset + i as u64, event);
            }
        }

        Commands::Balance { account } => {
            let balance = client.balance_of(&parse_address(&account)?).await?;
            println!("Balance: {}", balance);
        }

        Commands::OwnerOf { asset_id } => match client.owner_of(asset_id).await? {
            Some(owner) => println!("Owner: {}", owner),
            None => println!("Asset {} not minted", asset_id),
        },

        Commands::Settleable => {
            let assets = client.settleable().await?;
            if assets.is_empty() {
                println!("Nothing to settle");
            } else {
                println!("Settleable: {:?}", assets);
            }
        }

        Commands::AdvanceBlock => {
            let info = client.advance_block().await?;
            println!("Block advanced: height={}, timestamp={}", info.height, info.timestamp);
        }

        Commands::SetTimestamp { timestamp } => {
            client.set_timestamp(timestamp).await?;
            println!("Timestamp set to {}", timestamp);
        }
    }

    Ok(())
}
