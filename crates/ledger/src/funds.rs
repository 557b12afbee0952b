//! Native funds transfer primitive.
//!
//! The ledger pushes refunds and payouts through a [`FundsChannel`]. A send
//! either completes or fails; there is no retry and the caller treats failure
//! as a hard stop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use auction_types::{Address, Amount};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Errors reported by a funds transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FundsError {
    #[error("Recipient rejected the transfer")]
    Rejected,

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("Balance overflow")]
    Overflow,
}

/// Outgoing transfer of native currency held by the ledger.
pub trait FundsChannel {
    /// Send `amount` to `recipient`.
    fn send(&mut self, recipient: &Address, amount: Amount) -> Result<(), FundsError>;
}

#[derive(Debug, Default)]
struct BankInner {
    balances: HashMap<Address, Amount>,
    /// Accounts that refuse incoming transfers
    rejecting: HashSet<Address>,
}

impl BankInner {
    fn balance(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn move_balance(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<(), FundsError> {
        let available = self.balance(from);
        if available < amount {
            return Err(FundsError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }

        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or(FundsError::Overflow)?;
        self.balances.insert(*from, available - amount);
        self.balances.insert(*to, credited);
        debug!(amount = %amount, "Funds transferred");
        Ok(())
    }
}

/// In-memory native currency ledger.
///
/// Cloning yields another handle to the same balances.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBank {
    inner: Arc<Mutex<BankInner>>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.inner.lock().balance(account)
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> Amount {
        self.inner.lock().balances.values().sum()
    }

    /// Mint `amount` into `account`.
    pub fn credit(&self, account: Address, amount: Amount) -> Result<(), FundsError> {
        let mut inner = self.inner.lock();
        let balance = inner
            .balance(&account)
            .checked_add(amount)
            .ok_or(FundsError::Overflow)?;
        inner.balances.insert(account, balance);
        Ok(())
    }

    /// Make `account` refuse (or accept again) incoming transfers.
    pub fn set_rejecting(&self, account: Address, rejecting: bool) {
        let mut inner = self.inner.lock();
        if rejecting {
            inner.rejecting.insert(account);
        } else {
            inner.rejecting.remove(&account);
        }
    }

    /// Move `amount` from `from` to `to`.
    pub fn transfer(&self, from: &Address, to: &Address, amount: Amount) -> Result<(), FundsError> {
        let mut inner = self.inner.lock();
        if inner.rejecting.contains(to) {
            return Err(FundsError::Rejected);
        }
        inner.move_balance(from, to, amount)
    }

    /// Undo an earlier `transfer(to, from, amount)`.
    ///
    /// Rolling back is not a payment, so the rejection switch does not apply.
    pub fn revert_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), FundsError> {
        self.inner.lock().move_balance(from, to, amount)
    }

    /// Channel that sends from `source`'s balance.
    pub fn channel(&self, source: Address) -> BankChannel {
        BankChannel {
            bank: self.clone(),
            source,
        }
    }
}

/// [`FundsChannel`] bound to one source account of an [`InMemoryBank`].
#[derive(Clone, Debug)]
pub struct BankChannel {
    bank: InMemoryBank,
    source: Address,
}

impl BankChannel {
    pub fn source(&self) -> Address {
        self.source
    }
}

impl FundsChannel for BankChannel {
    fn send(&mut self, recipient: &Address, amount: Amount) -> Result<(), FundsError> {
        self.bank.transfer(&self.source, recipient, amount)
    }
}
