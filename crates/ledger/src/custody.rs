//! Custody gateway to the external asset registry.
//!
//! The ledger only ever asks the registry for two things: pull an asset from
//! its owner into custody, and release a held asset to a recipient. Both are
//! expressed on top of [`AssetCustodian::transfer_asset`] with the ledger
//! acting as operator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use auction_types::{Address, AssetId, ZERO_ADDRESS};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Errors reported by the asset registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    #[error("Unknown asset {0}")]
    UnknownAsset(AssetId),

    #[error("Asset {0} is not owned by the transfer source")]
    NotOwner(AssetId),

    #[error("Operator not approved for asset {0}")]
    NotApproved(AssetId),

    #[error("Asset {0} already exists")]
    AlreadyMinted(AssetId),

    #[error("Zero address is not a valid owner")]
    ZeroAddress,
}

/// External ownership ledger for non-fungible assets.
pub trait AssetCustodian {
    /// Move `asset_id` from `from` to `to` on behalf of `operator`.
    ///
    /// Fails unless `from` owns the asset and `operator` is `from` or has been
    /// approved by it.
    fn transfer_asset(
        &mut self,
        operator: &Address,
        asset_id: AssetId,
        from: &Address,
        to: &Address,
    ) -> Result<(), CustodyError>;

    /// Current owner of `asset_id`, if it exists.
    fn owner_of(&self, asset_id: AssetId) -> Option<Address>;
}

/// Ledger-side view of the registry, bound to the ledger's own address.
pub struct CustodyGateway<'a, C> {
    custodian: &'a mut C,
    ledger: Address,
}

impl<'a, C: AssetCustodian> CustodyGateway<'a, C> {
    pub fn new(custodian: &'a mut C, ledger: Address) -> Self {
        Self { custodian, ledger }
    }

    /// Pull `asset_id` from `from` into the ledger's custody.
    pub fn transfer_to_custody(&mut self, asset_id: AssetId, from: &Address) -> Result<(), CustodyError> {
        let ledger = self.ledger;
        self.custodian
            .transfer_asset(&ledger, asset_id, from, &ledger)
    }

    /// Hand a held asset over to `to`.
    pub fn release(&mut self, asset_id: AssetId, to: &Address) -> Result<(), CustodyError> {
        let ledger = self.ledger;
        self.custodian.transfer_asset(&ledger, asset_id, &ledger, to)
    }

    /// Whether the registry records the ledger as the asset's holder.
    pub fn holds(&self, asset_id: AssetId) -> bool {
        self.custodian.owner_of(asset_id) == Some(self.ledger)
    }

    /// Whether a held asset can be released to `to`.
    pub fn can_release(&self, asset_id: AssetId, to: &Address) -> bool {
        *to != ZERO_ADDRESS && self.holds(asset_id)
    }
}

// =========================
// IN-MEMORY REGISTRY
// =========================

#[derive(Debug, Default)]
struct RegistryInner {
    /// Asset owners
    owners: HashMap<AssetId, Address>,
    /// Single-asset approvals: asset -> approved operator
    approvals: HashMap<AssetId, Address>,
    /// Blanket approvals: (owner, operator)
    operators: HashSet<(Address, Address)>,
}

/// In-memory asset registry.
///
/// Cloning yields another handle to the same registry, so a host can keep
/// minting and approving while the ledger owns its own handle.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAssetRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl InMemoryAssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `asset_id` owned by `to`.
    pub fn mint(&self, asset_id: AssetId, to: Address) -> Result<(), CustodyError> {
        if to == ZERO_ADDRESS {
            return Err(CustodyError::ZeroAddress);
        }
        let mut inner = self.inner.lock();
        if inner.owners.contains_key(&asset_id) {
            return Err(CustodyError::AlreadyMinted(asset_id));
        }
        inner.owners.insert(asset_id, to);
        Ok(())
    }

    /// Let `operator` move one asset owned by `caller`.
    pub fn approve(
        &self,
        caller: &Address,
        asset_id: AssetId,
        operator: Address,
    ) -> Result<(), CustodyError> {
        let mut inner = self.inner.lock();
        let owner = inner
            .owners
            .get(&asset_id)
            .copied()
            .ok_or(CustodyError::UnknownAsset(asset_id))?;
        if owner != *caller {
            return Err(CustodyError::NotOwner(asset_id));
        }
        inner.approvals.insert(asset_id, operator);
        Ok(())
    }

    /// Grant or revoke `operator` the right to move every asset of `owner`.
    pub fn set_approval_for_all(&self, owner: Address, operator: Address, approved: bool) {
        let mut inner = self.inner.lock();
        if approved {
            inner.operators.insert((owner, operator));
        } else {
            inner.operators.remove(&(owner, operator));
        }
    }

    /// All assets currently owned by `owner`, in ascending order.
    pub fn assets_of(&self, owner: &Address) -> Vec<AssetId> {
        let inner = self.inner.lock();
        let mut assets: Vec<AssetId> = inner
            .owners
            .iter()
            .filter(|(_, o)| *o == owner)
            .map(|(id, _)| *id)
            .collect();
        assets.sort_unstable();
        assets
    }
}

impl AssetCustodian for InMemoryAssetRegistry {
    fn transfer_asset(
        &mut self,
        operator: &Address,
        asset_id: AssetId,
        from: &Address,
        to: &Address,
    ) -> Result<(), CustodyError> {
        if *to == ZERO_ADDRESS {
            return Err(CustodyError::ZeroAddress);
        }
        let mut inner = self.inner.lock();
        let owner = inner
            .owners
            .get(&asset_id)
            .copied()
            .ok_or(CustodyError::UnknownAsset(asset_id))?;
        if owner != *from {
            return Err(CustodyError::NotOwner(asset_id));
        }

        let authorized = operator == from
            || inner.approvals.get(&asset_id) == Some(operator)
            || inner.operators.contains(&(owner, *operator));
        if !authorized {
            return Err(CustodyError::NotApproved(asset_id));
        }

        inner.owners.insert(asset_id, *to);
        inner.approvals.remove(&asset_id);
        debug!(asset_id, "Asset transferred");
        Ok(())
    }

    fn owner_of(&self, asset_id: AssetId) -> Option<Address> {
        self.inner.lock().owners.get(&asset_id).copied()
    }
}
