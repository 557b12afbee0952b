//! Genesis configuration for the auction ledger.

use auction_types::{Address, ZERO_ADDRESS};
use serde::{Deserialize, Serialize};

/// Genesis configuration for the auction ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerGenesisConfig {
    /// Account under which the ledger holds assets and escrowed funds
    pub ledger_address: Address,
}

impl LedgerGenesisConfig {
    pub fn new(ledger_address: Address) -> Self {
        Self { ledger_address }
    }

    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if self.ledger_address == ZERO_ADDRESS {
            return Err(GenesisValidationError::ZeroLedgerAddress);
        }
        Ok(())
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Ledger address cannot be the zero address")]
    ZeroLedgerAddress,
}
