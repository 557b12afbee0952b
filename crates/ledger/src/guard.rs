//! Per-call re-entrancy guard.

use std::cell::Cell;

use crate::error::LedgerError;

/// Marks a ledger call as in flight until dropped.
///
/// Entering while another call on the same ledger is still in flight fails
/// with [`LedgerError::ReentrantCall`]. The flag is cleared on every exit
/// path, including early returns and unwinding.
pub(crate) struct CallGuard<'a> {
    entered: &'a Cell<bool>,
}

impl<'a> CallGuard<'a> {
    pub(crate) fn enter(entered: &'a Cell<bool>) -> Result<Self, LedgerError> {
        if entered.replace(true) {
            return Err(LedgerError::ReentrantCall);
        }
        Ok(Self { entered })
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.entered.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_entry_rejected() {
        let flag = Cell::new(false);
        let outer = CallGuard::enter(&flag).unwrap();
        assert!(matches!(
            CallGuard::enter(&flag),
            Err(LedgerError::ReentrantCall)
        ));
        // A rejected entry must not clear the outer call's flag
        assert!(flag.get());
        drop(outer);
        assert!(!flag.get());
    }

    #[test]
    fn test_released_on_error_path() {
        let flag = Cell::new(false);
        let run = || -> Result<(), LedgerError> {
            let _guard = CallGuard::enter(&flag)?;
            Err(LedgerError::NoBids(1))
        };
        assert!(run().is_err());
        assert!(!flag.get());
        assert!(CallGuard::enter(&flag).is_ok());
    }
}
