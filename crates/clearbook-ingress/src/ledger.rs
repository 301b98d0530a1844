//! The account balance module, as seen by the exchange core.
//!
//! The core never holds balances. It moves funds between an owner's account
//! and the module custody account, and nothing else.

use clearbook_types::{Address, Result};

/// Debit / credit instructions against module custody.
pub trait Ledger {
    /// Move `amount` of `asset` from `owner` into module custody.
    ///
    /// # Errors
    /// `InsufficientFunds` if the owner cannot cover it, `Unauthorized` if
    /// the owner's account may not send.
    fn debit_to_module(&mut self, owner: Address, asset: &str, amount: u128) -> Result<()>;

    /// Move `amount` of `asset` from module custody to `owner`.
    ///
    /// # Errors
    /// `InsufficientFunds` if custody holds less than `amount`. For the
    /// exchange core this always indicates corrupted bookkeeping.
    fn credit_from_module(&mut self, owner: Address, asset: &str, amount: u128) -> Result<()>;
}

impl<L: Ledger + ?Sized> Ledger for &mut L {
    fn debit_to_module(&mut self, owner: Address, asset: &str, amount: u128) -> Result<()> {
        (**self).debit_to_module(owner, asset, amount)
    }

    fn credit_from_module(&mut self, owner: Address, asset: &str, amount: u128) -> Result<()> {
        (**self).credit_from_module(owner, asset, amount)
    }
}
