//! In-memory ledger.
//!
//! Tracks per-(owner, asset) balances plus per-asset module custody. All
//! mutations are atomic: either the full operation succeeds or the balances
//! are unchanged.

use std::collections::{BTreeSet, HashMap};

use clearbook_types::{Address, ClearbookError, Result, invariant_violation};

use crate::ledger::Ledger;

/// A self-contained [`Ledger`] for tests and simulations.
#[derive(Debug, Default)]
pub struct BankLedger {
    balances: HashMap<(Address, String), u128>,
    custody: HashMap<String, u128>,
    /// Everything ever deposited, per asset.
    minted: HashMap<String, u128>,
    blocked: BTreeSet<Address>,
}

impl BankLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint funds into an owner's account.
    ///
    /// # Errors
    /// `InvalidCoins` if the asset's total supply would overflow.
    pub fn deposit(&mut self, owner: Address, asset: &str, amount: u128) -> Result<()> {
        let minted = self.minted.get(asset).copied().unwrap_or_default();
        let new_minted = minted
            .checked_add(amount)
            .ok_or_else(|| ClearbookError::InvalidCoins {
                reason: format!("{asset} supply overflows"),
            })?;
        let balance = self.balance(owner, asset);
        let new_balance = balance
            .checked_add(amount)
            .ok_or_else(|| ClearbookError::InvalidCoins {
                reason: format!("{asset} balance of {owner} overflows"),
            })?;

        self.minted.insert(asset.to_string(), new_minted);
        self.balances
            .insert((owner, asset.to_string()), new_balance);
        Ok(())
    }

    /// Refuse debits from this account.
    pub fn block_account(&mut self, owner: Address) {
        self.blocked.insert(owner);
    }

    #[must_use]
    pub fn balance(&self, owner: Address, asset: &str) -> u128 {
        self.balances
            .get(&(owner, asset.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Amount of `asset` held in module custody.
    #[must_use]
    pub fn module_balance(&self, asset: &str) -> u128 {
        self.custody.get(asset).copied().unwrap_or_default()
    }

    /// Total supply of an asset: every account plus module custody.
    ///
    /// Deposits are capped so that everything ever minted fits a `u128`, and
    /// transfers only move funds, so the sum cannot overflow. One that does
    /// is fatal.
    #[must_use]
    pub fn total_supply(&self, asset: &str) -> u128 {
        self.balances
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, amount)| *amount)
            .chain(std::iter::once(self.module_balance(asset)))
            .try_fold(0u128, u128::checked_add)
            .unwrap_or_else(|| invariant_violation(format!("{asset} supply overflows")))
    }

    /// Every asset that appears in an account or in custody, sorted.
    #[must_use]
    pub fn assets(&self) -> BTreeSet<String> {
        self.balances
            .keys()
            .map(|(_, a)| a.clone())
            .chain(self.custody.keys().cloned())
            .collect()
    }
}

impl Ledger for BankLedger {
    fn debit_to_module(&mut self, owner: Address, asset: &str, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        if self.blocked.contains(&owner) {
            return Err(ClearbookError::Unauthorized {
                reason: format!("account {owner} is not allowed to send funds"),
            });
        }
        let available = self.balance(owner, asset);
        if available < amount {
            return Err(ClearbookError::InsufficientFunds {
                asset: asset.to_string(),
                needed: amount,
                available,
            });
        }
        let held = self.module_balance(asset);
        let new_held = held
            .checked_add(amount)
            .ok_or_else(|| ClearbookError::InvalidCoins {
                reason: format!("{asset} custody overflows"),
            })?;

        self.balances
            .insert((owner, asset.to_string()), available - amount);
        self.custody.insert(asset.to_string(), new_held);
        Ok(())
    }

    fn credit_from_module(&mut self, owner: Address, asset: &str, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let held = self.module_balance(asset);
        if held < amount {
            return Err(ClearbookError::InsufficientFunds {
                asset: format!("{asset} (module custody)"),
                needed: amount,
                available: held,
            });
        }
        let balance = self.balance(owner, asset);
        let new_balance = balance
            .checked_add(amount)
            .ok_or_else(|| ClearbookError::InvalidCoins {
                reason: format!("{asset} balance of {owner} overflows"),
            })?;

        self.custody.insert(asset.to_string(), held - amount);
        self.balances
            .insert((owner, asset.to_string()), new_balance);
        Ok(())
    }
}
