//! Supply conservation checks.
//!
//! Two invariants must hold after every block:
//! ```text
//! ∀ asset: Σ(accounts) + custody == Σ(minted) - Σ(burned)
//! ∀ asset: custody == Σ(escrow of open orders)
//! ```
//! The exchange only moves funds between accounts and module custody, so
//! clearing and settlement must leave both untouched.

use std::collections::{BTreeMap, BTreeSet};

use clearbook_ingress::{BankLedger, MarketRegistry, OrderKeeper};
use clearbook_store::{Codec, KvStore};
use clearbook_types::{ClearbookError, Result};

/// Tracks per-asset mint and burn totals.
#[derive(Debug, Default)]
pub struct SupplyConservation {
    minted: BTreeMap<String, u128>,
    burned: BTreeMap<String, u128>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record funds entering the system.
    pub fn record_mint(&mut self, asset: &str, amount: u128) {
        let total = self.minted.entry(asset.to_string()).or_default();
        *total = total.saturating_add(amount);
    }

    /// Record funds leaving the system.
    pub fn record_burn(&mut self, asset: &str, amount: u128) {
        let total = self.burned.entry(asset.to_string()).or_default();
        *total = total.saturating_add(amount);
    }

    #[must_use]
    pub fn total_minted(&self, asset: &str) -> u128 {
        self.minted.get(asset).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn total_burned(&self, asset: &str) -> u128 {
        self.burned.get(asset).copied().unwrap_or_default()
    }

    /// Expected total supply: minted minus burned. `None` if more was burned
    /// than ever minted.
    #[must_use]
    pub fn expected_supply(&self, asset: &str) -> Option<u128> {
        self.total_minted(asset).checked_sub(self.total_burned(asset))
    }

    /// Every asset with a recorded mint or burn, sorted.
    #[must_use]
    pub fn tracked_assets(&self) -> BTreeSet<String> {
        self.minted
            .keys()
            .chain(self.burned.keys())
            .cloned()
            .collect()
    }

    /// # Errors
    /// `InvariantViolation` if `actual_supply` differs from the expected one.
    pub fn verify(&self, asset: &str, actual_supply: u128) -> Result<()> {
        if self.expected_supply(asset) == Some(actual_supply) {
            return Ok(());
        }
        Err(ClearbookError::InvariantViolation {
            reason: format!(
                "asset {asset}: supply {actual_supply} != minted {} - burned {}",
                self.total_minted(asset),
                self.total_burned(asset),
            ),
        })
    }

    /// Check both invariants for every tracked asset against a keeper backed
    /// by a [`BankLedger`].
    ///
    /// # Errors
    /// `InvariantViolation` naming the first asset that does not reconcile.
    pub fn verify_keeper<S, M, C>(&self, keeper: &OrderKeeper<S, BankLedger, M, C>) -> Result<()>
    where
        S: KvStore,
        M: MarketRegistry,
        C: Codec,
    {
        let bank = keeper.ledger();
        for asset in self.tracked_assets().iter().chain(bank.assets().iter()) {
            self.verify(asset, bank.total_supply(asset))?;
            verify_custody(asset, bank.module_balance(asset), keeper.escrowed_total(asset))?;
        }
        Ok(())
    }
}

/// # Errors
/// `InvariantViolation` if custody and open-order escrow disagree.
pub fn verify_custody(asset: &str, custody: u128, escrowed: u128) -> Result<()> {
    if custody == escrowed {
        Ok(())
    } else {
        Err(ClearbookError::InvariantViolation {
            reason: format!("asset {asset}: custody {custody} != escrow of open orders {escrowed}"),
        })
    }
}
