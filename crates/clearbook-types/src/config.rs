//! Configuration for the exchange core.
//!
//! One [`ExchangeConfig`] is constructed at startup and passed by reference to
//! every keeper that needs it. Nothing reads configuration from globals.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ClearbookError, Result, constants};

/// Process-wide exchange parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Decimal places carried by every price.
    pub price_decimals: u32,
    /// Largest accepted time-in-force, in blocks.
    pub max_time_in_force: u16,
    /// A partially filled order whose remainder is below this many base
    /// units is closed and its remaining escrow released.
    pub min_remainder_qty: u128,
    /// Open orders one market may hold. Posting beyond it is rejected.
    pub max_orders_per_market: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            price_decimals: constants::DEFAULT_PRICE_DECIMALS,
            max_time_in_force: constants::DEFAULT_MAX_TIME_IN_FORCE,
            min_remainder_qty: constants::DEFAULT_MIN_REMAINDER_QTY,
            max_orders_per_market: constants::DEFAULT_MAX_ORDERS_PER_MARKET,
        }
    }
}

impl ExchangeConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| ClearbookError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Reject parameter combinations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.price_decimals > constants::MAX_PRICE_DECIMALS {
            return Err(ClearbookError::Configuration(format!(
                "price_decimals {} exceeds {}",
                self.price_decimals,
                constants::MAX_PRICE_DECIMALS
            )));
        }
        if self.max_time_in_force == 0 {
            return Err(ClearbookError::Configuration(
                "max_time_in_force must be at least one block".into(),
            ));
        }
        if self.min_remainder_qty == 0 {
            return Err(ClearbookError::Configuration(
                "min_remainder_qty must be at least 1".into(),
            ));
        }
        if self.max_orders_per_market == 0 {
            return Err(ClearbookError::Configuration(
                "max_orders_per_market must be positive".into(),
            ));
        }
        Ok(())
    }
}
