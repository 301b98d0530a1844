//! Fill records produced by a clearing event.
//!
//! A [`Fill`] is the immutable record of one order's participation in one
//! batch. Every fill in a batch executes at the batch's uniform clearing price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, BlockHeight, Direction, EntityId, MarketPair};

/// One order's participation in a clearing event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// The order that traded. It may have been deleted since.
    pub order_id: EntityId,
    pub owner: Address,
    pub pair: MarketPair,
    pub direction: Direction,
    /// Base units executed in this clearing event.
    pub qty_filled: u128,
    /// Base units still open on the book afterwards. Zero when the order
    /// was closed, including a remainder released as dust.
    pub qty_unfilled: u128,
    pub block_number: BlockHeight,
    /// The uniform clearing price of the batch.
    pub price: u128,
}

impl Fill {
    /// Whether the order left the book in this clearing event.
    #[must_use]
    pub fn closed_order(&self) -> bool {
        self.qty_unfilled == 0
    }

    /// Executed share of the order's pre-clearing quantity, in `[0, 1]`.
    #[must_use]
    pub fn fill_ratio(&self) -> Decimal {
        let total = self.qty_filled.saturating_add(self.qty_unfilled);
        if total == 0 {
            return Decimal::ZERO;
        }
        match (
            crate::to_decimal(self.qty_filled, 0),
            crate::to_decimal(total, 0),
        ) {
            (Some(filled), Some(total)) => filled / total,
            _ => Decimal::ZERO,
        }
    }
}

impl std::fmt::Display for Fill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Fill[order {} @ block {}] {} {} {} @ {} (open {})",
            self.order_id,
            self.block_number,
            self.pair,
            self.direction,
            self.qty_filled,
            self.price,
            self.qty_unfilled,
        )
    }
}
