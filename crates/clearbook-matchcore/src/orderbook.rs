//! The order book for a single market, rebuilt for every clearing.
//!
//! Uses `BTreeMap` for price-level ordering:
//! - **Bids**: `BTreeMap<Reverse<u128>, PriceLevel>` -- highest price first
//! - **Asks**: `BTreeMap<u128, PriceLevel>` -- lowest price first
//!
//! Within a level, orders are ascending by id. The resulting priority
//! `(price, id)` is total, so the book's shape never depends on the order in
//! which orders were inserted.
//!
//! Each side's total quantity fits a `u128`; an insert that would push a side
//! past it is rejected. Level totals and cumulative curves are therefore
//! always exact.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use clearbook_types::{
    AggregatePrice, ClearbookError, Direction, EntityId, Order, Result, invariant_violation,
};

use crate::price_level::PriceLevel;

/// Bids and asks of one market grouped by price.
#[derive(Debug)]
pub struct OrderBook {
    pub market_id: EntityId,
    bids: BTreeMap<Reverse<u128>, PriceLevel>,
    asks: BTreeMap<u128, PriceLevel>,
    ids: BTreeSet<EntityId>,
    bid_quantity: u128,
    ask_quantity: u128,
}

impl OrderBook {
    #[must_use]
    pub fn new(market_id: EntityId) -> Self {
        Self {
            market_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            ids: BTreeSet::new(),
            bid_quantity: 0,
            ask_quantity: 0,
        }
    }

    // =================================================================
    // Insertion
    // =================================================================

    /// # Errors
    /// `OrderAlreadyExists` on a repeated id, `InvalidOrder` if the order
    /// belongs to another market, `InvalidAmount` if its side's total
    /// quantity would overflow.
    pub fn insert_order(&mut self, order: Order) -> Result<()> {
        if order.market_id != self.market_id {
            return Err(ClearbookError::InvalidOrder {
                reason: format!(
                    "order {} is in market {}, book is {}",
                    order.id, order.market_id, self.market_id
                ),
            });
        }
        if self.ids.contains(&order.id) {
            return Err(ClearbookError::OrderAlreadyExists(order.id));
        }
        let side_total = match order.direction {
            Direction::Bid => &mut self.bid_quantity,
            Direction::Ask => &mut self.ask_quantity,
        };
        *side_total = side_total.checked_add(order.quantity).ok_or_else(|| {
            ClearbookError::invalid_amount(format!(
                "order {} overflows the {} side of market {}",
                order.id, order.direction, self.market_id
            ))
        })?;
        self.ids.insert(order.id);

        let price = order.price;
        match order.direction {
            Direction::Bid => self
                .bids
                .entry(Reverse(price))
                .or_insert_with(|| PriceLevel::new(price))
                .insert(order),
            Direction::Ask => self
                .asks
                .entry(price)
                .or_insert_with(|| PriceLevel::new(price))
                .insert(order),
        }
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn best_bid(&self) -> Option<u128> {
        self.bids.keys().next().map(|r| r.0)
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<u128> {
        self.asks.keys().next().copied()
    }

    /// Whether any bid is priced at or above some ask.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some(bid), Some(ask)) if bid >= ask)
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Total open quantity on one side.
    #[must_use]
    pub fn side_quantity(&self, direction: Direction) -> u128 {
        match direction {
            Direction::Bid => self.bid_quantity,
            Direction::Ask => self.ask_quantity,
        }
    }

    #[must_use]
    pub fn contains_order(&self, order_id: EntityId) -> bool {
        self.ids.contains(&order_id)
    }

    // =================================================================
    // Iteration
    // =================================================================

    /// Bid levels from best (highest) to worst.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values()
    }

    /// Ask levels from best (lowest) to worst.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }

    /// Cumulative demand, highest price first.
    #[must_use]
    pub fn demand_curve(&self) -> Vec<AggregatePrice> {
        cumulative(self.bid_levels())
    }

    /// Cumulative supply, lowest price first.
    #[must_use]
    pub fn supply_curve(&self) -> Vec<AggregatePrice> {
        cumulative(self.ask_levels())
    }
}

fn cumulative<'a>(levels: impl Iterator<Item = &'a PriceLevel>) -> Vec<AggregatePrice> {
    let mut total = 0u128;
    levels
        .map(|level| {
            total = total
                .checked_add(level.total_quantity())
                .unwrap_or_else(|| invariant_violation("book side quantity overflows"));
            AggregatePrice::new(level.price, total)
        })
        .collect()
}
