//! A single price level in the order book.
//!
//! Orders at the same price are kept in ascending id order. Ids are assigned
//! sequentially at posting, so id order is arrival order.

use clearbook_types::{EntityId, Order, invariant_violation};

/// All orders resting at one price.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: u128,
    /// Ascending by id.
    pub orders: Vec<Order>,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: u128) -> Self {
        Self {
            price,
            orders: Vec::new(),
        }
    }

    /// Insert keeping id order.
    pub fn insert(&mut self, order: Order) {
        let pos = self.orders.partition_point(|o| o.id < order.id);
        self.orders.insert(pos, order);
    }

    /// Total open quantity at this level.
    ///
    /// A level held by an [`OrderBook`](crate::OrderBook) never overflows;
    /// one that does is fatal.
    #[must_use]
    pub fn total_quantity(&self) -> u128 {
        self.orders.iter().fold(0u128, |acc, o| {
            acc.checked_add(o.quantity)
                .unwrap_or_else(|| invariant_violation(format!("level {} overflows", self.price)))
        })
    }

    /// `(id, quantity)` pairs, the weights for a pro-rata split.
    #[must_use]
    pub fn weights(&self) -> Vec<(EntityId, u128)> {
        self.orders.iter().map(|o| (o.id, o.quantity)).collect()
    }

    pub fn remove_order(&mut self, order_id: EntityId) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.id == order_id)?;
        Some(self.orders.remove(pos))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }
}
