//! Batch records: one immutable summary per market per clearing block.
//!
//! A batch captures the uniform clearing price and the aggregated demand and
//! supply curves the price was computed from, so that any observer can
//! re-derive the price from the record alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BlockHeight, EntityId};

/// One point on a cumulative demand or supply curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatePrice {
    pub price: u128,
    /// Cumulative base quantity willing to trade at `price`.
    pub quantity: u128,
}

impl AggregatePrice {
    #[must_use]
    pub fn new(price: u128, quantity: u128) -> Self {
        Self { price, quantity }
    }
}

/// Summary of one clearing event for one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub market_id: EntityId,
    pub block_number: BlockHeight,
    /// Timestamp of the block, as supplied by consensus.
    pub block_time: DateTime<Utc>,
    pub clearing_price: u128,
    /// Cumulative demand, highest price first.
    pub bids: Vec<AggregatePrice>,
    /// Cumulative supply, lowest price first.
    pub asks: Vec<AggregatePrice>,
}

impl Batch {
    /// Demand at the clearing price (last bid point at or above it).
    #[must_use]
    pub fn demand_at_clearing(&self) -> u128 {
        self.bids
            .iter()
            .take_while(|p| p.price >= self.clearing_price)
            .last()
            .map_or(0, |p| p.quantity)
    }

    /// Supply at the clearing price (last ask point at or below it).
    #[must_use]
    pub fn supply_at_clearing(&self) -> u128 {
        self.asks
            .iter()
            .take_while(|p| p.price <= self.clearing_price)
            .last()
            .map_or(0, |p| p.quantity)
    }

    /// Base volume matched in this batch.
    #[must_use]
    pub fn matched_volume(&self) -> u128 {
        self.demand_at_clearing().min(self.supply_at_clearing())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn make_batch() -> Batch {
        Batch {
            market_id: EntityId(1),
            block_number: 40,
            block_time: Utc.with_ymd_and_hms(2019, 10, 1, 12, 0, 0).unwrap(),
            clearing_price: 95,
            bids: vec![AggregatePrice::new(100, 10), AggregatePrice::new(90, 25)],
            asks: vec![AggregatePrice::new(90, 4), AggregatePrice::new(99, 12)],
        }
    }

    #[test]
    fn volume_at_clearing_price() {
        let batch = make_batch();
        assert_eq!(batch.demand_at_clearing(), 10);
        assert_eq!(batch.supply_at_clearing(), 4);
        assert_eq!(batch.matched_volume(), 4);
    }

    #[test]
    fn batch_serde_roundtrip() {
        let batch = make_batch();
        let json = serde_json::to_string(&batch).unwrap();
        let back: Batch = serde_json::from_str(&json).unwrap();
        assert_eq!(batch, back);
    }
}
