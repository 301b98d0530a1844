//! Market registry.
//!
//! Markets are created through governance and are read-only to the
//! matching core, which only ever looks them up by id.

use clearbook_store::{Codec, Incrementing, JsonCodec, KvStore};
use clearbook_types::{Address, ClearbookError, EntityId, Market, Result};

/// Registry namespace for markets.
pub const MARKET_NAMESPACE: &str = "market";

/// Read-only market lookup.
pub trait MarketRegistry {
    /// # Errors
    /// `MarketNotFound` if no market has this id.
    fn get_market(&self, id: EntityId) -> Result<Market>;
}

impl<R: MarketRegistry + ?Sized> MarketRegistry for &R {
    fn get_market(&self, id: EntityId) -> Result<Market> {
        (**self).get_market(id)
    }
}

/// Markets stored in an incrementing registry.
#[derive(Debug)]
pub struct MarketKeeper<S, C = JsonCodec> {
    markets: Incrementing<S, Market, C>,
}

impl<S: KvStore> MarketKeeper<S> {
    pub fn new(store: S) -> Self {
        Self::with_codec(store, JsonCodec)
    }
}

impl<S: KvStore, C: Codec> MarketKeeper<S, C> {
    pub fn with_codec(store: S, codec: C) -> Self {
        Self {
            markets: Incrementing::new(store, MARKET_NAMESPACE, codec),
        }
    }

    /// Register a market between two distinct, non-empty denominations.
    ///
    /// # Errors
    /// `InvalidMarket` for a malformed pair.
    pub fn create_market(&mut self, nominee: Address, base: &str, quote: &str) -> Result<Market> {
        if base.is_empty() || quote.is_empty() {
            return Err(ClearbookError::InvalidMarket {
                reason: "asset denominations must be non-empty".into(),
            });
        }
        if base == quote {
            return Err(ClearbookError::InvalidMarket {
                reason: format!("base and quote are both {base}"),
            });
        }

        let mut market = Market {
            id: EntityId::ZERO,
            base_asset_denom: base.to_string(),
            quote_asset_denom: quote.to_string(),
            nominee,
        };
        self.markets.insert(&mut market)?;

        tracing::info!(
            market_id = %market.id,
            pair = %market.pair(),
            nominee = %nominee.short(),
            "market created"
        );
        Ok(market)
    }

    #[must_use]
    pub fn has_market(&self, id: EntityId) -> bool {
        self.markets.has_id(id)
    }

    /// Visit markets in id order.
    pub fn iterator(&self, cb: impl FnMut(Market) -> bool) {
        self.markets.iterator(cb);
    }

    #[must_use]
    pub fn all_markets(&self) -> Vec<Market> {
        let mut all = Vec::new();
        self.markets.iterator(|m| {
            all.push(m);
            true
        });
        all
    }
}

impl<S: KvStore, C: Codec> MarketRegistry for MarketKeeper<S, C> {
    fn get_market(&self, id: EntityId) -> Result<Market> {
        self.markets.by_id(id).map_err(|err| {
            if err.is_not_found() {
                ClearbookError::MarketNotFound(id)
            } else {
                err
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use clearbook_store::MemKv;

    use super::*;

    const NOMINEE: Address = Address([9u8; 20]);

    #[test]
    fn create_and_lookup() {
        let mut keeper = MarketKeeper::new(MemKv::new());
        let market = keeper.create_market(NOMINEE, "uxar", "uusdx").unwrap();
        assert_eq!(market.id, EntityId(1));
        assert_eq!(keeper.get_market(EntityId(1)).unwrap(), market);
        assert!(keeper.has_market(EntityId(1)));
    }

    #[test]
    fn unknown_market() {
        let keeper = MarketKeeper::new(MemKv::new());
        assert_eq!(
            keeper.get_market(EntityId(4)).unwrap_err(),
            ClearbookError::MarketNotFound(EntityId(4))
        );
    }

    #[test]
    fn malformed_pairs_rejected() {
        let mut keeper = MarketKeeper::new(MemKv::new());
        assert!(matches!(
            keeper.create_market(NOMINEE, "", "uusdx").unwrap_err(),
            ClearbookError::InvalidMarket { .. }
        ));
        assert!(matches!(
            keeper.create_market(NOMINEE, "uxar", "uxar").unwrap_err(),
            ClearbookError::InvalidMarket { .. }
        ));
        assert!(keeper.all_markets().is_empty());
    }

    #[test]
    fn markets_iterate_in_id_order() {
        let mut keeper = MarketKeeper::new(MemKv::new());
        keeper.create_market(NOMINEE, "a", "b").unwrap();
        keeper.create_market(NOMINEE, "c", "d").unwrap();
        let ids: Vec<u64> = keeper.all_markets().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
