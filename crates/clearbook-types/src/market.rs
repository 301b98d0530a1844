//! Market definitions. Read-only to the matching core.

use serde::{Deserialize, Serialize};

use crate::{Address, EntityId, Identifiable, MarketPair};

/// A spot market between a base and a quote asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: EntityId,
    pub base_asset_denom: String,
    pub quote_asset_denom: String,
    /// The account that nominated the market through governance.
    pub nominee: Address,
}

impl Market {
    #[must_use]
    pub fn pair(&self) -> MarketPair {
        MarketPair::new(&self.base_asset_denom, &self.quote_asset_denom)
    }
}

impl Identifiable for Market {
    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}
