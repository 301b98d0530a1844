//! Order types for the Clearbook exchange core.
//!
//! An [`Order`] is created by the order keeper after its escrow has been
//! debited, mutated only by the clearing engine (quantity reduction on a
//! partial fill) and removed on full fill, cancellation or expiry.

use serde::{Deserialize, Serialize};

use crate::{Address, BlockHeight, EntityId, Identifiable};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Direction {
    Bid,
    Ask,
}

impl Direction {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bid => write!(f, "BID"),
            Self::Ask => write!(f, "ASK"),
        }
    }
}

/// An open order resting in the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: EntityId,
    pub owner: Address,
    pub market_id: EntityId,
    pub direction: Direction,
    /// Quote units per base unit, scaled by `10^price_decimals`.
    pub price: u128,
    /// Open quantity in base units.
    pub quantity: u128,
    pub time_in_force_blocks: u16,
    pub created_block: BlockHeight,
}

impl Order {
    /// First block at which the order is no longer eligible for clearing.
    #[must_use]
    pub fn expiry_block(&self) -> BlockHeight {
        self.created_block
            .saturating_add(BlockHeight::from(self.time_in_force_blocks))
    }

    #[must_use]
    pub fn is_expired_at(&self, height: BlockHeight) -> bool {
        height >= self.expiry_block()
    }
}

impl Identifiable for Order {
    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    /// An unsaved order (id zero) in market 1 created at block 1.
    pub fn dummy(direction: Direction, price: u128, quantity: u128) -> Self {
        Self {
            id: EntityId::ZERO,
            owner: Address([1u8; 20]),
            market_id: EntityId(1),
            direction,
            price,
            quantity,
            time_in_force_blocks: 100,
            created_block: 1,
        }
    }

    pub fn dummy_with_id(id: u64, direction: Direction, price: u128, quantity: u128) -> Self {
        Self {
            id: EntityId(id),
            ..Self::dummy(direction, price, quantity)
        }
    }
}
