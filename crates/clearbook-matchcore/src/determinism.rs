//! Determinism verification utilities for replay.
//!
//! Every node replaying the same block must produce the exact same fills.
//! The `fill_root` is a hash over all fills of a batch that enables quick
//! comparison without exchanging full payloads.

use clearbook_types::{Direction, Fill};
use sha2::{Digest, Sha256};

/// Compute the fill root over a batch's fills.
///
/// The hash covers, per fill and in slice order: order id, owner, pair,
/// direction, filled and unfilled quantity, block number and price.
#[must_use]
pub fn compute_fill_root(fills: &[Fill]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"clearbook:fill_root:v1:");
    hasher.update((fills.len() as u64).to_le_bytes());

    for fill in fills {
        hasher.update(fill.order_id.to_be_bytes());
        hasher.update(fill.owner.as_bytes());
        hasher.update(fill.pair.symbol().as_bytes());
        hasher.update([match fill.direction {
            Direction::Bid => 0u8,
            Direction::Ask => 1u8,
        }]);
        hasher.update(fill.qty_filled.to_le_bytes());
        hasher.update(fill.qty_unfilled.to_le_bytes());
        hasher.update(fill.block_number.to_le_bytes());
        hasher.update(fill.price.to_le_bytes());
    }

    let result = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&result);
    root
}

/// Recompute the fill root and compare with `expected_root`.
#[must_use]
pub fn verify_fill_root(fills: &[Fill], expected_root: &[u8; 32]) -> bool {
    compute_fill_root(fills) == *expected_root
}
