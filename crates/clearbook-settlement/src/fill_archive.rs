//! Fill archive.
//!
//! Fills are keyed `be(block) || be(order_id)`, so a forward scan visits
//! blocks in ascending height and, within a block, orders ascending by id.

use clearbook_store::keys::{block_subkey, join, u64_subkey};
use clearbook_store::{ArchiveStore, Codec, JsonCodec, KvStore};
use clearbook_types::{BlockHeight, EntityId, EventSink, Fill, Result};

/// Archive table for fills.
pub const FILL_TABLE: &str = "fill";

fn fill_key(block: BlockHeight, order_id: EntityId) -> Vec<u8> {
    join(&[&block_subkey(block), &u64_subkey(order_id.0)])
}

/// Append-only store of every fill ever produced.
#[derive(Debug)]
pub struct FillKeeper<S, C = JsonCodec> {
    archive: ArchiveStore<S>,
    codec: C,
}

impl<S: KvStore> FillKeeper<S> {
    pub fn new(store: S) -> Self {
        Self::with_codec(store, JsonCodec)
    }
}

impl<S: KvStore, C: Codec> FillKeeper<S, C> {
    pub fn with_codec(store: S, codec: C) -> Self {
        Self {
            archive: ArchiveStore::new(store, FILL_TABLE),
            codec,
        }
    }

    /// Record a fill.
    ///
    /// # Errors
    /// `Codec` if the fill cannot be encoded.
    pub fn on_fill_event(&mut self, fill: &Fill) -> Result<()> {
        let bytes = self.codec.marshal(fill)?;
        self.archive
            .set(&fill_key(fill.block_number, fill.order_id), &bytes);
        Ok(())
    }

    /// # Errors
    /// `NotFound` if the order did not trade in that block.
    pub fn get(&self, block: BlockHeight, order_id: EntityId) -> Result<Fill> {
        let bytes = self.archive.get(&fill_key(block, order_id))?;
        self.codec.unmarshal(&bytes)
    }

    /// Visit fills of blocks in `[start, end)`, ascending. Stops when `cb`
    /// returns `false`.
    pub fn iter_over_block_numbers(
        &self,
        start: BlockHeight,
        end: BlockHeight,
        mut cb: impl FnMut(Fill) -> bool,
    ) {
        if start >= end {
            return;
        }
        self.archive
            .iterator(&block_subkey(start), &block_subkey(end), |_, v| {
                cb(self.codec.must_unmarshal(v))
            });
    }

    /// Fills of one block, ascending by order id.
    #[must_use]
    pub fn fills_in_block(&self, block: BlockHeight) -> Vec<Fill> {
        let mut fills = Vec::new();
        self.archive.prefix_iterator(&block_subkey(block), |_, v| {
            fills.push(self.codec.must_unmarshal(v));
            true
        });
        fills
    }

    /// Every fill of one order, oldest first. Full scan.
    #[must_use]
    pub fn fills_for_order(&self, order_id: EntityId) -> Vec<Fill> {
        let mut fills = Vec::new();
        self.archive.prefix_iterator(&[], |_, v| {
            let fill: Fill = self.codec.must_unmarshal(v);
            if fill.order_id == order_id {
                fills.push(fill);
            }
            true
        });
        fills
    }
}

impl<S: KvStore, C: Codec> EventSink for FillKeeper<S, C> {
    fn on_fill(&mut self, fill: &Fill) -> Result<()> {
        self.on_fill_event(fill)
    }
}
