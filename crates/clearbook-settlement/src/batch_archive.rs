//! Batch archive.
//!
//! Batches are keyed `be(market_id) || be(block)`. The latest batch of a
//! market is the first hit of a reverse scan over the market prefix.

use clearbook_store::keys::{block_subkey, join, u64_subkey};
use clearbook_store::{ArchiveStore, Codec, JsonCodec, KvStore};
use clearbook_types::{Batch, BlockHeight, ClearbookError, EntityId, EventSink, Result};

/// Archive table for batches.
pub const BATCH_TABLE: &str = "batch";

fn batch_key(market_id: EntityId, block: BlockHeight) -> Vec<u8> {
    join(&[&u64_subkey(market_id.0), &block_subkey(block)])
}

/// Append-only store of one batch per market per cleared block.
#[derive(Debug)]
pub struct BatchKeeper<S, C = JsonCodec> {
    archive: ArchiveStore<S>,
    codec: C,
}

impl<S: KvStore> BatchKeeper<S> {
    pub fn new(store: S) -> Self {
        Self::with_codec(store, JsonCodec)
    }
}

impl<S: KvStore, C: Codec> BatchKeeper<S, C> {
    pub fn with_codec(store: S, codec: C) -> Self {
        Self {
            archive: ArchiveStore::new(store, BATCH_TABLE),
            codec,
        }
    }

    /// Record a batch.
    ///
    /// # Errors
    /// `Codec` if the batch cannot be encoded.
    pub fn on_batch_event(&mut self, batch: &Batch) -> Result<()> {
        let bytes = self.codec.marshal(batch)?;
        self.archive
            .set(&batch_key(batch.market_id, batch.block_number), &bytes);
        Ok(())
    }

    /// Most recent batch of a market.
    ///
    /// # Errors
    /// `NotFound` if the market has never cleared.
    pub fn latest_by_market(&self, market_id: EntityId) -> Result<Batch> {
        let mut latest = None;
        self.archive
            .reverse_prefix_iterator(&u64_subkey(market_id.0), |_, v| {
                latest = Some(self.codec.must_unmarshal(v));
                false
            });
        latest.ok_or_else(|| ClearbookError::not_found(format!("batch for market {market_id}")))
    }

    /// # Errors
    /// `NotFound` if the market did not clear in that block.
    pub fn by_market_and_block(&self, market_id: EntityId, block: BlockHeight) -> Result<Batch> {
        let bytes = self.archive.get(&batch_key(market_id, block))?;
        self.codec.unmarshal(&bytes)
    }

    /// Visit one market's batches by block, ascending or descending.
    pub fn iter_by_market(
        &self,
        market_id: EntityId,
        reverse: bool,
        mut cb: impl FnMut(Batch) -> bool,
    ) {
        let prefix = u64_subkey(market_id.0);
        let visit = |_: &[u8], v: &[u8]| cb(self.codec.must_unmarshal(v));
        if reverse {
            self.archive.reverse_prefix_iterator(&prefix, visit);
        } else {
            self.archive.prefix_iterator(&prefix, visit);
        }
    }
}

impl<S: KvStore, C: Codec> EventSink for BatchKeeper<S, C> {
    fn on_batch(&mut self, batch: &Batch) -> Result<()> {
        self.on_batch_event(batch)
    }
}
