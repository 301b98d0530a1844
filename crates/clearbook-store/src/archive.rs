//! Append-only archive tables.
//!
//! An [`ArchiveStore`] scopes a substrate to one named table. Keys handed to
//! and returned from it are table-relative; the table prefix never leaks to
//! callers.

use clearbook_types::{ClearbookError, Result};

use crate::keys::{prefix_end, prefix_key, table_prefix};
use crate::kv::{IterDirection, KvStore};

/// A named table on a [`KvStore`].
#[derive(Debug)]
pub struct ArchiveStore<S> {
    store: S,
    name: String,
    prefix: Vec<u8>,
}

impl<S: KvStore> ArchiveStore<S> {
    pub fn new(store: S, table: &str) -> Self {
        Self {
            store,
            name: table.to_string(),
            prefix: table_prefix(table),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.name
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        let full = prefix_key(&self.prefix, key);
        self.store.set(&full, value);
    }

    /// # Errors
    /// `NotFound` when the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.store
            .get(&prefix_key(&self.prefix, key))
            .ok_or_else(|| {
                ClearbookError::not_found(format!("{} record {}", self.name, hex::encode(key)))
            })
    }

    #[must_use]
    pub fn has(&self, key: &[u8]) -> bool {
        self.store.has(&prefix_key(&self.prefix, key))
    }

    /// Visit `[start, end)` in ascending key order.
    pub fn iterator(&self, start: &[u8], end: &[u8], mut cb: impl FnMut(&[u8], &[u8]) -> bool) {
        let from = prefix_key(&self.prefix, start);
        let to = prefix_key(&self.prefix, end);
        let strip = self.prefix.len();
        self.store
            .iterate(&from, Some(&to), IterDirection::Forward, &mut |k, v| {
                cb(&k[strip..], v)
            });
    }

    /// Visit every key starting with `prefix`, ascending.
    pub fn prefix_iterator(&self, prefix: &[u8], cb: impl FnMut(&[u8], &[u8]) -> bool) {
        self.scan_prefix(prefix, IterDirection::Forward, cb);
    }

    /// Visit every key starting with `prefix`, descending.
    pub fn reverse_prefix_iterator(&self, prefix: &[u8], cb: impl FnMut(&[u8], &[u8]) -> bool) {
        self.scan_prefix(prefix, IterDirection::Reverse, cb);
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        direction: IterDirection,
        mut cb: impl FnMut(&[u8], &[u8]) -> bool,
    ) {
        let from = prefix_key(&self.prefix, prefix);
        let to = prefix_end(&from);
        let strip = self.prefix.len();
        self.store
            .iterate(&from, to.as_deref(), direction, &mut |k, v| {
                cb(&k[strip..], v)
            });
    }

    #[must_use]
    pub fn backend(&self) -> &S {
        &self.store
    }
}
