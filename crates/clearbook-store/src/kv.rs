//! The ordered key-value substrate.

use std::collections::BTreeMap;
use std::ops::Bound;

/// Scan order for [`KvStore::iterate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterDirection {
    Forward,
    Reverse,
}

/// An ordered, byte-keyed store.
///
/// Keys compare lexicographically. Iteration visits `[start, end)`; an `end`
/// of `None` means "to the end of the keyspace". The callback returns `false`
/// to stop early.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    fn set(&mut self, key: &[u8], value: &[u8]);

    fn delete(&mut self, key: &[u8]);

    fn iterate(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        direction: IterDirection,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    );
}

impl<K: KvStore + ?Sized> KvStore for &mut K {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> bool {
        (**self).has(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        (**self).set(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        (**self).delete(key);
    }

    fn iterate(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        direction: IterDirection,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) {
        (**self).iterate(start, end, direction, f);
    }
}

/// In-memory [`KvStore`] backed by a `BTreeMap`.
#[derive(Debug, Clone, Default)]
pub struct MemKv {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemKv {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn has(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.entries.insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn iterate(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        direction: IterDirection,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) {
        // BTreeMap::range panics on an inverted range.
        if end.is_some_and(|end| end <= start) {
            return;
        }
        let upper = end.map_or(Bound::Unbounded, Bound::Excluded);
        let range = self
            .entries
            .range::<[u8], _>((Bound::Included(start), upper));

        match direction {
            IterDirection::Forward => {
                for (k, v) in range {
                    if !f(k, v) {
                        break;
                    }
                }
            }
            IterDirection::Reverse => {
                for (k, v) in range.rev() {
                    if !f(k, v) {
                        break;
                    }
                }
            }
        }
    }
}
