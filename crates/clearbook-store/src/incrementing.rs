//! Incrementing registry: strictly increasing identifiers for stored values.
//!
//! Layout inside the registry's namespace:
//!
//! ```text
//! <ns>/head            -> be(head id)
//! <ns>/value/<be(id)>  -> codec(value)
//! ```
//!
//! Identifiers are never reused. Deleting a value leaves the head pointer
//! untouched, so the next insertion still gets `head + 1`.

use std::marker::PhantomData;

use clearbook_types::{ClearbookError, EntityId, Identifiable, Result, invariant_violation};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{Codec, JsonCodec};
use crate::keys::{prefix_end, prefix_key, table_prefix};
use crate::kv::{IterDirection, KvStore};
use crate::ops;

const HEAD_KEY: &[u8] = b"head";
const VALUE_PREFIX: &[u8] = b"value/";

/// Registry of `T` values keyed by sequential [`EntityId`]s.
#[derive(Debug)]
pub struct Incrementing<S, T, C = JsonCodec> {
    store: S,
    codec: C,
    namespace: String,
    head_key: Vec<u8>,
    value_prefix: Vec<u8>,
    _marker: PhantomData<fn() -> T>,
}

impl<S, T, C> Incrementing<S, T, C>
where
    S: KvStore,
    T: Identifiable + Serialize + DeserializeOwned,
    C: Codec,
{
    pub fn new(store: S, namespace: &str, codec: C) -> Self {
        let ns = table_prefix(namespace);
        Self {
            store,
            codec,
            namespace: namespace.to_string(),
            head_key: prefix_key(&ns, HEAD_KEY),
            value_prefix: prefix_key(&ns, VALUE_PREFIX),
            _marker: PhantomData,
        }
    }

    /// Last identifier handed out, or zero if none has been.
    #[must_use]
    pub fn head_id(&self) -> EntityId {
        match self.store.get(&self.head_key) {
            None => EntityId::ZERO,
            Some(raw) => EntityId::from_be_slice(&raw)
                .unwrap_or_else(|err| invariant_violation(format!("corrupt head pointer: {err}"))),
        }
    }

    /// Value stored under the head identifier.
    ///
    /// # Errors
    /// `NoEntities` before the first insertion; `NotFound` if the head value
    /// has since been removed.
    pub fn head(&self) -> Result<T> {
        let id = self.head_id();
        if id.is_zero() {
            return Err(ClearbookError::NoEntities);
        }
        self.by_id(id)
    }

    /// Assign the next identifier to `value` and persist it.
    ///
    /// The value and the new head pointer are written together.
    ///
    /// # Errors
    /// `IdAlreadyAssigned` if `value` already carries an id.
    pub fn insert(&mut self, value: &mut T) -> Result<EntityId> {
        if value.id().is_defined() {
            return Err(ClearbookError::IdAlreadyAssigned(value.id()));
        }
        let id = self.head_id().inc();
        value.set_id(id);

        let key = self.value_key(id);
        if let Err(err) = ops::set_not_exists(&mut self.store, &self.codec, &key, &*value) {
            value.set_id(EntityId::ZERO);
            return Err(err);
        }
        self.store.set(&self.head_key, &id.to_be_bytes());
        tracing::trace!(namespace = %self.namespace, id = %id, "registry insert");
        Ok(id)
    }

    /// Overwrite the stored value with the same id.
    ///
    /// # Errors
    /// `NotFound` if nothing is stored under `value.id()`.
    pub fn update(&mut self, value: &T) -> Result<()> {
        let key = self.value_key(value.id());
        ops::set_exists(&mut self.store, &self.codec, &key, value)
    }

    /// Delete the value stored under `id`. The id is not reissued.
    ///
    /// # Errors
    /// `NotFound` if nothing is stored under `id`.
    pub fn remove(&mut self, id: EntityId) -> Result<()> {
        let key = self.value_key(id);
        ops::del(&mut self.store, &key)
    }

    /// # Errors
    /// `NotFound` if no value is stored under `id`.
    pub fn by_id(&self, id: EntityId) -> Result<T> {
        ops::get(&self.store, &self.codec, &self.value_key(id))
    }

    #[must_use]
    pub fn has_id(&self, id: EntityId) -> bool {
        self.store.has(&self.value_key(id))
    }

    /// Visit stored values in ascending id order.
    pub fn iterator(&self, cb: impl FnMut(T) -> bool) {
        self.scan(IterDirection::Forward, cb);
    }

    /// Visit stored values in descending id order.
    pub fn reverse_iterator(&self, cb: impl FnMut(T) -> bool) {
        self.scan(IterDirection::Reverse, cb);
    }

    fn scan(&self, direction: IterDirection, mut cb: impl FnMut(T) -> bool) {
        let end = prefix_end(&self.value_prefix);
        self.store
            .iterate(&self.value_prefix, end.as_deref(), direction, &mut |_, v| {
                cb(self.codec.must_unmarshal(v))
            });
    }

    /// Store key of the value with this id.
    #[must_use]
    pub fn value_key(&self, id: EntityId) -> Vec<u8> {
        prefix_key(&self.value_prefix, &id.to_be_bytes())
    }

    #[must_use]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    #[must_use]
    pub fn backend(&self) -> &S {
        &self.store
    }

    /// The substrate, for keys kept beside the registry such as secondary
    /// indexes. Writes under this registry's own prefixes corrupt it.
    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
