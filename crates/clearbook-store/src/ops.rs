//! Keyed record helpers with existence checks.
//!
//! `set_exists` and `del` refuse to touch an absent key; `set_not_exists`
//! refuses to overwrite. Keepers build their create / update / remove
//! operations from these.

use clearbook_types::{ClearbookError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::Codec;
use crate::kv::KvStore;

fn describe(key: &[u8]) -> String {
    format!("key {}", hex::encode(key))
}

/// Decode the record under `key`.
///
/// # Errors
/// `NotFound` when absent.
pub fn get<S, C, T>(store: &S, codec: &C, key: &[u8]) -> Result<T>
where
    S: KvStore + ?Sized,
    C: Codec,
    T: DeserializeOwned,
{
    let raw = store
        .get(key)
        .ok_or_else(|| ClearbookError::not_found(describe(key)))?;
    Ok(codec.must_unmarshal(&raw))
}

#[must_use]
pub fn has<S: KvStore + ?Sized>(store: &S, key: &[u8]) -> bool {
    store.has(key)
}

/// Overwrite an existing record.
///
/// # Errors
/// `NotFound` when absent.
pub fn set_exists<S, C, T>(store: &mut S, codec: &C, key: &[u8], value: &T) -> Result<()>
where
    S: KvStore + ?Sized,
    C: Codec,
    T: Serialize,
{
    if !store.has(key) {
        return Err(ClearbookError::not_found(describe(key)));
    }
    store.set(key, &codec.marshal(value)?);
    Ok(())
}

/// Create a record.
///
/// # Errors
/// `AlreadyExists` when present.
pub fn set_not_exists<S, C, T>(store: &mut S, codec: &C, key: &[u8], value: &T) -> Result<()>
where
    S: KvStore + ?Sized,
    C: Codec,
    T: Serialize,
{
    if store.has(key) {
        return Err(ClearbookError::AlreadyExists {
            what: describe(key),
        });
    }
    store.set(key, &codec.marshal(value)?);
    Ok(())
}

/// Remove a record.
///
/// # Errors
/// `NotFound` when absent.
pub fn del<S: KvStore + ?Sized>(store: &mut S, key: &[u8]) -> Result<()> {
    if !store.has(key) {
        return Err(ClearbookError::not_found(describe(key)));
    }
    store.delete(key);
    Ok(())
}
