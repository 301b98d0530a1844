//! Value encoding.
//!
//! Stores only ever see bytes. A [`Codec`] turns typed values into bytes and
//! back; it is passed explicitly to every component that persists records.

use clearbook_types::{ClearbookError, Result, invariant_violation};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Opaque marshal / unmarshal capability.
pub trait Codec {
    fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Marshal a value the caller constructed itself. Failure means the type
    /// cannot be represented at all, which is fatal.
    fn must_marshal<T: Serialize>(&self, value: &T) -> Vec<u8> {
        match self.marshal(value) {
            Ok(bytes) => bytes,
            Err(err) => invariant_violation(format!("marshal failed: {err}")),
        }
    }

    /// Unmarshal bytes this process wrote. Failure means stored state is
    /// corrupt, which is fatal.
    fn must_unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> T {
        match self.unmarshal(bytes) {
            Ok(value) => value,
            Err(err) => invariant_violation(format!("unmarshal failed: {err}")),
        }
    }
}

/// JSON codec on `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| ClearbookError::Codec(e.to_string()))
    }

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| ClearbookError::Codec(e.to_string()))
    }
}
