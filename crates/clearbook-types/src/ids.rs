//! Identifiers used throughout Clearbook.
//!
//! Entity IDs are sequential `u64`s handed out by an incrementing registry.
//! Their byte form is fixed-width big-endian so that lexicographic key order
//! in the store equals numeric order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ClearbookError, Result};

/// Block height. All timing in the exchange core is expressed in blocks.
pub type BlockHeight = u64;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Strictly ordered numeric identifier. Zero means "undefined".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl EntityId {
    /// The undefined identifier.
    pub const ZERO: Self = Self(0);

    /// Width of the encoded key form.
    pub const ENCODED_LEN: usize = 8;

    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn is_defined(self) -> bool {
        !self.is_zero()
    }

    /// The next identifier in sequence.
    ///
    /// # Panics
    /// Panics on `u64` overflow; a registry that has handed out `u64::MAX`
    /// identifiers cannot continue without reusing one.
    #[must_use]
    pub fn inc(self) -> Self {
        Self(
            self.0
                .checked_add(1)
                .unwrap_or_else(|| crate::invariant_violation("entity id space exhausted")),
        )
    }

    /// Fixed-width big-endian encoding.
    #[must_use]
    pub fn to_be_bytes(self) -> [u8; Self::ENCODED_LEN] {
        self.0.to_be_bytes()
    }

    /// Decode from the fixed-width big-endian form.
    ///
    /// # Errors
    /// Returns `Codec` if `bytes` is not exactly eight bytes long.
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; Self::ENCODED_LEN] = bytes.try_into().map_err(|_| {
            ClearbookError::Codec(format!(
                "entity id must be {} bytes, got {}",
                Self::ENCODED_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(u64::from_be_bytes(raw)))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A value whose identity is assigned by an incrementing registry.
pub trait Identifiable {
    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account address on the surrounding ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Short hex form for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ClearbookError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| ClearbookError::Codec(format!("invalid address {s}: {e}")))?;
        let raw: [u8; 20] = bytes.try_into().map_err(|_| {
            ClearbookError::Codec(format!("invalid address {s}: expected 20 bytes"))
        })?;
        Ok(Self(raw))
    }
}

// ---------------------------------------------------------------------------
// MarketPair
// ---------------------------------------------------------------------------

/// A trading pair (e.g., XAR/USDX).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MarketPair {
    pub base: String,
    pub quote: String,
}

impl MarketPair {
    #[must_use]
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

impl fmt::Display for MarketPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
