//! # clearbook-store
//!
//! Persistence building blocks for the **Clearbook** exchange core.
//!
//! Everything here sits on top of one narrow abstraction, the ordered
//! byte-keyed [`KvStore`]. On top of it:
//!
//! - [`keys`]: prefix / subkey encoding (fixed-width big-endian, so byte order
//!   is numeric order)
//! - [`Codec`] / [`JsonCodec`]: opaque marshal / unmarshal capability
//! - [`ArchiveStore`]: append-only named table with forward and reverse
//!   prefix scans
//! - [`Incrementing`]: registry that assigns strictly increasing ids
//! - [`ops`]: keyed get / has / set / delete with existence checks
//!
//! Reads always go to the substrate. Nothing is cached.

pub mod archive;
pub mod codec;
pub mod incrementing;
pub mod keys;
pub mod kv;
pub mod ops;

pub use archive::ArchiveStore;
pub use codec::{Codec, JsonCodec};
pub use incrementing::Incrementing;
pub use kv::{IterDirection, KvStore, MemKv};
