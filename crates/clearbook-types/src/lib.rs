//! # clearbook-types
//!
//! Shared types, errors, and configuration for the **Clearbook** exchange core.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`EntityId`], [`Address`], [`MarketPair`], [`BlockHeight`]
//! - **Order model**: [`Order`], [`Direction`]
//! - **Market model**: [`Market`]
//! - **Clearing records**: [`Fill`], [`Batch`], [`AggregatePrice`]
//! - **Events**: [`ExchangeEvent`] and the [`EventSink`] / [`EventQueue`] plumbing
//! - **Amounts**: quote normalization shared by escrow and clearing
//! - **Configuration**: [`ExchangeConfig`]
//! - **Errors**: [`ClearbookError`] with `CB_ERR_` prefix codes

pub mod amount;
pub mod batch;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod fill;
pub mod ids;
pub mod market;
pub mod order;

// Re-export all primary types at crate root:
//   use clearbook_types::{Order, Direction, Fill, Batch, ...};

pub use amount::*;
pub use batch::*;
pub use config::*;
pub use error::*;
pub use events::*;
pub use fill::*;
pub use ids::*;
pub use market::*;
pub use order::*;

// Constants are accessed via `clearbook_types::constants::FOO`.
