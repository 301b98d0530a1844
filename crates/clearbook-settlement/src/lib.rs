//! # clearbook-settlement
//!
//! The end-of-block half of the **Clearbook** exchange core.
//!
//! Once per block the [`ExecutionKeeper`] expires stale orders, clears every
//! market as one sealed-bid batch auction and settles the result through the
//! order keeper. Everything it decides is published as events, which the
//! archives below consume.
//!
//! ## Architecture
//!
//! - [`execution`]: expiry, clearing and settlement per block
//! - [`fill_archive`]: fills keyed by block then order id
//! - [`batch_archive`]: batches keyed by market then block
//! - [`supply_conservation`]: mint/burn tracking and custody reconciliation

pub mod batch_archive;
pub mod execution;
pub mod fill_archive;
pub mod supply_conservation;

pub use batch_archive::{BATCH_TABLE, BatchKeeper};
pub use execution::{BatchSummary, BlockInfo, BlockReport, ExecutionKeeper};
pub use fill_archive::{FILL_TABLE, FillKeeper};
pub use supply_conservation::{SupplyConservation, verify_custody};
