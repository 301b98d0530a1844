//! # clearbook-matchcore
//!
//! **Pure deterministic batch auction clearing for Clearbook.**
//!
//! Given the open orders of one market, MatchCore computes the uniform
//! clearing price, who trades how much at it, and how much quote each side
//! pays or receives. It has:
//!
//! - **Zero side effects**: no store access, no ledger calls
//! - **Deterministic output**: the result does not depend on input order
//! - **Integer arithmetic only**: prices and quantities are `u128`
//! - **Exact conservation**: quote paid by bids equals quote received by asks

pub mod allocation;
pub mod clearing;
pub mod determinism;
pub mod matcher;
pub mod orderbook;
pub mod price_level;

pub use allocation::{distribute, mul_div_floor};
pub use clearing::{ClearingResult, compute_clearing_price};
pub use determinism::{compute_fill_root, verify_fill_root};
pub use matcher::{Allocation, ClearingOutcome, ClearingPolicy, clear_auction};
pub use orderbook::OrderBook;
pub use price_level::PriceLevel;
