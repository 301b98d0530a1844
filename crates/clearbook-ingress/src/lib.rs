//! # clearbook-ingress
//!
//! **Order ingress**: everything between a signed message and a resting,
//! fully escrowed order.
//!
//! ## Architecture
//!
//! 1. **Ledger**: the narrow interface to the account balance module
//!    ([`BankLedger`] is the in-memory implementation)
//! 2. **MarketRegistry**: read-only market lookup ([`MarketKeeper`])
//! 3. **Escrow**: what an order locks, in which asset
//! 4. **OrderKeeper**: sole writer of order state; escrows on post, refunds
//!    on cancel, and is the only path through which clearing mutates orders
//! 5. **Handler**: message routing and ownership checks
//!
//! ## Order Flow
//!
//! ```text
//! Msg::Post → handle_msg → OrderKeeper::post
//!     → escrow_for → Ledger::debit_to_module → registry insert → OrderCreated
//! ```
//!
//! Every order in the store is backed by exactly its escrow in module custody.

pub mod bank;
pub mod escrow;
pub mod handler;
pub mod ledger;
pub mod market;
pub mod order_keeper;

pub use bank::BankLedger;
pub use escrow::{Escrow, escrow_for, held_escrow};
pub use handler::{Msg, MsgResult, handle_msg};
pub use ledger::Ledger;
pub use market::{MarketKeeper, MarketRegistry};
pub use order_keeper::{MarketDepth, OrderKeeper};
