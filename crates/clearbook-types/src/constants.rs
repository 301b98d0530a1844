//! System-wide constants for the Clearbook exchange core.

/// Default number of decimal places carried by a price (price of one base
/// unit, in quote units, scaled by `10^PRICE_DECIMALS`).
pub const DEFAULT_PRICE_DECIMALS: u32 = 8;

/// Largest supported price scale. `10^38` is the largest power of ten that
/// fits in a `u128`.
pub const MAX_PRICE_DECIMALS: u32 = 38;

/// Default upper bound on an order's time-in-force, in blocks.
pub const DEFAULT_MAX_TIME_IN_FORCE: u16 = 600;

/// Default minimum remainder (base units) for a partially filled order to
/// stay on the book. `1` keeps every non-empty remainder.
pub const DEFAULT_MIN_REMAINDER_QTY: u128 = 1;

/// Default cap on open orders one market may hold.
pub const DEFAULT_MAX_ORDERS_PER_MARKET: usize = 100_000;
