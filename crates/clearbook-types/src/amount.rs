//! Integer amount arithmetic shared by escrow and clearing.
//!
//! Prices are integers: the quote-asset amount for one base unit, scaled by
//! `10^price_decimals`. Quantities are integers in base units. No floating
//! point is used anywhere on the consensus path.

use rust_decimal::Decimal;

use crate::{ClearbookError, Result};

/// `10^decimals` as a `u128`.
///
/// # Errors
/// Returns `Configuration` if the scale does not fit in a `u128`.
pub fn price_unit(decimals: u32) -> Result<u128> {
    10u128
        .checked_pow(decimals)
        .ok_or_else(|| ClearbookError::Configuration(format!("price scale 10^{decimals} overflows")))
}

/// Quote value of `quantity` base units at `price`, rounded down.
///
/// Returns `None` on overflow. A zero result is allowed here; see
/// [`normalize_quote_quantity`] for the strict form used at posting time.
#[must_use]
pub fn quote_value_floor(price: u128, quantity: u128, decimals: u32) -> Option<u128> {
    let unit = 10u128.checked_pow(decimals)?;
    price.checked_mul(quantity).map(|notional| notional / unit)
}

/// Normalize `price × quantity` to the quote asset's integer unit.
///
/// This is the escrow amount of a bid and the figure every clearing event
/// recomputes for it.
///
/// # Errors
/// Returns `InvalidAmount` when the product overflows or rounds to zero.
pub fn normalize_quote_quantity(price: u128, quantity: u128, decimals: u32) -> Result<u128> {
    let notional = quote_value_floor(price, quantity, decimals).ok_or_else(|| {
        ClearbookError::invalid_amount(format!("quote quantity overflows: {price} x {quantity}"))
    })?;
    if notional == 0 {
        return Err(ClearbookError::invalid_amount(format!(
            "quote quantity rounds to zero: {price} x {quantity}"
        )));
    }
    Ok(notional)
}

/// Human-readable decimal for log lines and query responses.
///
/// Returns `None` when the value does not fit a `Decimal` at that scale.
#[must_use]
pub fn to_decimal(raw: u128, decimals: u32) -> Option<Decimal> {
    let signed = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(signed, decimals).ok()
}
