//! What an order locks while it rests on the book.
//!
//! A bid escrows the quote value of its open quantity at its limit price,
//! rounded down. An ask escrows its open quantity of the base asset. The
//! same function runs at posting, at cancellation and around every fill, so
//! custody always equals the escrow implied by open orders.

use clearbook_types::{Direction, Market, Order, Result, normalize_quote_quantity, quote_value_floor};

/// An amount of one asset held in module custody.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escrow {
    pub asset: String,
    pub amount: u128,
}

/// Escrow required to post an order. Strict: a bid whose quote value
/// overflows or rounds to zero is rejected.
///
/// # Errors
/// `InvalidAmount` for an unbackable bid notional.
pub fn escrow_for(
    market: &Market,
    direction: Direction,
    price: u128,
    quantity: u128,
    price_decimals: u32,
) -> Result<Escrow> {
    Ok(match direction {
        Direction::Bid => Escrow {
            asset: market.quote_asset_denom.clone(),
            amount: normalize_quote_quantity(price, quantity, price_decimals)?,
        },
        Direction::Ask => Escrow {
            asset: market.base_asset_denom.clone(),
            amount: quantity,
        },
    })
}

/// Escrow currently backing a resting order. Lenient: a dust remainder may
/// be worth zero quote units. `None` only on overflow, which a stored order
/// can never reach.
#[must_use]
pub fn held_escrow(market: &Market, order: &Order, price_decimals: u32) -> Option<Escrow> {
    match order.direction {
        Direction::Bid => Some(Escrow {
            asset: market.quote_asset_denom.clone(),
            amount: quote_value_floor(order.price, order.quantity, price_decimals)?,
        }),
        Direction::Ask => Some(Escrow {
            asset: market.base_asset_denom.clone(),
            amount: order.quantity,
        }),
    }
}
