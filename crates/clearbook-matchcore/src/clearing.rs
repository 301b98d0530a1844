//! Clearing price computation for batch auctions.
//!
//! Demand at a price `p` is the total quantity bid at or above `p`; supply is
//! the total quantity asked at or below `p`. The volume that can trade at `p`
//! is `min(demand, supply)`. The clearing price maximizes that volume.
//!
//! Both curves are step functions that change only at book prices, so it is
//! enough to evaluate them at the distinct prices present in the book. Demand
//! never increases with price and supply never decreases, so every price
//! between the lowest (`lo`) and highest (`hi`) volume-maximizing book price
//! reaches the same volume. The clearing price is the integer midpoint of
//! that band.

use std::collections::BTreeSet;

use clearbook_types::invariant_violation;

use crate::OrderBook;

/// Result of clearing price computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearingResult {
    /// The uniform clearing price, if any volume can trade.
    pub clearing_price: Option<u128>,
    /// Maximum tradable volume, reached at the clearing price.
    pub matched_volume: u128,
    /// Lowest and highest book prices reaching `matched_volume`.
    pub band: Option<(u128, u128)>,
    pub best_bid: Option<u128>,
    pub best_ask: Option<u128>,
}

impl ClearingResult {
    fn none(book: &OrderBook) -> Self {
        Self {
            clearing_price: None,
            matched_volume: 0,
            band: None,
            best_bid: book.best_bid(),
            best_ask: book.best_ask(),
        }
    }
}

/// Compute the volume-maximizing uniform clearing price for `book`.
///
/// Algorithm:
/// 1. Collect the distinct bid and ask prices
/// 2. Evaluate cumulative demand (walking bids top-down) and cumulative
///    supply (walking asks bottom-up) at each of them
/// 3. Take the maximum of `min(demand, supply)`; zero means no clearing
/// 4. Clearing price = `lo + (hi - lo) / 2`
#[must_use]
pub fn compute_clearing_price(book: &OrderBook) -> ClearingResult {
    if !book.is_crossed() {
        return ClearingResult::none(book);
    }

    let prices: Vec<u128> = book
        .bid_levels()
        .map(|l| l.price)
        .chain(book.ask_levels().map(|l| l.price))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // Supply at each candidate, ascending.
    let mut supply = Vec::with_capacity(prices.len());
    let mut asks = book.ask_levels().peekable();
    let mut cum = 0u128;
    for &p in &prices {
        while let Some(level) = asks.next_if(|l| l.price <= p) {
            cum = cum
                .checked_add(level.total_quantity())
                .unwrap_or_else(|| invariant_violation("book side quantity overflows"));
        }
        supply.push(cum);
    }

    // Demand at each candidate, filled from the top down.
    let mut demand = vec![0u128; prices.len()];
    let mut bids = book.bid_levels().peekable();
    cum = 0;
    for (i, &p) in prices.iter().enumerate().rev() {
        while let Some(level) = bids.next_if(|l| l.price >= p) {
            cum = cum
                .checked_add(level.total_quantity())
                .unwrap_or_else(|| invariant_violation("book side quantity overflows"));
        }
        demand[i] = cum;
    }

    let mut best = 0u128;
    let mut band: Option<(u128, u128)> = None;
    for (i, &p) in prices.iter().enumerate() {
        let volume = demand[i].min(supply[i]);
        if volume == 0 {
            continue;
        }
        if volume > best {
            best = volume;
            band = Some((p, p));
        } else if volume == best {
            if let Some((_, hi)) = band.as_mut() {
                *hi = p;
            }
        }
    }

    let Some((lo, hi)) = band else {
        return ClearingResult::none(book);
    };

    ClearingResult {
        clearing_price: Some(lo + (hi - lo) / 2),
        matched_volume: best,
        band,
        best_bid: book.best_bid(),
        best_ask: book.best_ask(),
    }
}
