//! Pure deterministic batch auction.
//!
//! The core function: takes the open orders of one market and produces the
//! clearing outcome. No side effects, no store access, no ledger calls.
//!
//! ```text
//! clear_auction(&[Order], &ClearingPolicy) -> Option<ClearingOutcome>
//! ```
//!
//! ## Allocation
//!
//! At the clearing price the side with the smaller eligible quantity (the
//! short side) fills in full. The long side fills by price priority, level by
//! level; the level where the matched volume runs out is shared pro-rata by
//! quantity with [`distribute`](crate::distribute).
//!
//! ## Settlement amounts
//!
//! Each bid pays `floor(cp * filled / 10^d)` quote. The sum of those payments
//! is split across filled asks pro-rata by filled quantity, so the quote paid
//! equals the quote received to the unit.

use clearbook_types::{
    Address, AggregatePrice, ClearbookError, Direction, EntityId, ExchangeConfig, Order, invariant_violation,
    normalize_quote_quantity, quote_value_floor,
};

use crate::allocation::distribute;
use crate::clearing::compute_clearing_price;
use crate::{OrderBook, PriceLevel};

/// Parameters of one clearing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearingPolicy {
    pub price_decimals: u32,
    /// A touched order left with fewer base units than this is closed.
    pub min_remainder_qty: u128,
}

impl From<&ExchangeConfig> for ClearingPolicy {
    fn from(cfg: &ExchangeConfig) -> Self {
        Self {
            price_decimals: cfg.price_decimals,
            min_remainder_qty: cfg.min_remainder_qty,
        }
    }
}

/// One order's share of a clearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub order_id: EntityId,
    pub owner: Address,
    pub direction: Direction,
    /// The order's limit price.
    pub limit_price: u128,
    /// Open quantity before this clearing.
    pub quantity_before: u128,
    pub filled: u128,
    /// Quantity left open on the book. Zero when the order closes.
    pub remaining: u128,
    /// Unfilled quantity released because the order closed below the
    /// remainder threshold.
    pub released: u128,
    pub closes: bool,
    /// Quote paid (bid) or received (ask).
    pub quote_amount: u128,
}

/// Everything a clearing run decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearingOutcome {
    pub market_id: EntityId,
    pub clearing_price: u128,
    /// Base volume traded.
    pub matched_volume: u128,
    /// Quote volume traded.
    pub quote_volume: u128,
    /// Cumulative demand over the whole book, highest price first.
    pub bids: Vec<AggregatePrice>,
    /// Cumulative supply over the whole book, lowest price first.
    pub asks: Vec<AggregatePrice>,
    /// Touched orders, ascending by id.
    pub allocations: Vec<Allocation>,
}

impl ClearingOutcome {
    pub fn bid_allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations
            .iter()
            .filter(|a| a.direction == Direction::Bid)
    }

    pub fn ask_allocations(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations
            .iter()
            .filter(|a| a.direction == Direction::Ask)
    }
}

/// Clear one market's open orders.
///
/// All orders must belong to the same market and carry distinct ids; a
/// violation of either is fatal. Returns `None` for an empty, one-sided or
/// uncrossed book. Once a side's total quantity reaches `u128::MAX`, later
/// ids on that side sit out the run.
///
/// ## Determinism Guarantee
///
/// The outcome depends only on the set of orders and the policy, never on
/// the order of the input slice.
#[must_use]
pub fn clear_auction(orders: &[Order], policy: &ClearingPolicy) -> Option<ClearingOutcome> {
    let first = orders.first()?;

    // 1. Build the book in id order, leaving out orders no escrow could back
    //    and orders that would overflow their side's total quantity
    let mut by_id: Vec<&Order> = orders.iter().collect();
    by_id.sort_by_key(|o| o.id);
    let mut book = OrderBook::new(first.market_id);
    for order in by_id {
        if order.price == 0 || order.quantity == 0 {
            tracing::warn!(order_id = %order.id, "excluding order with zero price or quantity");
            continue;
        }
        if order.direction == Direction::Bid {
            if let Err(err) =
                normalize_quote_quantity(order.price, order.quantity, policy.price_decimals)
            {
                tracing::warn!(order_id = %order.id, error = %err, "excluding bid from auction");
                continue;
            }
        }
        match book.insert_order(order.clone()) {
            Ok(()) => {}
            Err(err @ ClearbookError::InvalidAmount { .. }) => {
                tracing::warn!(order_id = %order.id, error = %err, "excluding order from auction");
            }
            Err(err) => invariant_violation(format!("inconsistent auction input: {err}")),
        }
    }

    // 2. Uniform clearing price
    let clearing = compute_clearing_price(&book);
    let clearing_price = clearing.clearing_price?;
    let volume = clearing.matched_volume;

    // 3. Quantities: short side in full, long side by priority then pro-rata
    let bid_fills = fill_levels(
        book.bid_levels().take_while(|l| l.price >= clearing_price),
        volume,
    );
    let ask_fills = fill_levels(
        book.ask_levels().take_while(|l| l.price <= clearing_price),
        volume,
    );

    // 4. Quote amounts
    let mut quote_volume = 0u128;
    let mut allocations = Vec::with_capacity(bid_fills.len() + ask_fills.len());
    for (order, filled) in bid_fills {
        let paid = quote_value_floor(clearing_price, filled, policy.price_decimals)
            .unwrap_or_else(|| invariant_violation(format!("bid {} payment overflows", order.id)));
        quote_volume = quote_volume
            .checked_add(paid)
            .unwrap_or_else(|| invariant_violation("quote volume overflows"));
        allocations.push(allocate(order, filled, paid, policy));
    }

    let weights: Vec<(EntityId, u128)> = ask_fills.iter().map(|(o, f)| (o.id, *f)).collect();
    let proceeds = distribute(quote_volume, &weights);
    for ((order, filled), received) in ask_fills.into_iter().zip(proceeds) {
        allocations.push(allocate(order, filled, received, policy));
    }

    allocations.sort_by_key(|a| a.order_id);

    Some(ClearingOutcome {
        market_id: book.market_id,
        clearing_price,
        matched_volume: volume,
        quote_volume,
        bids: book.demand_curve(),
        asks: book.supply_curve(),
        allocations,
    })
}

/// Fill `volume` from `levels` in priority order. Orders that receive
/// nothing are omitted.
fn fill_levels<'a>(
    levels: impl Iterator<Item = &'a PriceLevel>,
    volume: u128,
) -> Vec<(&'a Order, u128)> {
    let mut fills = Vec::new();
    let mut left = volume;
    for level in levels {
        if left == 0 {
            break;
        }
        let level_total = level.total_quantity();
        if level_total <= left {
            fills.extend(level.orders.iter().map(|o| (o, o.quantity)));
            left -= level_total;
        } else {
            let shares = distribute(left, &level.weights());
            fills.extend(
                level
                    .orders
                    .iter()
                    .zip(shares)
                    .filter(|(_, share)| *share > 0),
            );
            left = 0;
        }
    }
    fills
}

fn allocate(order: &Order, filled: u128, quote_amount: u128, policy: &ClearingPolicy) -> Allocation {
    let remainder = order
        .quantity
        .checked_sub(filled)
        .unwrap_or_else(|| invariant_violation(format!("order {} overfilled", order.id)));

    let dust_bid = order.direction == Direction::Bid
        && quote_value_floor(order.price, remainder, policy.price_decimals) == Some(0);
    let closes = remainder == 0 || remainder < policy.min_remainder_qty || dust_bid;

    Allocation {
        order_id: order.id,
        owner: order.owner,
        direction: order.direction,
        limit_price: order.price,
        quantity_before: order.quantity,
        filled,
        remaining: if closes { 0 } else { remainder },
        released: if closes { remainder } else { 0 },
        closes,
        quote_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: u128 = 100_000_000;

    fn policy(min_remainder_qty: u128) -> ClearingPolicy {
        ClearingPolicy {
            price_decimals: 8,
            min_remainder_qty,
        }
    }

    fn order(id: u64, direction: Direction, price: u128, qty: u128) -> Order {
        Order::dummy_with_id(id, direction, price * UNIT, qty)
    }

    fn alloc(outcome: &ClearingOutcome, id: u64) -> &Allocation {
        outcome
            .allocations
            .iter()
            .find(|a| a.order_id == EntityId(id))
            .unwrap()
    }

    #[test]
    fn empty_input_does_not_clear() {
        assert!(clear_auction(&[], &policy(1)).is_none());
    }

    #[test]
    fn one_sided_does_not_clear() {
        let orders = vec![order(1, Direction::Ask, 90, 10), order(2, Direction::Ask, 95, 3)];
        assert!(clear_auction(&orders, &policy(1)).is_none());
    }

    #[test]
    fn simple_cross() {
        let orders = vec![order(1, Direction::Bid, 100, 10), order(2, Direction::Ask, 90, 10)];
        let outcome = clear_auction(&orders, &policy(1)).unwrap();

        assert_eq!(outcome.clearing_price, 95 * UNIT);
        assert_eq!(outcome.matched_volume, 10);
        assert_eq!(outcome.quote_volume, 950);
        assert_eq!(outcome.allocations.len(), 2);

        let bid = alloc(&outcome, 1);
        assert_eq!((bid.filled, bid.remaining, bid.quote_amount), (10, 0, 950));
        assert!(bid.closes);
        let ask = alloc(&outcome, 2);
        assert_eq!((ask.filled, ask.remaining, ask.quote_amount), (10, 0, 950));
    }

    #[test]
    fn partial_fill_stays_open() {
        let orders = vec![order(1, Direction::Bid, 100, 10), order(2, Direction::Ask, 90, 4)];
        let outcome = clear_auction(&orders, &policy(1)).unwrap();
        let bid = alloc(&outcome, 1);
        assert_eq!((bid.filled, bid.remaining, bid.released), (4, 6, 0));
        assert!(!bid.closes);
        assert!(alloc(&outcome, 2).closes);
    }

    #[test]
    fn remainder_below_threshold_closes() {
        let orders = vec![order(1, Direction::Bid, 100, 10), order(2, Direction::Ask, 90, 4)];
        let outcome = clear_auction(&orders, &policy(7)).unwrap();
        let bid = alloc(&outcome, 1);
        assert_eq!((bid.filled, bid.remaining, bid.released), (4, 0, 6));
        assert!(bid.closes);
    }

    #[test]
    fn bid_with_dust_escrow_closes() {
        // Remainder of 1 base unit at 0.5 quote is worth zero quote units.
        let orders = vec![
            Order::dummy_with_id(1, Direction::Bid, UNIT / 2, 3),
            Order::dummy_with_id(2, Direction::Ask, UNIT / 2, 2),
        ];
        let outcome = clear_auction(&orders, &policy(1)).unwrap();
        let bid = alloc(&outcome, 1);
        assert_eq!(bid.filled, 2);
        assert!(bid.closes);
        assert_eq!(bid.released, 1);
    }

    #[test]
    fn marginal_level_shared_pro_rata() {
        // Asks are short (6). Bids at the single level share 6 in 2:1.
        let orders = vec![
            order(1, Direction::Bid, 100, 6),
            order(2, Direction::Bid, 100, 3),
            order(3, Direction::Ask, 100, 6),
        ];
        let outcome = clear_auction(&orders, &policy(1)).unwrap();
        assert_eq!(alloc(&outcome, 1).filled, 4);
        assert_eq!(alloc(&outcome, 2).filled, 2);
        assert_eq!(alloc(&outcome, 3).filled, 6);
    }

    #[test]
    fn price_priority_before_pro_rata() {
        let orders = vec![
            order(1, Direction::Bid, 100, 5),
            order(2, Direction::Bid, 110, 5),
            order(3, Direction::Bid, 100, 5),
            order(4, Direction::Ask, 100, 7),
        ];
        let outcome = clear_auction(&orders, &policy(1)).unwrap();
        assert_eq!(alloc(&outcome, 2).filled, 5);
        // 2 left for two equal orders at 100.
        assert_eq!(alloc(&outcome, 1).filled, 1);
        assert_eq!(alloc(&outcome, 3).filled, 1);
    }

    #[test]
    fn quote_paid_equals_quote_received() {
        let orders = vec![
            Order::dummy_with_id(1, Direction::Bid, 333_333_333, 7),
            Order::dummy_with_id(2, Direction::Bid, 310_000_001, 11),
            Order::dummy_with_id(3, Direction::Ask, 290_000_000, 5),
            Order::dummy_with_id(4, Direction::Ask, 300_000_017, 9),
        ];
        let outcome = clear_auction(&orders, &policy(1)).unwrap();
        let paid: u128 = outcome.bid_allocations().map(|a| a.quote_amount).sum();
        let received: u128 = outcome.ask_allocations().map(|a| a.quote_amount).sum();
        assert_eq!(paid, received);
        assert_eq!(paid, outcome.quote_volume);

        let bought: u128 = outcome.bid_allocations().map(|a| a.filled).sum();
        let sold: u128 = outcome.ask_allocations().map(|a| a.filled).sum();
        assert_eq!(bought, outcome.matched_volume);
        assert_eq!(sold, outcome.matched_volume);
    }

    #[test]
    fn unbackable_bid_is_excluded() {
        // 1 base unit at 10^-8 quote normalizes to zero quote.
        let orders = vec![
            Order::dummy_with_id(1, Direction::Bid, 1, 1),
            order(2, Direction::Ask, 1, 1),
        ];
        assert!(clear_auction(&orders, &policy(1)).is_none());
    }

    #[test]
    fn curves_cover_whole_book() {
        let orders = vec![
            order(1, Direction::Bid, 100, 10),
            order(2, Direction::Bid, 80, 10),
            order(3, Direction::Ask, 90, 10),
        ];
        let outcome = clear_auction(&orders, &policy(1)).unwrap();
        assert_eq!(outcome.bids.len(), 2);
        assert_eq!(outcome.asks, vec![AggregatePrice::new(90 * UNIT, 10)]);
    }

    #[test]
    fn bids_past_u128_at_one_level_clear() {
        // Each bid is backable on its own, but the second pushes the bid
        // side past u128::MAX.
        let half = 1u128 << 127;
        let orders = vec![
            Order::dummy_with_id(1, Direction::Bid, 1, half),
            Order::dummy_with_id(2, Direction::Bid, 1, half),
            Order::dummy_with_id(3, Direction::Bid, 1, half),
            Order::dummy_with_id(4, Direction::Ask, 1, 10),
        ];
        let outcome = clear_auction(&orders, &policy(1)).unwrap();
        assert_eq!(outcome.clearing_price, 1);
        assert_eq!(outcome.matched_volume, 10);
        assert_eq!(alloc(&outcome, 1).filled, 10);
        assert_eq!(alloc(&outcome, 4).filled, 10);
        assert_eq!(outcome.allocations.len(), 2);
        assert_eq!(outcome.bids, vec![AggregatePrice::new(1, half)]);
    }

    #[test]
    fn level_summing_to_u128_max_splits_pro_rata() {
        let half = 1u128 << 127;
        let orders = vec![
            Order::dummy_with_id(1, Direction::Bid, 1, half),
            Order::dummy_with_id(2, Direction::Bid, 1, half - 1),
            Order::dummy_with_id(3, Direction::Ask, 1, 10),
        ];
        let outcome = clear_auction(&orders, &policy(1)).unwrap();
        assert_eq!(outcome.bids, vec![AggregatePrice::new(1, u128::MAX)]);
        assert_eq!(alloc(&outcome, 1).filled, 5);
        assert_eq!(alloc(&outcome, 2).filled, 5);
        assert!(!alloc(&outcome, 1).closes);

        let bought: u128 = outcome.bid_allocations().map(|a| a.filled).sum();
        assert_eq!(bought, outcome.matched_volume);
        let paid: u128 = outcome.bid_allocations().map(|a| a.quote_amount).sum();
        assert_eq!(paid, outcome.quote_volume);
    }

    #[test]
    fn side_overflow_exclusion_ignores_input_order() {
        let half = 1u128 << 127;
        let mut orders = vec![
            Order::dummy_with_id(3, Direction::Bid, 2, half),
            Order::dummy_with_id(1, Direction::Bid, 1, half),
            Order::dummy_with_id(2, Direction::Bid, 3, half),
            Order::dummy_with_id(4, Direction::Ask, 1, 1_000),
        ];
        let forward = clear_auction(&orders, &policy(1)).unwrap();
        orders.reverse();
        let backward = clear_auction(&orders, &policy(1)).unwrap();
        assert_eq!(forward, backward);

        // Lowest id keeps its place; the later ones sit out.
        assert_eq!(forward.clearing_price, 1);
        assert_eq!(alloc(&forward, 1).filled, 1_000);
        assert_eq!(forward.allocations.len(), 2);
    }
}
