//! Integration test: determinism and optimality of the batch auction.
//!
//! Any node replaying the same block must produce the same outcome, whatever
//! order it happened to read the open orders in. The outcome must also trade
//! the maximum volume the book allows.

use clearbook_matchcore::{ClearingPolicy, clear_auction, compute_fill_root};
use clearbook_types::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const POLICY: ClearingPolicy = ClearingPolicy {
    price_decimals: 0,
    min_remainder_qty: 1,
};

fn random_book(rng: &mut StdRng, n: u64) -> Vec<Order> {
    (1..=n)
        .map(|id| {
            let direction = if rng.gen_bool(0.5) {
                Direction::Bid
            } else {
                Direction::Ask
            };
            let mut order = Order::dummy_with_id(
                id,
                direction,
                rng.gen_range(1..=60),
                rng.gen_range(1..=25),
            );
            order.owner = Address([u8::try_from(id % 7).unwrap(); 20]);
            order
        })
        .collect()
}

fn volume_at(orders: &[Order], price: u128) -> u128 {
    let demand: u128 = orders
        .iter()
        .filter(|o| o.direction == Direction::Bid && o.price >= price)
        .map(|o| o.quantity)
        .sum();
    let supply: u128 = orders
        .iter()
        .filter(|o| o.direction == Direction::Ask && o.price <= price)
        .map(|o| o.quantity)
        .sum();
    demand.min(supply)
}

fn fills_of(outcome: &clearbook_matchcore::ClearingOutcome, block: u64) -> Vec<Fill> {
    outcome
        .allocations
        .iter()
        .map(|a| Fill {
            order_id: a.order_id,
            owner: a.owner,
            pair: MarketPair::new("base", "quote"),
            direction: a.direction,
            qty_filled: a.filled,
            qty_unfilled: a.remaining,
            block_number: block,
            price: outcome.clearing_price,
        })
        .collect()
}

#[test]
fn outcome_independent_of_input_order() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let orders = random_book(&mut rng, 30);
        let reference = clear_auction(&orders, &POLICY);

        for _ in 0..5 {
            let mut shuffled = orders.clone();
            shuffled.shuffle(&mut rng);
            let outcome = clear_auction(&shuffled, &POLICY);
            assert_eq!(outcome, reference, "shuffling the input changed the outcome");

            if let (Some(a), Some(b)) = (&outcome, &reference) {
                assert_eq!(
                    compute_fill_root(&fills_of(a, 7)),
                    compute_fill_root(&fills_of(b, 7))
                );
            }
        }
    }
}

#[test]
fn clearing_price_maximizes_volume() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let orders = random_book(&mut rng, 20);
        let best = (1..=60).map(|p| volume_at(&orders, p)).max().unwrap_or(0);

        match clear_auction(&orders, &POLICY) {
            None => assert_eq!(best, 0, "book could trade {best} but did not clear"),
            Some(outcome) => {
                assert_eq!(outcome.matched_volume, best);
                assert_eq!(volume_at(&orders, outcome.clearing_price), best);
            }
        }
    }
}

#[test]
fn allocations_conserve_base_and_quote() {
    let mut rng = StdRng::seed_from_u64(1234);
    for _ in 0..100 {
        let orders = random_book(&mut rng, 25);
        let Some(outcome) = clear_auction(&orders, &POLICY) else {
            continue;
        };

        let bought: u128 = outcome.bid_allocations().map(|a| a.filled).sum();
        let sold: u128 = outcome.ask_allocations().map(|a| a.filled).sum();
        assert_eq!(bought, outcome.matched_volume);
        assert_eq!(sold, outcome.matched_volume);

        let paid: u128 = outcome.bid_allocations().map(|a| a.quote_amount).sum();
        let received: u128 = outcome.ask_allocations().map(|a| a.quote_amount).sum();
        assert_eq!(paid, received);

        for a in &outcome.allocations {
            assert!(a.filled > 0);
            assert_eq!(a.filled + a.remaining + a.released, a.quantity_before);
            assert!(a.limit_price >= outcome.clearing_price || a.direction == Direction::Ask);
            assert!(a.limit_price <= outcome.clearing_price || a.direction == Direction::Bid);
            if a.direction == Direction::Bid {
                // Never pays more than was escrowed.
                assert!(a.quote_amount <= a.limit_price * a.quantity_before);
            }
        }
    }
}
