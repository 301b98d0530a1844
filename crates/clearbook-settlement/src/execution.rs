//! End-of-block execution.
//!
//! Runs once per block, after every message of the block has been handled:
//! 1. Cancel orders whose time in force has run out (full refund)
//! 2. Group the remaining open orders by market, markets ascending
//! 3. Clear each market with [`clear_auction`]
//! 4. Settle every allocation through the order keeper and publish one
//!    [`Fill`] per touched order
//! 5. Publish one [`Batch`] per cleared market
//!
//! Settlement only ever pays out of module custody. Every payout is covered
//! by escrow taken at posting, so any shortfall or underflow here is an
//! invariant violation and halts the chain.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use clearbook_ingress::{Ledger, MarketRegistry, OrderKeeper};
use clearbook_matchcore::{Allocation, ClearingOutcome, ClearingPolicy, clear_auction, compute_fill_root};
use clearbook_store::{Codec, KvStore};
use clearbook_types::{
    Batch, BlockHeight, Direction, EntityId, ExchangeConfig, ExchangeEvent, Fill, Market, Order,
    Result, invariant_violation,
};

/// Consensus data for the block being finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub height: BlockHeight,
    pub time: DateTime<Utc>,
}

/// What clearing one market did in one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub market_id: EntityId,
    pub clearing_price: u128,
    pub matched_volume: u128,
    pub quote_volume: u128,
    pub fills: usize,
    /// SHA-256 over the batch's fills, for replay verification.
    pub fill_root: [u8; 32],
}

/// What one end-of-block run did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockReport {
    pub height: BlockHeight,
    /// Orders cancelled because their time in force ran out.
    pub expired: Vec<EntityId>,
    /// One entry per market that cleared.
    pub batches: Vec<BatchSummary>,
}

impl BlockReport {
    /// Nothing expired and nothing cleared.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.expired.is_empty() && self.batches.is_empty()
    }
}

/// Drives expiry, clearing and settlement at the end of each block.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionKeeper {
    policy: ClearingPolicy,
}

impl ExecutionKeeper {
    #[must_use]
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            policy: ClearingPolicy::from(config),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &ClearingPolicy {
        &self.policy
    }

    /// Finalize `block`. Events land in the keeper's queue.
    pub fn end_block<S, L, M, C>(
        &self,
        keeper: &mut OrderKeeper<S, L, M, C>,
        block: &BlockInfo,
    ) -> BlockReport
    where
        S: KvStore,
        L: Ledger,
        M: MarketRegistry,
        C: Codec,
    {
        let expired = expire_orders(keeper, block.height);

        let mut batches = Vec::new();
        for (market_id, orders) in keeper.open_orders_by_market() {
            let Some(outcome) = clear_auction(&orders, &self.policy) else {
                tracing::trace!(market_id = %market_id, "market did not clear");
                continue;
            };
            batches.push(settle_outcome(keeper, &orders, &outcome, block));
        }

        BlockReport {
            height: block.height,
            expired,
            batches,
        }
    }
}

/// Cancel every order whose time in force has run out at `height`.
fn expire_orders<S, L, M, C>(keeper: &mut OrderKeeper<S, L, M, C>, height: BlockHeight) -> Vec<EntityId>
where
    S: KvStore,
    L: Ledger,
    M: MarketRegistry,
    C: Codec,
{
    let mut due = Vec::new();
    keeper.iterator(|order| {
        if order.is_expired_at(height) {
            due.push(order.id);
        }
        true
    });

    for id in &due {
        let order = or_halt(keeper.cancel(*id), "expire order");
        tracing::info!(
            order_id = %id,
            market_id = %order.market_id,
            created_block = order.created_block,
            height,
            "order expired"
        );
    }
    due
}

fn settle_outcome<S, L, M, C>(
    keeper: &mut OrderKeeper<S, L, M, C>,
    orders: &[Order],
    outcome: &ClearingOutcome,
    block: &BlockInfo,
) -> BatchSummary
where
    S: KvStore,
    L: Ledger,
    M: MarketRegistry,
    C: Codec,
{
    let market = or_halt(keeper.markets().get_market(outcome.market_id), "resolve market");
    let pair = market.pair();

    let by_id: BTreeMap<EntityId, &Order> = orders.iter().map(|o| (o.id, o)).collect();
    let mut fills = Vec::with_capacity(outcome.allocations.len());
    for alloc in &outcome.allocations {
        let order = by_id.get(&alloc.order_id).copied().unwrap_or_else(|| {
            invariant_violation(format!("allocation for unknown order {}", alloc.order_id))
        });
        settle_allocation(keeper, &market, order, alloc);

        fills.push(Fill {
            order_id: alloc.order_id,
            owner: alloc.owner,
            pair: pair.clone(),
            direction: alloc.direction,
            qty_filled: alloc.filled,
            qty_unfilled: alloc.remaining,
            block_number: block.height,
            price: outcome.clearing_price,
        });
    }

    let fill_root = compute_fill_root(&fills);
    let summary = BatchSummary {
        market_id: outcome.market_id,
        clearing_price: outcome.clearing_price,
        matched_volume: outcome.matched_volume,
        quote_volume: outcome.quote_volume,
        fills: fills.len(),
        fill_root,
    };

    for fill in fills {
        tracing::debug!(
            order_id = %fill.order_id,
            direction = %fill.direction,
            filled = fill.qty_filled,
            unfilled = fill.qty_unfilled,
            "fill"
        );
        keeper.publish(ExchangeEvent::Fill(fill));
    }
    keeper.publish(ExchangeEvent::Batch(Batch {
        market_id: outcome.market_id,
        block_number: block.height,
        block_time: block.time,
        clearing_price: outcome.clearing_price,
        bids: outcome.bids.clone(),
        asks: outcome.asks.clone(),
    }));

    tracing::info!(
        market_id = %summary.market_id,
        height = block.height,
        clearing_price = summary.clearing_price,
        matched_volume = summary.matched_volume,
        quote_volume = summary.quote_volume,
        fills = summary.fills,
        fill_root = %hex::encode(summary.fill_root),
        "batch complete"
    );
    summary
}

/// Move one allocation's assets out of custody and update its order.
///
/// Bid: the buyer receives `filled` base; escrow freed beyond the payment is
/// refunded in quote. Ask: the seller receives its quote proceeds; a closed
/// ask gets its released remainder back in base.
fn settle_allocation<S, L, M, C>(
    keeper: &mut OrderKeeper<S, L, M, C>,
    market: &Market,
    order: &Order,
    alloc: &Allocation,
) where
    S: KvStore,
    L: Ledger,
    M: MarketRegistry,
    C: Codec,
{
    let mut updated = order.clone();
    updated.quantity = alloc.remaining;

    let escrow_before = keeper.escrow_of(order).amount;
    let escrow_after = keeper.escrow_of(&updated).amount;
    let freed = escrow_before.checked_sub(escrow_after).unwrap_or_else(|| {
        invariant_violation(format!(
            "order {} escrow grows from {escrow_before} to {escrow_after}",
            order.id
        ))
    });

    match alloc.direction {
        Direction::Bid => {
            let refund = freed.checked_sub(alloc.quote_amount).unwrap_or_else(|| {
                invariant_violation(format!(
                    "bid {} pays {} from {freed} freed escrow",
                    order.id, alloc.quote_amount
                ))
            });
            keeper.release_from_custody(order.owner, &market.base_asset_denom, alloc.filled);
            keeper.release_from_custody(order.owner, &market.quote_asset_denom, refund);
        }
        Direction::Ask => {
            let released = freed.checked_sub(alloc.filled).unwrap_or_else(|| {
                invariant_violation(format!(
                    "ask {} delivers {} from {freed} freed escrow",
                    order.id, alloc.filled
                ))
            });
            if released != alloc.released {
                invariant_violation(format!(
                    "ask {} frees {released} but releases {}",
                    order.id, alloc.released
                ));
            }
            keeper.release_from_custody(order.owner, &market.quote_asset_denom, alloc.quote_amount);
            keeper.release_from_custody(order.owner, &market.base_asset_denom, released);
        }
    }

    if alloc.closes {
        or_halt(keeper.del(order.id), "remove filled order");
    } else {
        or_halt(keeper.set(&updated), "update partially filled order");
    }
}

fn or_halt<T>(result: Result<T>, action: &str) -> T {
    result.unwrap_or_else(|err| invariant_violation(format!("{action}: {err}")))
}
