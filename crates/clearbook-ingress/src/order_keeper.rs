//! The order keeper: sole owner of order state.
//!
//! Orders live in an incrementing registry under the `order` namespace:
//!
//! ```text
//! order/head                              -> be(last assigned id)
//! order/value/<be(id)>                    -> codec(Order)
//! order/market/<be(market)>/<be(id)>      -> direction tag || be(quantity)
//! ```
//!
//! The market index lets per-market queries and the admission checks in
//! [`OrderKeeper::post`] touch only that market's entries. It is written
//! alongside every insert, update and removal of an order.
//!
//! Every stored order is backed by exactly its escrow in module custody.
//! [`OrderKeeper::post`] debits before it stores; [`OrderKeeper::cancel`]
//! refunds before it deletes. Clearing mutates orders only through
//! [`OrderKeeper::set`] and [`OrderKeeper::del`] and moves custody only
//! through [`OrderKeeper::release_from_custody`].

use std::collections::BTreeMap;

use clearbook_store::keys::{SEPARATOR, prefix_end, prefix_key, table_prefix, u64_subkey};
use clearbook_store::{Codec, Incrementing, IterDirection, JsonCodec, KvStore};
use clearbook_types::{
    Address, BlockHeight, ClearbookError, Direction, EntityId, EventQueue, ExchangeConfig,
    ExchangeEvent, Market, Order, OrderCancelled, OrderCreated, Result, invariant_violation,
};

use crate::escrow::{Escrow, escrow_for, held_escrow};
use crate::ledger::Ledger;
use crate::market::MarketRegistry;

/// Registry namespace for orders.
pub const ORDER_NAMESPACE: &str = "order";

const MARKET_INDEX: &[u8] = b"market/";

/// Open orders and resting quantity per side of one market.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarketDepth {
    pub orders: usize,
    pub bid_quantity: u128,
    pub ask_quantity: u128,
}

impl MarketDepth {
    #[must_use]
    pub fn side(&self, direction: Direction) -> u128 {
        match direction {
            Direction::Bid => self.bid_quantity,
            Direction::Ask => self.ask_quantity,
        }
    }
}

/// Owns the order registry, the ledger handle and the market lookup.
#[derive(Debug)]
pub struct OrderKeeper<S, L, M, C = JsonCodec> {
    orders: Incrementing<S, Order, C>,
    ledger: L,
    markets: M,
    config: ExchangeConfig,
    events: EventQueue,
}

impl<S: KvStore, L: Ledger, M: MarketRegistry> OrderKeeper<S, L, M> {
    pub fn new(store: S, ledger: L, markets: M, config: &ExchangeConfig) -> Self {
        Self::with_codec(store, JsonCodec, ledger, markets, config)
    }
}

impl<S, L, M, C> OrderKeeper<S, L, M, C>
where
    S: KvStore,
    L: Ledger,
    M: MarketRegistry,
    C: Codec,
{
    pub fn with_codec(store: S, codec: C, ledger: L, markets: M, config: &ExchangeConfig) -> Self {
        Self {
            orders: Incrementing::new(store, ORDER_NAMESPACE, codec),
            ledger,
            markets,
            config: config.clone(),
            events: EventQueue::new(),
        }
    }

    // =================================================================
    // Posting and cancellation
    // =================================================================

    /// Validate, escrow and store a new order.
    ///
    /// Nothing is written unless every step succeeds.
    ///
    /// # Errors
    /// - `InvalidAmount` for a zero price or quantity, or a bid whose quote
    ///   value overflows or rounds to zero
    /// - `InvalidTimeInForce` outside `1..=max_time_in_force`
    /// - `MarketNotFound` for an unknown market
    /// - `InvalidOrder` when the market's book is full
    /// - `InvalidAmount` when the quantity would push its side of the market
    ///   past `u128::MAX`
    /// - `InsufficientFunds` / `Unauthorized` from the ledger
    #[allow(clippy::too_many_arguments)]
    pub fn post(
        &mut self,
        height: BlockHeight,
        owner: Address,
        market_id: EntityId,
        direction: Direction,
        price: u128,
        quantity: u128,
        time_in_force_blocks: u16,
    ) -> Result<Order> {
        if price == 0 {
            return Err(ClearbookError::invalid_amount("price must be positive"));
        }
        if quantity == 0 {
            return Err(ClearbookError::invalid_amount("quantity must be positive"));
        }
        if time_in_force_blocks == 0 || time_in_force_blocks > self.config.max_time_in_force {
            return Err(ClearbookError::InvalidTimeInForce {
                blocks: time_in_force_blocks,
                max: self.config.max_time_in_force,
            });
        }

        let market = self.markets.get_market(market_id)?;
        let escrow = escrow_for(
            &market,
            direction,
            price,
            quantity,
            self.config.price_decimals,
        )?;

        let depth = self.market_depth(market_id);
        if depth.orders >= self.config.max_orders_per_market {
            return Err(ClearbookError::InvalidOrder {
                reason: format!("market {market_id} already holds {} open orders", depth.orders),
            });
        }
        if depth.side(direction).checked_add(quantity).is_none() {
            return Err(ClearbookError::invalid_amount(format!(
                "market {market_id} {direction} side cannot rest {quantity} more"
            )));
        }

        self.ledger
            .debit_to_module(owner, &escrow.asset, escrow.amount)?;

        let mut order = Order {
            id: EntityId::ZERO,
            owner,
            market_id,
            direction,
            price,
            quantity,
            time_in_force_blocks,
            created_block: height,
        };
        if let Err(err) = self.orders.insert(&mut order) {
            self.release_from_custody(owner, &escrow.asset, escrow.amount);
            return Err(err);
        }
        self.index_order(&order);

        tracing::debug!(
            order_id = %order.id,
            owner = %owner.short(),
            escrow = escrow.amount,
            asset = %escrow.asset,
            "order escrowed"
        );
        self.events
            .publish(ExchangeEvent::OrderCreated(OrderCreated::from(&order)));
        Ok(order)
    }

    /// Refund an order's escrow and remove it.
    ///
    /// # Errors
    /// `OrderNotFound` if no order has this id.
    pub fn cancel(&mut self, id: EntityId) -> Result<Order> {
        let order = self.get(id)?;
        let escrow = self.escrow_of(&order);

        self.release_from_custody(order.owner, &escrow.asset, escrow.amount);
        self.del(id)?;

        tracing::info!(
            order_id = %id,
            owner = %order.owner.short(),
            refund = escrow.amount,
            asset = %escrow.asset,
            "order cancelled"
        );
        self.events
            .publish(ExchangeEvent::OrderCancelled(OrderCancelled { order_id: id }));
        Ok(order)
    }

    /// Cancel on behalf of `owner`.
    ///
    /// # Errors
    /// `OrderNotFound`, or `Unauthorized` if `owner` did not post the order.
    pub fn cancel_owned(&mut self, owner: Address, id: EntityId) -> Result<Order> {
        let order = self.get(id)?;
        if order.owner != owner {
            return Err(ClearbookError::Unauthorized {
                reason: "cannot cancel unowned order".into(),
            });
        }
        self.cancel(id)
    }

    /// Pay `amount` of `asset` out of module custody to `owner`.
    ///
    /// Custody always covers open orders, so a ledger failure here is fatal.
    pub fn release_from_custody(&mut self, owner: Address, asset: &str, amount: u128) {
        if let Err(err) = self.ledger.credit_from_module(owner, asset, amount) {
            invariant_violation(format!(
                "custody cannot release {amount} {asset} to {owner}: {err}"
            ));
        }
    }

    // =================================================================
    // Keyed access
    // =================================================================

    /// # Errors
    /// `OrderNotFound` if absent.
    pub fn get(&self, id: EntityId) -> Result<Order> {
        self.orders.by_id(id).map_err(|err| not_found_as_order(err, id))
    }

    #[must_use]
    pub fn has(&self, id: EntityId) -> bool {
        self.orders.has_id(id)
    }

    /// Overwrite a stored order.
    ///
    /// # Errors
    /// `OrderNotFound` if absent.
    pub fn set(&mut self, order: &Order) -> Result<()> {
        let previous = self.get(order.id)?;
        self.orders
            .update(order)
            .map_err(|err| not_found_as_order(err, order.id))?;
        self.unindex_order(previous.market_id, previous.id);
        self.index_order(order);
        Ok(())
    }

    /// Remove a stored order. Its id is never reissued.
    ///
    /// # Errors
    /// `OrderNotFound` if absent.
    pub fn del(&mut self, id: EntityId) -> Result<()> {
        let order = self.get(id)?;
        self.orders
            .remove(id)
            .map_err(|err| not_found_as_order(err, id))?;
        self.unindex_order(order.market_id, id);
        Ok(())
    }

    fn index_order(&mut self, order: &Order) {
        let key = market_index_key(order.market_id, order.id);
        let entry = encode_index_entry(order.direction, order.quantity);
        self.orders.backend_mut().set(&key, &entry);
    }

    fn unindex_order(&mut self, market_id: EntityId, id: EntityId) {
        let key = market_index_key(market_id, id);
        self.orders.backend_mut().delete(&key);
    }

    /// Visit one market's index entries as `(id, direction, quantity)`.
    fn scan_market_index(
        &self,
        market_id: EntityId,
        reverse: bool,
        mut cb: impl FnMut(EntityId, Direction, u128) -> bool,
    ) {
        let prefix = market_index_prefix(market_id);
        let end = prefix_end(&prefix);
        let direction = if reverse {
            IterDirection::Reverse
        } else {
            IterDirection::Forward
        };
        self.orders
            .backend()
            .iterate(&prefix, end.as_deref(), direction, &mut |key, value| {
                let id = decode_index_id(&key[prefix.len()..]);
                let (side, quantity) = decode_index_entry(id, value);
                cb(id, side, quantity)
            });
    }

    // =================================================================
    // Iteration and queries
    // =================================================================

    /// Visit all orders ascending by id.
    pub fn iterator(&self, cb: impl FnMut(Order) -> bool) {
        self.orders.iterator(cb);
    }

    /// Visit all orders descending by id.
    pub fn reverse_iterator(&self, cb: impl FnMut(Order) -> bool) {
        self.orders.reverse_iterator(cb);
    }

    /// Visit one market's orders by id, ascending or descending.
    pub fn iter_by_market(
        &self,
        market_id: EntityId,
        reverse: bool,
        mut cb: impl FnMut(Order) -> bool,
    ) {
        self.scan_market_index(market_id, reverse, |id, _, _| {
            let order = self.get(id).unwrap_or_else(|err| {
                invariant_violation(format!("market {market_id} index is stale: {err}"))
            });
            cb(order)
        });
    }

    /// One market's open orders, ascending by id.
    #[must_use]
    pub fn open_orders(&self, market_id: EntityId) -> Vec<Order> {
        let mut orders = Vec::new();
        self.iter_by_market(market_id, false, |o| {
            orders.push(o);
            true
        });
        orders
    }

    /// Every open order grouped by market, markets ascending.
    #[must_use]
    pub fn open_orders_by_market(&self) -> BTreeMap<EntityId, Vec<Order>> {
        let mut grouped: BTreeMap<EntityId, Vec<Order>> = BTreeMap::new();
        self.orders.iterator(|o| {
            grouped.entry(o.market_id).or_default().push(o);
            true
        });
        grouped
    }

    /// Open order count and resting quantity per side, from the market
    /// index alone.
    #[must_use]
    pub fn market_depth(&self, market_id: EntityId) -> MarketDepth {
        let mut depth = MarketDepth::default();
        self.scan_market_index(market_id, false, |id, side, quantity| {
            depth.orders += 1;
            let total = match side {
                Direction::Bid => &mut depth.bid_quantity,
                Direction::Ask => &mut depth.ask_quantity,
            };
            *total = total.checked_add(quantity).unwrap_or_else(|| {
                invariant_violation(format!("market {market_id} side overflows at order {id}"))
            });
            true
        });
        depth
    }

    /// Total `asset` escrowed by `owner`'s open orders.
    #[must_use]
    pub fn escrowed(&self, owner: Address, asset: &str) -> u128 {
        let mut total = 0u128;
        self.orders.iterator(|o| {
            if o.owner == owner {
                let escrow = self.escrow_of(&o);
                if escrow.asset == asset {
                    total = total.saturating_add(escrow.amount);
                }
            }
            true
        });
        total
    }

    /// Total `asset` escrowed by all open orders.
    #[must_use]
    pub fn escrowed_total(&self, asset: &str) -> u128 {
        let mut total = 0u128;
        self.orders.iterator(|o| {
            let escrow = self.escrow_of(&o);
            if escrow.asset == asset {
                total = total.saturating_add(escrow.amount);
            }
            true
        });
        total
    }

    /// Escrow backing a stored order. Fatal if its market is gone.
    #[must_use]
    pub fn escrow_of(&self, order: &Order) -> Escrow {
        let market = self.market_of(order);
        held_escrow(&market, order, self.config.price_decimals).unwrap_or_else(|| {
            invariant_violation(format!("escrow of stored order {} overflows", order.id))
        })
    }

    /// Market of a stored order. Fatal if unknown.
    #[must_use]
    pub fn market_of(&self, order: &Order) -> Market {
        self.markets
            .get_market(order.market_id)
            .unwrap_or_else(|err| {
                invariant_violation(format!("order {} references {err}", order.id))
            })
    }

    // =================================================================
    // Accessors
    // =================================================================

    /// Last order id handed out.
    #[must_use]
    pub fn head_id(&self) -> EntityId {
        self.orders.head_id()
    }

    #[must_use]
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    #[must_use]
    pub fn markets(&self) -> &M {
        &self.markets
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Queue an event for the block driver.
    pub fn publish(&mut self, event: ExchangeEvent) {
        self.events.publish(event);
    }

    /// Take every event published since the last drain.
    pub fn drain_events(&mut self) -> Vec<ExchangeEvent> {
        self.events.drain()
    }

    #[must_use]
    pub fn pending_events(&self) -> &[ExchangeEvent] {
        self.events.pending()
    }
}

fn market_index_prefix(market_id: EntityId) -> Vec<u8> {
    let mut prefix = prefix_key(&table_prefix(ORDER_NAMESPACE), MARKET_INDEX);
    prefix.extend_from_slice(&u64_subkey(market_id.0));
    prefix.push(SEPARATOR);
    prefix
}

fn market_index_key(market_id: EntityId, id: EntityId) -> Vec<u8> {
    prefix_key(&market_index_prefix(market_id), &u64_subkey(id.0))
}

fn encode_index_entry(direction: Direction, quantity: u128) -> [u8; 17] {
    let mut entry = [0u8; 17];
    entry[0] = match direction {
        Direction::Bid => b'B',
        Direction::Ask => b'A',
    };
    entry[1..].copy_from_slice(&quantity.to_be_bytes());
    entry
}

fn decode_index_id(subkey: &[u8]) -> EntityId {
    let bytes: [u8; 8] = subkey
        .try_into()
        .unwrap_or_else(|_| invariant_violation("malformed market index key"));
    EntityId(u64::from_be_bytes(bytes))
}

fn decode_index_entry(id: EntityId, raw: &[u8]) -> (Direction, u128) {
    let direction = match raw.first() {
        Some(b'B') => Direction::Bid,
        Some(b'A') => Direction::Ask,
        _ => invariant_violation(format!("malformed market index entry for order {id}")),
    };
    let quantity: [u8; 16] = raw[1..]
        .try_into()
        .unwrap_or_else(|_| invariant_violation(format!("malformed market index entry for order {id}")));
    (direction, u128::from_be_bytes(quantity))
}

fn not_found_as_order(err: ClearbookError, id: EntityId) -> ClearbookError {
    if err.is_not_found() {
        ClearbookError::OrderNotFound(id)
    } else {
        err
    }
}
