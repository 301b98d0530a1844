//! Domain events published by the exchange core.
//!
//! Events are a closed set. Consumers implement [`EventSink`], overriding the
//! handler for each variant they care about; [`EventSink::on_event`] does the
//! dispatch with an exhaustive `match`.

use serde::{Deserialize, Serialize};

use crate::{Address, Batch, BlockHeight, Direction, EntityId, Fill, Order, Result};

/// Published after an order has been escrowed and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub id: EntityId,
    pub owner: Address,
    pub market_id: EntityId,
    pub direction: Direction,
    pub price: u128,
    pub quantity: u128,
    pub time_in_force_blocks: u16,
    pub created_block: BlockHeight,
}

impl From<&Order> for OrderCreated {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            owner: order.owner,
            market_id: order.market_id,
            direction: order.direction,
            price: order.price,
            quantity: order.quantity,
            time_in_force_blocks: order.time_in_force_blocks,
            created_block: order.created_block,
        }
    }
}

/// Published after an order's escrow has been refunded and the order removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: EntityId,
}

/// Every event the core emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeEvent {
    OrderCreated(OrderCreated),
    OrderCancelled(OrderCancelled),
    Fill(Fill),
    Batch(Batch),
}

impl ExchangeEvent {
    /// Short kind tag for log lines.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderCreated(_) => "order_created",
            Self::OrderCancelled(_) => "order_cancelled",
            Self::Fill(_) => "fill",
            Self::Batch(_) => "batch",
        }
    }
}

/// A downstream consumer of exchange events (archives, indexers).
///
/// Handlers default to ignoring the event.
pub trait EventSink {
    fn on_order_created(&mut self, _event: &OrderCreated) -> Result<()> {
        Ok(())
    }

    fn on_order_cancelled(&mut self, _event: &OrderCancelled) -> Result<()> {
        Ok(())
    }

    fn on_fill(&mut self, _event: &Fill) -> Result<()> {
        Ok(())
    }

    fn on_batch(&mut self, _event: &Batch) -> Result<()> {
        Ok(())
    }

    fn on_event(&mut self, event: &ExchangeEvent) -> Result<()> {
        match event {
            ExchangeEvent::OrderCreated(ev) => self.on_order_created(ev),
            ExchangeEvent::OrderCancelled(ev) => self.on_order_cancelled(ev),
            ExchangeEvent::Fill(ev) => self.on_fill(ev),
            ExchangeEvent::Batch(ev) => self.on_batch(ev),
        }
    }
}

/// In-order buffer of published events, drained by the block driver.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<ExchangeEvent>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, event: ExchangeEvent) {
        self.events.push(event);
    }

    /// Take every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<ExchangeEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn pending(&self) -> &[ExchangeEvent] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Forward each event, in order, to every sink.
///
/// Stops at the first sink error.
pub fn dispatch(events: &[ExchangeEvent], sinks: &mut [&mut dyn EventSink]) -> Result<()> {
    for event in events {
        for sink in sinks.iter_mut() {
            sink.on_event(event)?;
        }
    }
    Ok(())
}
