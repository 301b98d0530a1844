//! Message routing for the order module.
//!
//! Stateless checks run first ([`Msg::validate_basic`]); everything that
//! needs state is delegated to the [`OrderKeeper`].

use clearbook_store::{Codec, KvStore};
use clearbook_types::{
    Address, BlockHeight, ClearbookError, Direction, EntityId, Order, Result, to_decimal,
};
use serde::{Deserialize, Serialize};

use crate::ledger::Ledger;
use crate::market::MarketRegistry;
use crate::order_keeper::OrderKeeper;

/// A signed order-module message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Msg {
    Post {
        owner: Address,
        market_id: EntityId,
        direction: Direction,
        price: u128,
        quantity: u128,
        time_in_force_blocks: u16,
    },
    Cancel {
        owner: Address,
        order_id: EntityId,
    },
}

impl Msg {
    /// Checks that need no state.
    ///
    /// # Errors
    /// `InvalidAmount` for a zero price or quantity, `InvalidOrder` for an
    /// undefined market or order id.
    pub fn validate_basic(&self) -> Result<()> {
        match self {
            Self::Post {
                market_id,
                price,
                quantity,
                ..
            } => {
                if !market_id.is_defined() {
                    return Err(ClearbookError::InvalidOrder {
                        reason: "market id is undefined".into(),
                    });
                }
                if *price == 0 {
                    return Err(ClearbookError::invalid_amount("price must be positive"));
                }
                if *quantity == 0 {
                    return Err(ClearbookError::invalid_amount("quantity must be positive"));
                }
                Ok(())
            }
            Self::Cancel { order_id, .. } => {
                if order_id.is_defined() {
                    Ok(())
                } else {
                    Err(ClearbookError::InvalidOrder {
                        reason: "order id is undefined".into(),
                    })
                }
            }
        }
    }

    /// The account that signed the message.
    #[must_use]
    pub fn signer(&self) -> Address {
        match self {
            Self::Post { owner, .. } | Self::Cancel { owner, .. } => *owner,
        }
    }
}

/// Outcome of a handled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsgResult {
    Posted(Order),
    Cancelled(Order),
}

impl MsgResult {
    /// Transaction log line.
    #[must_use]
    pub fn log(&self) -> String {
        match self {
            Self::Posted(order) => format!("order_id:{}", order.id),
            Self::Cancelled(_) => String::new(),
        }
    }
}

/// Route one message at block `height`.
pub fn handle_msg<S, L, M, C>(
    keeper: &mut OrderKeeper<S, L, M, C>,
    height: BlockHeight,
    msg: Msg,
) -> Result<MsgResult>
where
    S: KvStore,
    L: Ledger,
    M: MarketRegistry,
    C: Codec,
{
    msg.validate_basic()?;

    match msg {
        Msg::Post {
            owner,
            market_id,
            direction,
            price,
            quantity,
            time_in_force_blocks,
        } => {
            let order = keeper.post(
                height,
                owner,
                market_id,
                direction,
                price,
                quantity,
                time_in_force_blocks,
            )?;
            let price = to_decimal(order.price, keeper.config().price_decimals)
                .map_or_else(|| order.price.to_string(), |d| d.to_string());
            tracing::info!(
                id = %order.id,
                market_id = %order.market_id,
                price = %price,
                quantity = order.quantity,
                direction = %order.direction,
                "posted order"
            );
            Ok(MsgResult::Posted(order))
        }
        Msg::Cancel { owner, order_id } => {
            let order = keeper.cancel_owned(owner, order_id)?;
            Ok(MsgResult::Cancelled(order))
        }
    }
}
