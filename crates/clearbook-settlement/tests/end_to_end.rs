//! End-to-end tests across ingress, clearing and settlement.
//!
//! Each test drives whole blocks: messages are handled, the block is
//! finalized by the execution keeper, the resulting events are dispatched to
//! the archives, and supply conservation is checked afterwards.

use chrono::{DateTime, Duration, TimeZone, Utc};
use clearbook_ingress::{BankLedger, MarketKeeper, Msg, MsgResult, OrderKeeper, handle_msg};
use clearbook_matchcore::verify_fill_root;
use clearbook_settlement::{
    BatchKeeper, BlockInfo, BlockReport, ExecutionKeeper, FillKeeper, SupplyConservation,
};
use clearbook_store::MemKv;
use clearbook_types::{
    Address, BlockHeight, ClearbookError, Direction, EntityId, EventSink, ExchangeConfig,
    ExchangeEvent, Fill, Order, Result, dispatch,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const UNIT: u128 = 100_000_000;
const ALICE: Address = Address([1u8; 20]);
const BOB: Address = Address([2u8; 20]);
const CAROL: Address = Address([3u8; 20]);
const NOMINEE: Address = Address([9u8; 20]);
const MARKET: EntityId = EntityId(1);
const ATOM_MARKET: EntityId = EntityId(2);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Helper: one chain's worth of exchange state, driven block by block.
struct BlockPipeline {
    keeper: OrderKeeper<MemKv, BankLedger, MarketKeeper<MemKv>>,
    execution: ExecutionKeeper,
    fills: FillKeeper<MemKv>,
    batches: BatchKeeper<MemKv>,
    supply: SupplyConservation,
    genesis: DateTime<Utc>,
}

impl BlockPipeline {
    fn new(config: &ExchangeConfig) -> Self {
        init_tracing();
        let mut markets = MarketKeeper::new(MemKv::new());
        markets.create_market(NOMINEE, "uxar", "uusdx").unwrap();
        markets.create_market(NOMINEE, "uatom", "uusdx").unwrap();
        Self {
            keeper: OrderKeeper::new(MemKv::new(), BankLedger::new(), markets, config),
            execution: ExecutionKeeper::new(config),
            fills: FillKeeper::new(MemKv::new()),
            batches: BatchKeeper::new(MemKv::new()),
            supply: SupplyConservation::new(),
            genesis: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        }
    }

    fn fund(&mut self, owner: Address, asset: &str, amount: u128) {
        self.keeper.ledger_mut().deposit(owner, asset, amount).unwrap();
        self.supply.record_mint(asset, amount);
    }

    fn post(
        &mut self,
        height: BlockHeight,
        owner: Address,
        direction: Direction,
        price: u128,
        quantity: u128,
    ) -> Result<Order> {
        self.post_in(height, owner, MARKET, direction, price, quantity, 100)
    }

    #[allow(clippy::too_many_arguments)]
    fn post_in(
        &mut self,
        height: BlockHeight,
        owner: Address,
        market_id: EntityId,
        direction: Direction,
        price: u128,
        quantity: u128,
        time_in_force_blocks: u16,
    ) -> Result<Order> {
        let msg = Msg::Post {
            owner,
            market_id,
            direction,
            price,
            quantity,
            time_in_force_blocks,
        };
        match handle_msg(&mut self.keeper, height, msg)? {
            MsgResult::Posted(order) => Ok(order),
            MsgResult::Cancelled(_) => unreachable!("post never cancels"),
        }
    }

    fn cancel(&mut self, height: BlockHeight, owner: Address, order_id: EntityId) -> Result<()> {
        handle_msg(&mut self.keeper, height, Msg::Cancel { owner, order_id }).map(|_| ())
    }

    /// Finalize a block, archive its events and check conservation.
    fn end_block(&mut self, height: BlockHeight) -> (BlockReport, Vec<ExchangeEvent>) {
        let block = BlockInfo {
            height,
            time: self.genesis + Duration::seconds(i64::try_from(height).unwrap() * 5),
        };
        let report = self.execution.end_block(&mut self.keeper, &block);
        let events = self.keeper.drain_events();
        let sinks: &mut [&mut dyn EventSink] = &mut [&mut self.fills, &mut self.batches];
        dispatch(&events, sinks).unwrap();
        self.supply.verify_keeper(&self.keeper).unwrap();
        (report, events)
    }

    fn balance(&self, owner: Address, asset: &str) -> u128 {
        self.keeper.ledger().balance(owner, asset)
    }
}

fn fills_of(events: &[ExchangeEvent]) -> Vec<&Fill> {
    events
        .iter()
        .filter_map(|e| match e {
            ExchangeEvent::Fill(f) => Some(f),
            _ => None,
        })
        .collect()
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn simple_cross_clears_at_midpoint() {
    let mut chain = BlockPipeline::new(&ExchangeConfig::default());
    chain.fund(ALICE, "uusdx", 1_000);
    chain.fund(BOB, "uxar", 10);

    let bid = chain.post(1, ALICE, Direction::Bid, 100 * UNIT, 10).unwrap();
    let ask = chain.post(1, BOB, Direction::Ask, 90 * UNIT, 10).unwrap();
    assert_eq!((bid.id, ask.id), (EntityId(1), EntityId(2)));
    chain.keeper.drain_events();

    let (report, events) = chain.end_block(1);
    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.batches[0].clearing_price, 95 * UNIT);

    let fills = fills_of(&events);
    assert_eq!(fills.len(), 2);
    assert!(fills.iter().all(|f| f.qty_filled == 10 && f.qty_unfilled == 0));
    assert!(fills.iter().all(|f| f.price == 95 * UNIT));

    assert_eq!(chain.balance(ALICE, "uxar"), 10);
    assert_eq!(chain.balance(ALICE, "uusdx"), 50);
    assert_eq!(chain.balance(BOB, "uusdx"), 950);
    assert_eq!(chain.balance(BOB, "uxar"), 0);
    assert!(!chain.keeper.has(bid.id));
    assert!(!chain.keeper.has(ask.id));
}

#[test]
fn partial_fill_keeps_bid_open() {
    let mut chain = BlockPipeline::new(&ExchangeConfig::default());
    chain.fund(ALICE, "uusdx", 1_000);
    chain.fund(BOB, "uxar", 4);

    chain.post(1, ALICE, Direction::Bid, 100 * UNIT, 10).unwrap();
    chain.post(1, BOB, Direction::Ask, 90 * UNIT, 4).unwrap();
    let (_, events) = chain.end_block(1);

    let bid_fill = fills_of(&events)
        .into_iter()
        .find(|f| f.direction == Direction::Bid)
        .unwrap()
        .clone();
    assert_eq!((bid_fill.qty_filled, bid_fill.qty_unfilled), (4, 6));

    let open = chain.keeper.get(EntityId(1)).unwrap();
    assert_eq!(open.quantity, 6);
    assert_eq!(chain.keeper.escrowed(ALICE, "uusdx"), 600);
    assert_eq!(chain.balance(ALICE, "uusdx"), 1_000 - 600 - 380);
}

#[test]
fn partial_fill_below_threshold_closes_with_refund() {
    let config = ExchangeConfig {
        min_remainder_qty: 7,
        ..ExchangeConfig::default()
    };
    let mut chain = BlockPipeline::new(&config);
    chain.fund(ALICE, "uusdx", 1_000);
    chain.fund(BOB, "uxar", 4);

    chain.post(1, ALICE, Direction::Bid, 100 * UNIT, 10).unwrap();
    chain.post(1, BOB, Direction::Ask, 90 * UNIT, 4).unwrap();
    let (_, events) = chain.end_block(1);

    assert!(fills_of(&events).iter().all(|f| f.closed_order()));
    assert!(!chain.keeper.has(EntityId(1)));
    assert_eq!(chain.keeper.escrowed(ALICE, "uusdx"), 0);
    assert_eq!(chain.balance(ALICE, "uusdx"), 1_000 - 380);
    assert_eq!(chain.balance(ALICE, "uxar"), 4);
}

#[test]
fn cancel_refunds_escrow() {
    let mut chain = BlockPipeline::new(&ExchangeConfig::default());
    chain.fund(ALICE, "uusdx", 1_000);

    chain.post(1, ALICE, Direction::Bid, 100 * UNIT, 7).unwrap();
    assert_eq!(chain.balance(ALICE, "uusdx"), 300);
    chain.cancel(2, ALICE, EntityId(1)).unwrap();
    assert_eq!(chain.balance(ALICE, "uusdx"), 1_000);

    let (report, _) = chain.end_block(2);
    assert!(report.is_quiet());
}

#[test]
fn unowned_cancel_is_rejected() {
    let mut chain = BlockPipeline::new(&ExchangeConfig::default());
    chain.fund(ALICE, "uusdx", 1_000);
    chain.post(1, ALICE, Direction::Bid, 100 * UNIT, 7).unwrap();

    let err = chain.cancel(2, BOB, EntityId(1)).unwrap_err();
    assert!(matches!(err, ClearbookError::Unauthorized { .. }));
    assert!(chain.keeper.has(EntityId(1)));
    chain.end_block(2);
}

#[test]
fn expiry_refunds_before_clearing() {
    let mut chain = BlockPipeline::new(&ExchangeConfig::default());
    chain.fund(ALICE, "uusdx", 1_000);
    chain.fund(BOB, "uxar", 10);

    let msg = Msg::Post {
        owner: ALICE,
        market_id: MARKET,
        direction: Direction::Bid,
        price: 100 * UNIT,
        quantity: 10,
        time_in_force_blocks: 1,
    };
    handle_msg(&mut chain.keeper, 1, msg).unwrap();
    chain.end_block(1);
    chain.post(2, BOB, Direction::Ask, 90 * UNIT, 10).unwrap();

    let (report, events) = chain.end_block(2);
    assert_eq!(report.expired, vec![EntityId(1)]);
    assert!(report.batches.is_empty());
    assert!(fills_of(&events).is_empty());
    assert_eq!(chain.balance(ALICE, "uusdx"), 1_000);
    assert!(chain.batches.latest_by_market(MARKET).is_err());
}

#[test]
fn ids_keep_increasing_across_cancellations() {
    let mut chain = BlockPipeline::new(&ExchangeConfig::default());
    chain.fund(ALICE, "uusdx", 10_000);

    let first = chain.post(1, ALICE, Direction::Bid, UNIT, 5).unwrap();
    chain.cancel(1, ALICE, first.id).unwrap();
    let second = chain.post(1, ALICE, Direction::Bid, UNIT, 5).unwrap();
    assert!(second.id > first.id);
    assert_eq!(chain.keeper.head_id(), second.id);
}

// =========================================================================
// Archives
// =========================================================================

#[test]
fn archives_record_every_cleared_block() {
    let mut chain = BlockPipeline::new(&ExchangeConfig::default());
    chain.fund(ALICE, "uusdx", 10_000);
    chain.fund(BOB, "uxar", 30);
    chain.fund(CAROL, "uxar", 30);

    chain.post(1, ALICE, Direction::Bid, 100 * UNIT, 10).unwrap();
    chain.post(1, BOB, Direction::Ask, 90 * UNIT, 10).unwrap();
    let (first, _) = chain.end_block(1);

    chain.post(2, ALICE, Direction::Bid, 110 * UNIT, 6).unwrap();
    chain.post(2, BOB, Direction::Ask, 100 * UNIT, 3).unwrap();
    chain.post(2, CAROL, Direction::Ask, 100 * UNIT, 3).unwrap();
    let (second, _) = chain.end_block(2);

    // Nothing crosses in block 3: no batch is recorded.
    chain.post(3, CAROL, Direction::Ask, 200 * UNIT, 1).unwrap();
    let (third, _) = chain.end_block(3);
    assert!(third.batches.is_empty());

    let latest = chain.batches.latest_by_market(MARKET).unwrap();
    assert_eq!(latest.block_number, 2);
    assert_eq!(latest.clearing_price, second.batches[0].clearing_price);
    assert_eq!(latest.matched_volume(), 6);
    assert_eq!(
        chain
            .batches
            .by_market_and_block(MARKET, 1)
            .unwrap()
            .clearing_price,
        first.batches[0].clearing_price
    );

    let mut archived = Vec::new();
    chain.fills.iter_over_block_numbers(1, 3, |f| {
        archived.push(f);
        true
    });
    assert_eq!(archived.len(), 5);
    assert!(archived.windows(2).all(|w| {
        (w[0].block_number, w[0].order_id) < (w[1].block_number, w[1].order_id)
    }));

    let block_two = chain.fills.fills_in_block(2);
    assert!(verify_fill_root(&block_two, &second.batches[0].fill_root));
    assert_eq!(chain.fills.fills_for_order(EntityId(3)).len(), 1);
}

#[test]
fn marginal_asks_share_pro_rata() {
    let mut chain = BlockPipeline::new(&ExchangeConfig::default());
    chain.fund(ALICE, "uusdx", 10_000);
    chain.fund(BOB, "uxar", 6);
    chain.fund(CAROL, "uxar", 3);

    chain.post(1, ALICE, Direction::Bid, 100 * UNIT, 6).unwrap();
    chain.post(1, BOB, Direction::Ask, 100 * UNIT, 6).unwrap();
    chain.post(1, CAROL, Direction::Ask, 100 * UNIT, 3).unwrap();
    let (report, events) = chain.end_block(1);
    assert_eq!(report.batches[0].matched_volume, 6);

    let fills = fills_of(&events);
    let bob = fills.iter().find(|f| f.owner == BOB).unwrap();
    let carol = fills.iter().find(|f| f.owner == CAROL).unwrap();
    assert_eq!((bob.qty_filled, bob.qty_unfilled), (4, 2));
    assert_eq!((carol.qty_filled, carol.qty_unfilled), (2, 1));
    assert_eq!(chain.balance(BOB, "uusdx") + chain.balance(CAROL, "uusdx"), 600);
}

#[test]
fn random_blocks_conserve_supply_across_markets() {
    let config = ExchangeConfig {
        min_remainder_qty: 5,
        ..ExchangeConfig::default()
    };
    let mut chain = BlockPipeline::new(&config);
    let traders = [ALICE, BOB, CAROL];
    for trader in traders {
        chain.fund(trader, "uusdx", 10_000_000);
        chain.fund(trader, "uxar", 50_000);
        chain.fund(trader, "uatom", 50_000);
    }

    let mut rng = StdRng::seed_from_u64(0x00B1_0C4F);
    let mut live: Vec<(EntityId, Address)> = Vec::new();
    let mut cleared_batches = 0;

    for height in 1..=150u64 {
        for _ in 0..rng.gen_range(0..6) {
            if !live.is_empty() && rng.gen_bool(0.2) {
                let (id, owner) = live.swap_remove(rng.gen_range(0..live.len()));
                chain.cancel(height, owner, id).unwrap();
                continue;
            }
            let owner = traders[rng.gen_range(0..traders.len())];
            let market = if rng.gen_bool(0.5) { MARKET } else { ATOM_MARKET };
            let direction = if rng.gen_bool(0.5) { Direction::Bid } else { Direction::Ask };
            let price = rng.gen_range(900..=1_100u128) * UNIT / 100;
            let quantity = rng.gen_range(1..=60u128);
            let tif = rng.gen_range(1..=12u16);
            let order = chain
                .post_in(height, owner, market, direction, price, quantity, tif)
                .unwrap();
            live.push((order.id, owner));
        }

        // Conservation is checked inside `end_block`.
        let (report, events) = chain.end_block(height);
        live.retain(|(id, _)| chain.keeper.has(*id));

        let fills = fills_of(&events);
        for fill in &fills {
            if fill.qty_unfilled > 0 {
                assert!(fill.qty_unfilled >= config.min_remainder_qty);
            }
        }
        for batch in &report.batches {
            let base = if batch.market_id == MARKET { "uxar" } else { "uatom" };
            let batch_fills: Vec<Fill> = fills
                .iter()
                .filter(|f| f.pair.base == base)
                .map(|f| (*f).clone())
                .collect();
            assert_eq!(batch_fills.len(), batch.fills);
            assert!(verify_fill_root(&batch_fills, &batch.fill_root));

            for side in [Direction::Bid, Direction::Ask] {
                let traded: u128 = batch_fills
                    .iter()
                    .filter(|f| f.direction == side)
                    .map(|f| f.qty_filled)
                    .sum();
                assert_eq!(traded, batch.matched_volume);
            }
            cleared_batches += 1;
        }
    }

    assert!(cleared_batches > 0);
    for (id, _) in &live {
        let order = chain.keeper.get(*id).unwrap();
        assert!(!order.is_expired_at(150));
    }
}
