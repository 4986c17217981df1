use std::sync::Arc;

use alloy::primitives::{U256, keccak256};
use exchange_client::{
    abi::ETHER_ADDRESS,
    binding::Contracts,
    state::{StateUpdate, Store},
    subscriber, sync,
    testing::{self, ALICE, BOB, EXCHANGE, FakeChain, TOKEN, units},
    types::{EventContext, ExchangeEvent, Order, OrderParams, Trade, Transfer},
};
use tokio_test::assert_ok;

/// Alice posts three sell orders, cancels the first one, Bob fills the second.
async fn seed(chain: &FakeChain) -> Contracts {
    let contracts = chain.contracts();
    chain.fund(ALICE, 10, 100);
    chain.fund(BOB, 10, 0);
    assert_ok!(contracts.token.approve(ALICE, EXCHANGE, units(100)).await);
    assert_ok!(
        contracts
            .exchange
            .deposit_token(ALICE, TOKEN, units(100))
            .await
    );
    assert_ok!(contracts.exchange.deposit_ether(BOB, units(5)).await);
    assert_eq!(chain.mine(), 3);

    let sell = OrderParams {
        token_get: ETHER_ADDRESS,
        amount_get: units(1),
        token_give: TOKEN,
        amount_give: units(10),
    };
    for _ in 0..3 {
        assert_ok!(contracts.exchange.make_order(ALICE, sell).await);
    }
    assert_eq!(chain.mine(), 3);

    assert_ok!(contracts.exchange.cancel_order(ALICE, U256::from(1)).await);
    assert_ok!(
        contracts
            .exchange
            .fill_order(BOB, U256::from(2), testing::FILL_FEE)
            .await
    );
    assert_eq!(chain.mine(), 2);
    contracts
}

#[tokio::test]
async fn test_load_all_orders_partitions_history() {
    let chain = FakeChain::new(1);
    let contracts = seed(&chain).await;

    let store = Store::new();
    let mut updates = store.subscribe();
    let epoch = store.begin_epoch().await;
    assert_ok!(sync::load_all_orders(&store, epoch, &contracts, chain.block_number()).await);

    // Cancelled, filled, then all, each exactly once
    let published = testing::drain(&mut updates);
    assert_eq!(published.len(), 3);
    assert!(matches!(&published[0], StateUpdate::CancelledOrdersLoaded(o) if o.len() == 1));
    assert!(matches!(&published[1], StateUpdate::FilledOrdersLoaded(t) if t.len() == 1));
    assert!(matches!(&published[2], StateUpdate::AllOrdersLoaded(o) if o.len() == 3));

    let state = store.snapshot().await;
    let orders = state.orders();
    assert!(orders.is_loaded());
    assert_eq!(
        orders.all().iter().map(|o| o.id().to::<u64>()).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(orders.cancelled()[0].id().to::<u64>(), 1);
    assert_eq!(orders.filled()[0].id().to::<u64>(), 2);
    assert_eq!(orders.filled()[0].filled_by(), BOB);

    let open = orders.open_orders();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id().to::<u64>(), 3);
    assert_eq!(orders.trades_of(BOB).len(), 1);
    assert_eq!(orders.open_orders_of(BOB).len(), 0);
}

#[tokio::test]
async fn test_load_all_orders_read_failure() {
    let chain = FakeChain::new(1);
    let contracts = seed(&chain).await;
    chain.set_fail_reads(true);

    let store = Store::new();
    let epoch = store.begin_epoch().await;
    assert!(sync::load_all_orders(&store, epoch, &contracts, chain.block_number()).await.is_err());
    assert!(!store.snapshot().await.orders().is_loaded());
}

#[tokio::test]
async fn test_read_balances() {
    let chain = FakeChain::new(1);
    let contracts = seed(&chain).await;

    let alice = assert_ok!(sync::read_balances(&chain, &contracts, ALICE).await);
    assert_eq!(alice.wallet_ether, units(10));
    assert_eq!(alice.wallet_token, U256::ZERO);
    assert_eq!(alice.exchange_ether, units(1));
    assert_eq!(alice.exchange_token, units(90));

    let bob = assert_ok!(sync::read_balances(&chain, &contracts, BOB).await);
    assert_eq!(bob.wallet_ether, units(10) - testing::FILL_FEE);
    assert_eq!(bob.exchange_ether, units(4));
    assert_eq!(bob.exchange_token, units(10));
}

#[tokio::test]
async fn test_load_balances_idempotent() {
    let chain = FakeChain::new(1);
    let contracts = seed(&chain).await;

    let store = Store::new();
    let epoch = store.begin_epoch().await;
    sync::load_balances(&store, epoch, &chain, Some(&contracts), Some(ALICE)).await;
    let first = store.snapshot().await;
    sync::load_balances(&store, epoch, &chain, Some(&contracts), Some(ALICE)).await;
    let second = store.snapshot().await;

    assert_eq!(first.balances(), second.balances());
    assert_eq!(first.balances().exchange_token, units(90));
    assert!(!second.balances_loading());
}

#[tokio::test]
async fn test_load_balances_noop_without_account_or_contracts() {
    let chain = FakeChain::new(1);
    let contracts = seed(&chain).await;

    let store = Store::new();
    let mut updates = store.subscribe();
    let epoch = store.begin_epoch().await;
    sync::load_balances(&store, epoch, &chain, Some(&contracts), None).await;
    sync::load_balances(&store, epoch, &chain, None, Some(ALICE)).await;
    assert!(testing::drain(&mut updates).is_empty());
}

#[tokio::test]
async fn test_load_balances_read_failure_swallowed() {
    let chain = FakeChain::new(1);
    let contracts = seed(&chain).await;
    chain.set_fail_reads(true);

    let store = Store::new();
    let mut updates = store.subscribe();
    let epoch = store.begin_epoch().await;
    sync::load_balances(&store, epoch, &chain, Some(&contracts), Some(ALICE)).await;
    assert!(testing::drain(&mut updates).is_empty());
    assert_eq!(store.snapshot().await.balances().wallet_ether, U256::ZERO);
}

fn order(id: u64, trader: alloy::primitives::Address) -> Order {
    Order::new(
        U256::from(id),
        trader,
        TOKEN,
        units(id),
        ETHER_ADDRESS,
        units(1),
        1_600_000_000 + id,
    )
}

fn at(block_number: u64, log_index: u64, event: ExchangeEvent) -> EventContext<ExchangeEvent> {
    let tx_hash = keccak256((block_number * 1000 + log_index).to_be_bytes());
    EventContext::new(tx_hash, block_number, log_index, event)
}

/// Emits an interleaved event log generated from the seed, returning the
/// expected cancelled, filled and posted sequences up to the last block.
fn generate(chain: &FakeChain, seed: u64, count: u64) -> (Vec<Order>, Vec<Trade>, Vec<Order>) {
    let (mut cancelled, mut filled, mut all) = (vec![], vec![], vec![]);
    let mut state = seed;
    for i in 0..count {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let id = i + 1;
        let event = match (state >> 33) % 4 {
            0 => {
                let order = order(id, ALICE);
                all.push(order.clone());
                ExchangeEvent::Order(order)
            }
            1 => {
                let order = order(id, BOB);
                cancelled.push(order.clone());
                ExchangeEvent::Cancel(order)
            }
            2 => {
                let trade = Trade::new(order(id, ALICE), BOB);
                filled.push(trade.clone());
                ExchangeEvent::Trade(trade)
            }
            _ => ExchangeEvent::Deposit(Transfer {
                token: ETHER_ADDRESS,
                user: BOB,
                amount: units(1),
                balance: units(id),
            }),
        };
        chain.emit(at(i / 3 + 1, i % 3, event));
    }
    (cancelled, filled, all)
}

#[tokio::test]
async fn test_load_all_orders_generated_histories() {
    for seed in [1, 7, 42, 1337, 0xdead_beef] {
        let chain = FakeChain::new(1);
        let (cancelled, filled, all) = generate(&chain, seed, 30);
        let last_block = 30 / 3;
        // Emitted past the loaded range
        chain.emit(at(
            last_block + 1,
            0,
            ExchangeEvent::Order(order(1000, ALICE)),
        ));

        let store = Store::new();
        let epoch = store.begin_epoch().await;
        assert_ok!(sync::load_all_orders(&store, epoch, &chain.contracts(), last_block).await);

        let state = store.snapshot().await;
        let orders = state.orders();
        assert_eq!(orders.cancelled(), cancelled.as_slice(), "seed {seed}");
        assert_eq!(orders.filled(), filled.as_slice(), "seed {seed}");
        assert_eq!(orders.all(), all.as_slice(), "seed {seed}");
    }
}

#[tokio::test]
async fn test_duplicate_live_deliveries_applied_once() {
    let chain = FakeChain::new(1);
    let contracts = chain.contracts();
    let store = Store::new();
    let epoch = store.begin_epoch().await;
    let mut updates = store.subscribe();
    let subscription = assert_ok!(
        subscriber::subscribe(&store, epoch, Arc::new(chain.clone()), &contracts, 1).await
    );

    let made = at(2, 0, ExchangeEvent::Order(order(1, ALICE)));
    let cancelled = at(3, 0, ExchangeEvent::Cancel(order(1, ALICE)));
    for event in [&made, &made, &cancelled, &made, &cancelled] {
        chain.emit(event.clone());
    }
    for _ in 0..2 {
        testing::wait_for(&mut updates, |u| matches!(u, StateUpdate::OrderCancelled(_))).await;
    }

    let state = store.snapshot().await;
    assert_eq!(state.orders().all().len(), 1);
    assert_eq!(state.orders().cancelled().len(), 1);
    assert!(state.orders().open_orders().is_empty());
    subscription.release().await;
}
