use alloy::primitives::{Address, U256};
use exchange_client::{
    abi::ETHER_ADDRESS,
    dispatch::Dispatcher,
    error::ExchangeError,
    state::{Alert, DepositPhase, StateUpdate, Store, TxAction},
    testing::{self, ALICE, BOB, EXCHANGE, FakeCall, FakeChain, TOKEN, units},
    types::OrderParams,
};
use fastnum::udec256;
use tokio_test::{assert_err, assert_ok};

async fn logged_in(chain: &FakeChain, account: Option<Address>) -> Dispatcher {
    let store = Store::new();
    store.dispatch(StateUpdate::AccountLoaded(account)).await;
    Dispatcher::new(store, chain.contracts())
}

#[tokio::test]
async fn test_no_account_requires_login() {
    let chain = FakeChain::new(1);
    let dispatcher = logged_in(&chain, None).await;
    let store = dispatcher.store().clone();
    let mut updates = store.subscribe();

    let results = [
        dispatcher.make_buy_order(udec256!(1), udec256!(0.1)).await,
        dispatcher.make_sell_order(udec256!(1), udec256!(0.1)).await,
        dispatcher.cancel_order(U256::from(1)).await,
        dispatcher.fill_order(U256::from(1)).await,
        dispatcher.deposit_ether(udec256!(1)).await,
        dispatcher.withdraw_ether(udec256!(1)).await,
        dispatcher.deposit_token(udec256!(1)).await,
        dispatcher.withdraw_token(udec256!(1)).await,
    ];
    for result in results {
        assert!(matches!(result, Err(ExchangeError::AccountMissing)));
    }

    let published = testing::drain(&mut updates);
    assert_eq!(published.len(), 8);
    assert!(
        published
            .iter()
            .all(|u| *u == StateUpdate::Alert(Alert::PleaseLogin))
    );
    assert!(chain.sent().is_empty());
    assert_eq!(store.snapshot().await.token_deposit(), None);
}

#[tokio::test]
async fn test_make_orders() {
    let chain = FakeChain::new(1);
    let dispatcher = logged_in(&chain, Some(ALICE)).await;

    assert_ok!(dispatcher.make_buy_order(udec256!(10), udec256!(0.1)).await);
    assert_ok!(dispatcher.make_sell_order(udec256!(4), udec256!(0.25)).await);

    let calls = chain.sent().into_iter().map(|(_, c)| c).collect::<Vec<_>>();
    assert_eq!(
        calls,
        vec![
            FakeCall::MakeOrder {
                from: ALICE,
                params: OrderParams {
                    token_get: TOKEN,
                    amount_get: units(10),
                    token_give: ETHER_ADDRESS,
                    amount_give: units(1),
                },
            },
            FakeCall::MakeOrder {
                from: ALICE,
                params: OrderParams {
                    token_get: ETHER_ADDRESS,
                    amount_get: units(1),
                    token_give: TOKEN,
                    amount_give: units(4),
                },
            },
        ]
    );

    let state = dispatcher.store().snapshot().await;
    assert!(state.buy_order_making());
    assert!(state.sell_order_making());
}

#[tokio::test]
async fn test_token_deposit_does_not_wait_for_approval() {
    let chain = FakeChain::new(1);
    chain.fund(ALICE, 1, 50);
    let dispatcher = logged_in(&chain, Some(ALICE)).await;
    let mut updates = dispatcher.store().subscribe();

    let deposit_hash = assert_ok!(dispatcher.deposit_token(udec256!(20)).await);

    // Both submitted, nothing mined yet
    let sent = chain.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(chain.pending_count(), 2);
    let (approve_hash, approve) = &sent[0];
    assert_eq!(
        *approve,
        FakeCall::Approve {
            from: ALICE,
            spender: EXCHANGE,
            amount: units(20),
        }
    );
    assert_eq!(
        sent[1],
        (
            deposit_hash,
            FakeCall::DepositToken {
                from: ALICE,
                token: TOKEN,
                amount: units(20),
            }
        )
    );

    assert_eq!(
        testing::drain(&mut updates),
        vec![
            StateUpdate::TokenDeposit(DepositPhase::Approving),
            StateUpdate::Submitted(TxAction::ApproveToken, *approve_hash),
            StateUpdate::Submitted(TxAction::DepositToken, deposit_hash),
        ]
    );
    let state = dispatcher.store().snapshot().await;
    assert_eq!(
        state.token_deposit(),
        Some(DepositPhase::DepositSubmitted(deposit_hash))
    );
    assert!(state.balances_loading());

    assert_eq!(chain.mine(), 2);
    assert_eq!(chain.exchange_balance(TOKEN, ALICE), units(20));
}

#[tokio::test]
async fn test_token_deposit_stops_on_approval_failure() {
    let chain = FakeChain::new(1);
    chain.fund(ALICE, 1, 50);
    chain.set_fail_sends(true);
    let dispatcher = logged_in(&chain, Some(ALICE)).await;
    let mut updates = dispatcher.store().subscribe();

    assert_err!(dispatcher.deposit_token(udec256!(20)).await);
    assert!(chain.sent().is_empty());

    let published = testing::drain(&mut updates);
    assert_eq!(published.len(), 3);
    assert_eq!(
        published[0],
        StateUpdate::TokenDeposit(DepositPhase::Approving)
    );
    assert_eq!(published[1], StateUpdate::Failed(TxAction::ApproveToken));
    assert!(matches!(
        &published[2],
        StateUpdate::Alert(Alert::TransactionFailed(TxAction::ApproveToken, _))
    ));
    assert_eq!(dispatcher.store().snapshot().await.token_deposit(), None);
}

#[tokio::test]
async fn test_fill_order_pays_quoted_fee() {
    let chain = FakeChain::new(1);
    let dispatcher = logged_in(&chain, Some(BOB)).await;

    let hash = assert_ok!(dispatcher.fill_order(U256::from(7)).await);
    assert_eq!(
        chain.sent(),
        vec![(
            hash,
            FakeCall::FillOrder {
                from: BOB,
                id: U256::from(7),
                fee: testing::FILL_FEE,
            }
        )]
    );
    assert!(dispatcher.store().snapshot().await.order_filling());

    // No such order, reverts once mined
    assert_eq!(chain.mine(), 0);
}

#[tokio::test]
async fn test_ether_transfers() {
    let chain = FakeChain::new(1);
    chain.fund(ALICE, 3, 0);
    let dispatcher = logged_in(&chain, Some(ALICE)).await;

    assert_ok!(dispatcher.deposit_ether(udec256!(2)).await);
    assert_eq!(chain.mine(), 1);
    assert_eq!(chain.exchange_balance(ETHER_ADDRESS, ALICE), units(2));

    assert_ok!(dispatcher.withdraw_ether(udec256!(0.5)).await);
    assert_eq!(chain.mine(), 1);
    assert_eq!(
        chain.exchange_balance(ETHER_ADDRESS, ALICE),
        units(3) / U256::from(2)
    );
}

#[tokio::test]
async fn test_failed_submission_alerts() {
    let chain = FakeChain::new(1);
    chain.set_fail_sends(true);
    let dispatcher = logged_in(&chain, Some(ALICE)).await;
    let mut updates = dispatcher.store().subscribe();

    assert_err!(dispatcher.cancel_order(U256::from(1)).await);
    assert_eq!(
        testing::drain(&mut updates),
        vec![
            StateUpdate::Failed(TxAction::CancelOrder),
            StateUpdate::Alert(Alert::TransactionFailed(
                TxAction::CancelOrder,
                "transport error: user rejected transaction".to_string()
            )),
        ]
    );
    assert!(!dispatcher.store().snapshot().await.order_cancelling());
}
