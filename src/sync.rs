//! Balance and order synchronization.
//!
//! Both operations re-read on-chain ground truth and republish it as a whole,
//! so they can be repeated at any time without drifting.

use alloy::primitives::Address;
use tracing::{debug, info};

use crate::{
    abi::ETHER_ADDRESS,
    binding::Contracts,
    error::ExchangeError,
    state::{BalanceSnapshot, StateUpdate, Store},
    types::{Epoch, EventKind, ExchangeEvent, Order, Trade},
    wallet::Wallet,
};

/// Replays the Cancel, Trade and Order history of the exchange up to and
/// including `to_block` and publishes it as three sequences in emission order.
///
/// Reads the whole event log, meant to run once per binding.
pub async fn load_all_orders(
    store: &Store,
    epoch: Epoch,
    contracts: &Contracts,
    to_block: u64,
) -> Result<(), ExchangeError> {
    let cancelled = contracts
        .exchange
        .past_events(EventKind::Cancel, to_block)
        .await?
        .into_iter()
        .filter_map(|e| match e.into_event() {
            ExchangeEvent::Cancel(order) => Some(order),
            _ => None,
        })
        .collect::<Vec<Order>>();
    let cancelled_count = cancelled.len();
    store
        .dispatch_tagged(epoch, StateUpdate::CancelledOrdersLoaded(cancelled))
        .await;

    let filled = contracts
        .exchange
        .past_events(EventKind::Trade, to_block)
        .await?
        .into_iter()
        .filter_map(|e| match e.into_event() {
            ExchangeEvent::Trade(trade) => Some(trade),
            _ => None,
        })
        .collect::<Vec<Trade>>();
    let filled_count = filled.len();
    store
        .dispatch_tagged(epoch, StateUpdate::FilledOrdersLoaded(filled))
        .await;

    let all = contracts
        .exchange
        .past_events(EventKind::Order, to_block)
        .await?
        .into_iter()
        .filter_map(|e| match e.into_event() {
            ExchangeEvent::Order(order) => Some(order),
            _ => None,
        })
        .collect::<Vec<Order>>();
    let all_count = all.len();
    store
        .dispatch_tagged(epoch, StateUpdate::AllOrdersLoaded(all))
        .await;

    info!(
        orders = all_count,
        filled = filled_count,
        cancelled = cancelled_count,
        to_block,
        "Order history loaded"
    );
    Ok(())
}

/// Reads wallet and exchange balances of the account in both native
/// currency and token.
pub async fn read_balances(
    wallet: &dyn Wallet,
    contracts: &Contracts,
    account: Address,
) -> Result<BalanceSnapshot, ExchangeError> {
    let token = contracts.token.address();
    let (wallet_ether, wallet_token, exchange_ether, exchange_token) = futures::try_join!(
        wallet.native_balance(account),
        contracts.token.balance_of(account),
        contracts.exchange.balance_of(ETHER_ADDRESS, account),
        contracts.exchange.balance_of(token, account),
    )?;
    Ok(BalanceSnapshot::new(
        wallet_ether,
        wallet_token,
        exchange_ether,
        exchange_token,
    ))
}

/// Publishes a fresh balance snapshot of the account.
///
/// No-op without an account or contracts. Read failures are expected while
/// wallet transactions are in flight, they are logged and swallowed, the
/// next event retries.
pub async fn load_balances(
    store: &Store,
    epoch: Epoch,
    wallet: &dyn Wallet,
    contracts: Option<&Contracts>,
    account: Option<Address>,
) {
    let (Some(contracts), Some(account)) = (contracts, account) else {
        return;
    };
    match read_balances(wallet, contracts, account).await {
        Ok(balances) => {
            store
                .dispatch_tagged(epoch, StateUpdate::BalancesLoaded(balances))
                .await;
        }
        Err(e) => debug!(%e, %account, "Syncing balances..."),
    }
}
