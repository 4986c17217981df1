//! Exchange event subscription.
//!
//! Each delivered event is published as its own [`StateUpdate`] and followed
//! by a full balance resynchronization of the wallet account. Delivery order
//! and uniqueness are not relied upon, balances are always re-read.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    binding::{Contracts, EventStream},
    error::ExchangeError,
    state::{StateUpdate, Store},
    sync,
    types::{Epoch, ExchangeEvent},
    wallet::Wallet,
};

/// Live subscription to exchange events of a single binding.
///
/// Has to be released before the next binding subscribes.
/// Dropping the subscription stops it as well, without waiting.
#[derive(Debug)]
pub struct Subscription {
    epoch: Epoch,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Binding epoch the subscription tags its updates with.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the subscription and waits until no more updates can come from it.
    pub async fn release(mut self) {
        self.task.abort();
        // Cancelled is the expected outcome
        _ = (&mut self.task).await;
        debug!(epoch = self.epoch, "Subscription released");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Subscribes to Order, Cancel, Trade, Deposit and Withdraw events emitted
/// from `from_block` on.
pub async fn subscribe(
    store: &Store,
    epoch: Epoch,
    wallet: Arc<dyn Wallet>,
    contracts: &Contracts,
    from_block: u64,
) -> Result<Subscription, ExchangeError> {
    let events = contracts.exchange.events(from_block).await?;
    info!(
        epoch,
        from_block,
        exchange = %contracts.exchange.address(),
        "Subscribed to exchange events"
    );
    let task = tokio::spawn(run(store.clone(), epoch, wallet, contracts.clone(), events));
    Ok(Subscription { epoch, task })
}

async fn run(
    store: Store,
    epoch: Epoch,
    wallet: Arc<dyn Wallet>,
    contracts: Contracts,
    mut events: EventStream,
) {
    while let Some(result) = events.next().await {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!(%e, epoch, "Exchange event delivery failed");
                continue;
            }
        };
        debug!(
            epoch,
            tx_hash = %event.tx_hash(),
            block = event.block_number(),
            kind = ?event.event().kind(),
            "Exchange event"
        );

        let update = match event.into_event() {
            ExchangeEvent::Order(order) => StateUpdate::OrderMade(order),
            ExchangeEvent::Cancel(order) => StateUpdate::OrderCancelled(order),
            ExchangeEvent::Trade(trade) => StateUpdate::OrderFilled(trade),
            ExchangeEvent::Deposit(transfer) => StateUpdate::Deposited(transfer),
            ExchangeEvent::Withdraw(transfer) => StateUpdate::Withdrawn(transfer),
        };
        if !store.dispatch_tagged(epoch, update).await {
            // Superseded by a newer binding
            break;
        }

        let account = match wallet.current_account().await {
            Ok(account) => account,
            Err(e) => {
                debug!(%e, "Syncing account...");
                continue;
            }
        };
        sync::load_balances(&store, epoch, wallet.as_ref(), Some(&contracts), account).await;
    }
    debug!(epoch, "Exchange event stream ended");
}
