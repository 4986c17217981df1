//! Application state holder.
//!
//! [`Store`] owns the [`AppState`] and is the only way to mutate it. Every
//! applied [`StateUpdate`] is re-published to observers in application order.
//!
//! Updates originating from a contract binding (event deliveries, order and
//! balance loads) are tagged with the binding epoch and dropped once a newer
//! binding has started, so a released subscription can never leak stale
//! updates into the state.

mod app;
mod balances;
mod orders;
mod update;

use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::types::Epoch;

// Public re-exports
pub use app::*;
pub use balances::*;
pub use orders::*;
pub use update::*;

/// Default number of updates buffered for each observer.
const DEFAULT_UPDATES_CAPACITY: usize = 1024;

/// Shared handle to the application state.
#[derive(Clone, Debug)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    state: RwLock<AppState>,
    updates: broadcast::Sender<StateUpdate>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(DEFAULT_UPDATES_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(AppState::default()),
                updates,
            }),
        }
    }

    /// Subscribes to updates applied after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.inner.updates.subscribe()
    }

    /// Applies the update regardless of the binding epoch.
    pub async fn dispatch(&self, update: StateUpdate) {
        let mut state = self.inner.state.write().await;
        state.apply(&update);
        // Publishing under the lock keeps observers in application order
        _ = self.inner.updates.send(update);
    }

    /// Applies the update only if it comes from the current binding epoch.
    ///
    /// Returns `false` if the update is stale and got dropped.
    pub async fn dispatch_tagged(&self, epoch: Epoch, update: StateUpdate) -> bool {
        let mut state = self.inner.state.write().await;
        if state.epoch() != epoch {
            debug!(epoch, current = state.epoch(), ?update, "Stale update dropped");
            return false;
        }
        state.apply(&update);
        _ = self.inner.updates.send(update);
        true
    }

    /// Starts a new binding epoch, invalidating updates tagged with older ones.
    pub async fn begin_epoch(&self) -> Epoch {
        self.inner.state.write().await.next_epoch()
    }

    pub async fn epoch(&self) -> Epoch {
        self.inner.state.read().await.epoch()
    }

    pub async fn account(&self) -> Option<Address> {
        self.inner.state.read().await.account()
    }

    /// Reads from the current state.
    pub async fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&*self.inner.state.read().await)
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> AppState {
        self.inner.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{U256, address};

    use super::*;

    #[tokio::test]
    async fn test_stale_epoch_updates_dropped() {
        let store = Store::new();
        let mut updates = store.subscribe();

        let old = store.begin_epoch().await;
        assert!(
            store
                .dispatch_tagged(old, StateUpdate::NetworkLoaded(42))
                .await
        );

        let new = store.begin_epoch().await;
        assert_ne!(old, new);
        let balances = BalanceSnapshot::new(U256::from(1), U256::ZERO, U256::ZERO, U256::ZERO);
        assert!(
            !store
                .dispatch_tagged(old, StateUpdate::BalancesLoaded(balances))
                .await
        );
        assert_eq!(*store.snapshot().await.balances(), BalanceSnapshot::default());

        assert!(
            store
                .dispatch_tagged(new, StateUpdate::BalancesLoaded(balances))
                .await
        );
        assert_eq!(store.read(|s| *s.balances()).await, balances);

        assert_eq!(updates.try_recv().unwrap(), StateUpdate::NetworkLoaded(42));
        assert_eq!(
            updates.try_recv().unwrap(),
            StateUpdate::BalancesLoaded(balances)
        );
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_untagged_dispatch_ignores_epoch() {
        let store = Store::new();
        store.begin_epoch().await;
        let alice = address!("0x0000000000000000000000000000000000000a11");
        store.dispatch(StateUpdate::AccountLoaded(Some(alice))).await;
        assert_eq!(store.account().await, Some(alice));
    }
}
