//! Synchronization session.
//!
//! [`Session::update`] re-binds the client to whatever account and network
//! the wallet currently reports, [`Session::run`] repeats it on every wallet
//! notification.

use std::{sync::Arc, time::Duration};

use alloy::signers::local::PrivateKeySigner;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    binding::{ContractLoader, Contracts},
    dispatch::Dispatcher,
    error::ExchangeError,
    state::{Alert, BalanceSnapshot, StateUpdate, Store},
    subscriber::{self, Subscription},
    sync,
    types::Epoch,
    wallet::{RpcWallet, Wallet},
};

/// Outcome of a session update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Contracts bound, history and balances loaded, events followed.
    Ready,

    /// Account or contracts missing, state cleared until the next
    /// wallet notification.
    Degraded,
}

/// Connects to the wallet, signaling the user once if there is none.
pub async fn connect_wallet(
    store: &Store,
    url: Url,
    signer: Option<PrivateKeySigner>,
    poll_interval: Duration,
) -> Result<RpcWallet, ExchangeError> {
    match RpcWallet::connect(url, signer, poll_interval).await {
        Ok(wallet) => Ok(wallet),
        Err(e) => {
            error!(%e, "Wallet not available");
            store
                .dispatch(StateUpdate::Alert(Alert::InstallWallet))
                .await;
            Err(e)
        }
    }
}

/// Keeps the store in sync with the wallet and the bound contracts.
pub struct Session {
    store: Store,
    wallet: Arc<dyn Wallet>,
    loader: Arc<dyn ContractLoader>,
    contracts: Option<Contracts>,
    subscription: Option<Subscription>,
}

impl Session {
    pub fn new(store: Store, wallet: Arc<dyn Wallet>, loader: Arc<dyn ContractLoader>) -> Self {
        Self {
            store,
            wallet,
            loader,
            contracts: None,
            subscription: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Contracts bound by the last update.
    pub fn contracts(&self) -> Option<&Contracts> {
        self.contracts.as_ref()
    }

    /// Subscription of the current binding, if any.
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// Dispatcher for the bound contracts.
    pub fn dispatcher(&self) -> Option<Dispatcher> {
        self.contracts
            .clone()
            .map(|contracts| Dispatcher::new(self.store.clone(), contracts))
    }

    /// Reloads account and network, re-binds contracts and either loads
    /// orders and balances and subscribes to events, or resets the state.
    ///
    /// A failed update leaves the session reset, as if degraded.
    pub async fn update(&mut self) -> Result<SessionStatus, ExchangeError> {
        // Previous binding must stop delivering before anything gets reloaded
        self.release().await;
        let epoch = self.store.begin_epoch().await;

        match self.bind(epoch).await {
            Ok(status) => Ok(status),
            Err(e) => {
                self.release().await;
                self.contracts = None;
                self.store.dispatch(StateUpdate::ContractsCleared).await;
                self.reset(epoch).await;
                Err(e)
            }
        }
    }

    async fn bind(&mut self, epoch: Epoch) -> Result<SessionStatus, ExchangeError> {
        let chain_id = self.wallet.current_network().await?;
        let account = match self.wallet.current_account().await {
            Ok(account) => account,
            Err(e) => {
                warn!(%e, "Failed to read wallet account");
                None
            }
        };
        self.store.dispatch(StateUpdate::NetworkLoaded(chain_id)).await;
        self.store.dispatch(StateUpdate::AccountLoaded(account)).await;

        self.contracts = self.loader.load(chain_id);
        let contracts = match (&self.contracts, account) {
            (Some(contracts), Some(_)) => contracts.clone(),
            _ => {
                if let Some(contracts) = &self.contracts {
                    self.publish_contracts(contracts).await;
                } else {
                    self.store.dispatch(StateUpdate::ContractsCleared).await;
                }
                self.reset(epoch).await;
                return Ok(SessionStatus::Degraded);
            }
        };
        self.publish_contracts(&contracts).await;

        // History up to the head, live events right after it
        let head = contracts.exchange.block_number().await?;
        sync::load_all_orders(&self.store, epoch, &contracts, head).await?;
        sync::load_balances(
            &self.store,
            epoch,
            self.wallet.as_ref(),
            Some(&contracts),
            account,
        )
        .await;
        self.subscription = Some(
            subscriber::subscribe(&self.store, epoch, self.wallet.clone(), &contracts, head + 1)
                .await?,
        );

        info!(chain_id, ?account, epoch, head, "Session ready");
        Ok(SessionStatus::Ready)
    }

    /// Runs [`Self::update`] now and on every wallet notification, until the
    /// wallet stops delivering notifications.
    pub async fn run(&mut self) {
        let mut notifications = self.wallet.notifications();
        self.try_update().await;
        loop {
            match notifications.recv().await {
                Ok(notification) => info!(?notification, "Wallet changed"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Wallet notifications lagged");
                }
                Err(RecvError::Closed) => break,
            }
            self.try_update().await;
        }
        self.release().await;
    }

    async fn try_update(&mut self) {
        match self.update().await {
            Ok(status) => debug!(?status, "Session updated"),
            Err(e) if e.is_provider_failure() => error!(%e, "Session update failed"),
            Err(e) => warn!(%e, "Session update failed"),
        }
    }

    /// Releases the current subscription, if any.
    pub async fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release().await;
        }
    }

    async fn publish_contracts(&self, contracts: &Contracts) {
        self.store
            .dispatch(StateUpdate::ContractsLoaded {
                token: contracts.token.address(),
                exchange: contracts.exchange.address(),
            })
            .await;
    }

    /// Clears balances and orders and asks the user to connect or switch
    /// network.
    async fn reset(&self, epoch: Epoch) {
        warn!(epoch, "Session degraded, state reset");
        self.store
            .dispatch(StateUpdate::Alert(Alert::ConnectOrSwitchNetwork))
            .await;
        for update in [
            StateUpdate::BalancesLoaded(BalanceSnapshot::default()),
            StateUpdate::CancelledOrdersLoaded(vec![]),
            StateUpdate::FilledOrdersLoaded(vec![]),
            StateUpdate::AllOrdersLoaded(vec![]),
        ] {
            self.store.dispatch_tagged(epoch, update).await;
        }
    }
}
