//! Provider adapter: access to the wallet account and network identity.

use std::time::Duration;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::RpcClient,
    signers::local::PrivateKeySigner,
    transports::layers::RetryBackoffLayer,
};
use async_trait::async_trait;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info};
use url::Url;

use crate::error::ExchangeError;

const NOTIFICATION_CAPACITY: usize = 16;

/// Change reported by the wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalletNotification {
    /// Selected account changed, or got disconnected.
    AccountsChanged(Option<Address>),

    /// Wallet switched to another network.
    ChainChanged(u64),
}

/// Wallet the client acts on behalf of.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Currently selected account, if any.
    async fn current_account(&self) -> Result<Option<Address>, ExchangeError>;

    /// Chain ID of the network the wallet is connected to.
    async fn current_network(&self) -> Result<u64, ExchangeError>;

    /// Native currency balance of the account, in wei.
    async fn native_balance(&self, account: Address) -> Result<U256, ExchangeError>;

    /// Subscribes to account/network change notifications delivered
    /// after this call.
    fn notifications(&self) -> broadcast::Receiver<WalletNotification>;
}

/// Wallet backed by a JSON-RPC node, optionally signing locally.
///
/// Without a local signer the first account managed by the node is used.
/// Account and network changes are detected by polling at the client
/// poll interval.
#[derive(Debug)]
pub struct RpcWallet {
    provider: DynProvider,
    signer: Option<Address>,
    notifications: broadcast::Sender<WalletNotification>,
    watcher: JoinHandle<()>,
}

impl RpcWallet {
    /// Connects to the node and starts watching for account/network changes.
    ///
    /// Fails with [`ExchangeError::WalletNotFound`] if the node does not respond.
    pub async fn connect(
        url: Url,
        signer: Option<PrivateKeySigner>,
        poll_interval: Duration,
    ) -> Result<Self, ExchangeError> {
        let client = RpcClient::builder()
            .layer(RetryBackoffLayer::new(10, 100, 200))
            .http(url.clone());
        client.set_poll_interval(poll_interval);

        let signer_address = signer.as_ref().map(|s| s.address());
        let provider = match signer {
            Some(signer) => DynProvider::new(
                ProviderBuilder::new()
                    .wallet(EthereumWallet::new(signer))
                    .connect_client(client),
            ),
            None => DynProvider::new(ProviderBuilder::new().connect_client(client)),
        };

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| ExchangeError::WalletNotFound(e.to_string()))?;
        let account = select_account(&provider, signer_address).await?;
        info!(%url, chain_id, ?account, "Wallet connected");

        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let watcher = tokio::spawn(watch(
            provider.clone(),
            signer_address,
            account,
            chain_id,
            notifications.clone(),
            poll_interval,
        ));

        Ok(Self {
            provider,
            signer: signer_address,
            notifications,
            watcher,
        })
    }

    /// Underlying provider, to bind contracts with.
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

impl Drop for RpcWallet {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[async_trait]
impl Wallet for RpcWallet {
    async fn current_account(&self) -> Result<Option<Address>, ExchangeError> {
        select_account(&self.provider, self.signer).await
    }

    async fn current_network(&self) -> Result<u64, ExchangeError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ExchangeError> {
        Ok(self.provider.get_balance(account).await?)
    }

    fn notifications(&self) -> broadcast::Receiver<WalletNotification> {
        self.notifications.subscribe()
    }
}

async fn select_account(
    provider: &DynProvider,
    signer: Option<Address>,
) -> Result<Option<Address>, ExchangeError> {
    if signer.is_some() {
        return Ok(signer);
    }
    Ok(provider.get_accounts().await?.first().copied())
}

async fn watch(
    provider: DynProvider,
    signer: Option<Address>,
    mut account: Option<Address>,
    mut chain_id: u64,
    notifications: broadcast::Sender<WalletNotification>,
    poll_interval: Duration,
) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.tick().await; // First tick completes immediately
    loop {
        interval.tick().await;
        let polled = futures::try_join!(
            select_account(&provider, signer),
            async { provider.get_chain_id().await.map_err(ExchangeError::from) },
        );
        let (next_account, next_chain_id) = match polled {
            Ok(polled) => polled,
            Err(e) => {
                debug!(%e, "Wallet poll failed");
                continue;
            }
        };
        if next_account != account {
            account = next_account;
            // No receivers is fine, nobody is listening yet
            _ = notifications.send(WalletNotification::AccountsChanged(account));
        }
        if next_chain_id != chain_id {
            chain_id = next_chain_id;
            _ = notifications.send(WalletNotification::ChainChanged(chain_id));
        }
    }
}
