//! Contract binding: deployment manifest and typed contract handles.
//!
//! [`ContractLoader`] resolves [`Contracts`] for a network. Handles are
//! trait objects so the synchronization flow does not depend on the
//! transport, [`RpcLoader`] binds them to a JSON-RPC provider.

use std::{collections::HashMap, path::Path, sync::Arc};

use alloy::{
    primitives::{Address, TxHash, U256},
    providers::{DynProvider, Provider},
};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use tracing::{info, trace, warn};

use crate::{
    Deployment,
    abi::{exchange::Exchange, token::Token},
    error::ExchangeError,
    stream,
    types::{EventContext, EventKind, ExchangeEvent, OrderId, OrderParams},
};

/// Live stream of exchange events.
pub type EventStream = BoxStream<'static, Result<EventContext<ExchangeEvent>, ExchangeError>>;

/// Handle of the token contract.
#[async_trait]
pub trait TokenContract: Send + Sync {
    fn address(&self) -> Address;

    async fn balance_of(&self, owner: Address) -> Result<U256, ExchangeError>;

    /// Submits `approve`, resolving once the transaction hash is known.
    async fn approve(
        &self,
        from: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ExchangeError>;
}

/// Handle of the exchange contract.
///
/// Transaction submitting methods resolve once the transaction hash is
/// known and never wait for confirmation.
#[async_trait]
pub trait ExchangeContract: Send + Sync {
    fn address(&self) -> Address;

    /// Exchange-held balance of the user in the token, or in native
    /// currency for [`crate::abi::ETHER_ADDRESS`].
    async fn balance_of(&self, token: Address, user: Address) -> Result<U256, ExchangeError>;

    /// Fee to pay in native currency for filling an order, as seen by the caller.
    async fn calc_fee(&self, from: Address) -> Result<U256, ExchangeError>;

    async fn make_order(&self, from: Address, params: OrderParams)
    -> Result<TxHash, ExchangeError>;

    async fn cancel_order(&self, from: Address, id: OrderId) -> Result<TxHash, ExchangeError>;

    async fn fill_order(
        &self,
        from: Address,
        id: OrderId,
        fee: U256,
    ) -> Result<TxHash, ExchangeError>;

    async fn deposit_ether(&self, from: Address, amount: U256) -> Result<TxHash, ExchangeError>;

    async fn withdraw_ether(&self, from: Address, amount: U256) -> Result<TxHash, ExchangeError>;

    async fn deposit_token(
        &self,
        from: Address,
        token: Address,
        amount: U256,
    ) -> Result<TxHash, ExchangeError>;

    async fn withdraw_token(
        &self,
        from: Address,
        token: Address,
        amount: U256,
    ) -> Result<TxHash, ExchangeError>;

    /// Latest block number seen by the node.
    async fn block_number(&self) -> Result<u64, ExchangeError>;

    /// History of events of the given kind up to and including the block,
    /// in emission order.
    async fn past_events(
        &self,
        kind: EventKind,
        to_block: u64,
    ) -> Result<Vec<EventContext<ExchangeEvent>>, ExchangeError>;

    /// Events emitted from the block on, until the stream is dropped.
    async fn events(&self, from_block: u64) -> Result<EventStream, ExchangeError>;
}

/// Contract handles bound to a single network.
#[derive(Clone)]
pub struct Contracts {
    pub token: Arc<dyn TokenContract>,
    pub exchange: Arc<dyn ExchangeContract>,
}

impl std::fmt::Debug for Contracts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contracts")
            .field("token", &self.token.address())
            .field("exchange", &self.exchange.address())
            .finish()
    }
}

/// Resolves contract handles for a network.
pub trait ContractLoader: Send + Sync {
    /// Returns `None` if the contracts are not deployed to the network.
    fn load(&self, chain_id: u64) -> Option<Contracts>;
}

/// Addresses of the deployed contracts per network.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct DeploymentManifest {
    networks: HashMap<u64, Deployment>,
}

/// Error of deployment manifest loading.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed manifest: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeploymentManifest {
    pub fn new(deployments: impl IntoIterator<Item = Deployment>) -> Self {
        Self {
            networks: deployments
                .into_iter()
                .map(|d| (d.chain_id(), d))
                .collect(),
        }
    }

    /// Parses manifest of the form
    /// `{"networks": {"<chain id>": {"token": .., "exchange": .., "deployedAtBlock": ..}}}`.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let mut manifest: Self = serde_json::from_str(json)?;
        for (chain_id, deployment) in manifest.networks.iter_mut() {
            deployment.chain_id = *chain_id;
        }
        Ok(manifest)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn get(&self, chain_id: u64) -> Result<&Deployment, ExchangeError> {
        self.networks
            .get(&chain_id)
            .ok_or(ExchangeError::DeploymentNotFound(chain_id))
    }
}

/// Binds contract handles to a JSON-RPC provider.
#[derive(Clone, Debug)]
pub struct RpcLoader {
    provider: DynProvider,
    manifest: DeploymentManifest,
}

impl RpcLoader {
    pub fn new(provider: DynProvider, manifest: DeploymentManifest) -> Self {
        Self { provider, manifest }
    }
}

impl ContractLoader for RpcLoader {
    fn load(&self, chain_id: u64) -> Option<Contracts> {
        match self.manifest.get(chain_id) {
            Ok(deployment) => {
                info!(
                    chain_id,
                    token = %deployment.token(),
                    exchange = %deployment.exchange(),
                    "Contracts bound"
                );
                Some(Contracts {
                    token: Arc::new(RpcToken::new(deployment.token(), self.provider.clone())),
                    exchange: Arc::new(RpcExchange::new(deployment, self.provider.clone())),
                })
            }
            Err(e) => {
                warn!(%e, "Select another network with the wallet");
                None
            }
        }
    }
}

/// Token contract over JSON-RPC.
#[derive(Clone, Debug)]
pub struct RpcToken {
    instance: Token::TokenInstance<DynProvider>,
}

impl RpcToken {
    pub fn new(address: Address, provider: DynProvider) -> Self {
        Self {
            instance: Token::new(address, provider),
        }
    }
}

#[async_trait]
impl TokenContract for RpcToken {
    fn address(&self) -> Address {
        *self.instance.address()
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, ExchangeError> {
        Ok(self.instance.balanceOf(owner).call().await?)
    }

    async fn approve(
        &self,
        from: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ExchangeError> {
        let pending = self
            .instance
            .approve(spender, amount)
            .from(from)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }
}

/// Exchange contract over JSON-RPC.
#[derive(Clone, Debug)]
pub struct RpcExchange {
    instance: Exchange::ExchangeInstance<DynProvider>,
    provider: DynProvider,
    deployed_at_block: u64,
}

impl RpcExchange {
    pub fn new(deployment: &Deployment, provider: DynProvider) -> Self {
        Self {
            instance: Exchange::new(deployment.exchange(), provider.clone()),
            provider,
            deployed_at_block: deployment.deployed_at_block(),
        }
    }
}

#[async_trait]
impl ExchangeContract for RpcExchange {
    fn address(&self) -> Address {
        *self.instance.address()
    }

    async fn balance_of(&self, token: Address, user: Address) -> Result<U256, ExchangeError> {
        Ok(self.instance.balanceOf(token, user).call().await?)
    }

    async fn calc_fee(&self, from: Address) -> Result<U256, ExchangeError> {
        Ok(self.instance.calcFee().from(from).call().await?)
    }

    async fn make_order(
        &self,
        from: Address,
        params: OrderParams,
    ) -> Result<TxHash, ExchangeError> {
        let pending = self
            .instance
            .makeOrder(
                params.token_get,
                params.amount_get,
                params.token_give,
                params.amount_give,
            )
            .from(from)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn cancel_order(&self, from: Address, id: OrderId) -> Result<TxHash, ExchangeError> {
        let pending = self.instance.cancelOrder(id).from(from).send().await?;
        Ok(*pending.tx_hash())
    }

    async fn fill_order(
        &self,
        from: Address,
        id: OrderId,
        fee: U256,
    ) -> Result<TxHash, ExchangeError> {
        let pending = self
            .instance
            .fillOrder(id)
            .from(from)
            .value(fee)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn deposit_ether(&self, from: Address, amount: U256) -> Result<TxHash, ExchangeError> {
        let pending = self
            .instance
            .depositEther()
            .from(from)
            .value(amount)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn withdraw_ether(&self, from: Address, amount: U256) -> Result<TxHash, ExchangeError> {
        let pending = self.instance.withdrawEther(amount).from(from).send().await?;
        Ok(*pending.tx_hash())
    }

    async fn deposit_token(
        &self,
        from: Address,
        token: Address,
        amount: U256,
    ) -> Result<TxHash, ExchangeError> {
        let pending = self
            .instance
            .depositToken(token, amount)
            .from(from)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn withdraw_token(
        &self,
        from: Address,
        token: Address,
        amount: U256,
    ) -> Result<TxHash, ExchangeError> {
        let pending = self
            .instance
            .withdrawToken(token, amount)
            .from(from)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn block_number(&self) -> Result<u64, ExchangeError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn past_events(
        &self,
        kind: EventKind,
        to_block: u64,
    ) -> Result<Vec<EventContext<ExchangeEvent>>, ExchangeError> {
        stream::history(
            &self.provider,
            self.address(),
            self.deployed_at_block,
            to_block,
            kind,
        )
        .await
    }

    async fn events(&self, from_block: u64) -> Result<EventStream, ExchangeError> {
        Ok(stream::raw(
            self.address(),
            self.provider.clone(),
            from_block,
            tokio::time::sleep,
        )
        .map_ok(|block| {
            trace!(block = block.block_number(), "Exchange block polled");
            futures::stream::iter(block.into_events().into_iter().map(Ok::<_, ExchangeError>))
        })
        .try_flatten()
        .boxed())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    #[test]
    fn test_manifest_from_json() {
        let manifest = DeploymentManifest::from_json(
            r#"{
                "networks": {
                    "42": {
                        "token": "0x00000000000000000000000000000000000000aa",
                        "exchange": "0x00000000000000000000000000000000000000bb",
                        "deployedAtBlock": 1200
                    },
                    "1337": {
                        "token": "0x00000000000000000000000000000000000000cc",
                        "exchange": "0x00000000000000000000000000000000000000dd"
                    }
                }
            }"#,
        )
        .unwrap();

        let kovan = manifest.get(42).unwrap();
        assert_eq!(kovan.chain_id(), 42);
        assert_eq!(
            kovan.token(),
            address!("0x00000000000000000000000000000000000000aa")
        );
        assert_eq!(kovan.deployed_at_block(), 1200);

        let local = manifest.get(1337).unwrap();
        assert_eq!(local.chain_id(), 1337);
        assert_eq!(local.deployed_at_block(), 0);

        assert!(matches!(
            manifest.get(1),
            Err(ExchangeError::DeploymentNotFound(1))
        ));
    }

    #[test]
    fn test_malformed_manifest() {
        assert!(matches!(
            DeploymentManifest::from_json(r#"{"networks": {"42": {"token": "0x01"}}}"#),
            Err(ManifestError::Json(_))
        ));
    }
}
