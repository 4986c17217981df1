//! Token exchange client.
//!
//! # Overview
//!
//! Keeps an in-memory projection of a deployed token/exchange contract pair
//! in sync with the connected wallet, and submits exchange transactions on
//! behalf of the wallet account.
//!
//! The client holds no authoritative state of its own: [`state::Store`] is
//! always rebuilt from the wallet account, the network, the exchange event log
//! and on-chain balance reads.
//!
//! * [`wallet::Wallet`] reports the current account and network and raises
//!   change notifications.
//! * [`binding::ContractLoader`] resolves contract handles for the network from
//!   a [`binding::DeploymentManifest`].
//! * [`sync`] loads the historical order log and balance snapshots.
//! * [`subscriber`] follows live exchange events for a single binding.
//! * [`dispatch::Dispatcher`] submits transactions without waiting for
//!   confirmation, confirmations arrive through the event subscription.
//! * [`session::Session`] wires the above together and re-binds on every
//!   account or network change.
//!
//! # Testing
//!
//! [`testing`] module provides an in-memory chain implementing the wallet and
//! contract handle traits, with transactions mined on demand.

pub mod abi;
pub mod binding;
pub mod dispatch;
pub mod error;
pub mod num;
pub mod session;
pub mod state;
pub mod stream;
pub mod subscriber;
pub mod sync;
pub mod testing;
pub mod types;
pub mod wallet;

use alloy::primitives::Address;

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Token and exchange contracts deployed to a specific network.
pub struct Deployment {
    #[serde(skip)]
    chain_id: u64,
    token: Address,
    exchange: Address,
    #[serde(default)]
    deployed_at_block: u64,
}

impl Deployment {
    pub fn new(chain_id: u64, token: Address, exchange: Address, deployed_at_block: u64) -> Self {
        Self {
            chain_id,
            token,
            exchange,
            deployed_at_block,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn exchange(&self) -> Address {
        self.exchange
    }

    /// Block historical exchange events are read from.
    pub fn deployed_at_block(&self) -> u64 {
        self.deployed_at_block
    }
}
