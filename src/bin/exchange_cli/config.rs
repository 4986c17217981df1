//! Configuration for the exchange CLI.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): node, key, deployments
//! - CLI arguments: command to run and its parameters

use std::time::Duration;

use alloy::{
    primitives::U256,
    signers::local::{LocalSignerError, PrivateKeySigner},
};
use clap::{Parser, Subcommand};
use exchange_client::{
    num,
    types::{OrderId, OrderRequest},
};
use fastnum::{UD256, decimal::Context};

/// Default wallet and event poll interval.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Environment configuration (connection details, credentials).
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// RPC URL of the node acting as the wallet provider
    pub node_rpc_url: String,

    /// Optional private key for signing transactions locally, accounts
    /// managed by the node are used otherwise
    pub private_key: Option<String>,

    /// Path to the JSON deployment manifest
    pub deployments_path: String,

    /// Optional poll interval in milliseconds (default: 1000)
    pub poll_interval_ms: Option<u64>,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Parse the private key, if any.
    pub fn signer(&self) -> Result<Option<PrivateKeySigner>, LocalSignerError> {
        self.private_key
            .as_deref()
            .map(|key| key.parse::<PrivateKeySigner>())
            .transpose()
    }
}

/// CLI arguments.
#[derive(Debug, Parser)]
#[command(name = "exchange-cli")]
#[command(about = "Token exchange client: follow the exchange and trade on it")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the wallet and the exchange, printing state changes
    Watch,

    /// Print wallet and exchange balances of the account
    Balances,

    /// Print the order book, trade history and own open orders
    Orders,

    /// Post an order buying token for native currency
    Buy {
        /// Amount of token to buy (e.g., 10.5)
        amount: String,
        /// Price of one token in native currency (e.g., 0.001)
        price: String,
    },

    /// Post an order selling token for native currency
    Sell {
        /// Amount of token to sell
        amount: String,
        /// Price of one token in native currency
        price: String,
    },

    /// Cancel own open order
    Cancel { id: u64 },

    /// Fill an open order, paying the exchange fee
    Fill { id: u64 },

    /// Deposit native currency to the exchange
    DepositEther { amount: String },

    /// Withdraw native currency from the exchange
    WithdrawEther { amount: String },

    /// Approve and deposit token to the exchange
    DepositToken { amount: String },

    /// Withdraw token from the exchange
    WithdrawToken { amount: String },
}

/// Validated command.
#[derive(Debug)]
pub enum Request {
    Watch,
    Balances,
    Orders,
    Submit(TxRequest),
}

/// Validated transaction command.
#[derive(Debug)]
pub enum TxRequest {
    MakeOrder(OrderRequest),
    Cancel(OrderId),
    Fill(OrderId),
    DepositEther(UD256),
    WithdrawEther(UD256),
    DepositToken(UD256),
    WithdrawToken(UD256),
}

impl Command {
    pub fn to_request(&self) -> Result<Request, ConfigError> {
        let tx = match self {
            Command::Watch => return Ok(Request::Watch),
            Command::Balances => return Ok(Request::Balances),
            Command::Orders => return Ok(Request::Orders),
            Command::Buy { amount, price } => TxRequest::MakeOrder(OrderRequest::buy(
                parse_amount("amount", amount)?,
                parse_amount("price", price)?,
            )),
            Command::Sell { amount, price } => TxRequest::MakeOrder(OrderRequest::sell(
                parse_amount("amount", amount)?,
                parse_amount("price", price)?,
            )),
            Command::Cancel { id } => TxRequest::Cancel(U256::from(*id)),
            Command::Fill { id } => TxRequest::Fill(U256::from(*id)),
            Command::DepositEther { amount } => {
                TxRequest::DepositEther(parse_amount("amount", amount)?)
            }
            Command::WithdrawEther { amount } => {
                TxRequest::WithdrawEther(parse_amount("amount", amount)?)
            }
            Command::DepositToken { amount } => {
                TxRequest::DepositToken(parse_amount("amount", amount)?)
            }
            Command::WithdrawToken { amount } => {
                TxRequest::WithdrawToken(parse_amount("amount", amount)?)
            }
        };
        Ok(Request::Submit(tx))
    }
}

fn parse_amount(name: &str, value: &str) -> Result<UD256, ConfigError> {
    let amount = UD256::from_str(value, Context::default())
        .map_err(|_| ConfigError::InvalidAmount(name.to_string()))?;
    if amount == UD256::ZERO {
        return Err(ConfigError::ZeroAmount(name.to_string()));
    }
    // Must survive the conversion to wei unchanged
    let conv = num::Converter::wei();
    if conv.from_unsigned(conv.to_unsigned(amount)) != amount {
        return Err(ConfigError::TooManyDecimals(
            name.to_string(),
            num::ETHER_DECIMALS,
        ));
    }
    Ok(amount)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid decimal value for {0}")]
    InvalidAmount(String),

    #[error("{0} cannot be zero")]
    ZeroAmount(String),

    #[error("{0} has more than {1} decimal places")]
    TooManyDecimals(String, u8),
}
