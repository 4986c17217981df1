//! Error types for the exchange CLI.

use exchange_client::{binding::ManifestError, error::ExchangeError};

use crate::config::ConfigError;

/// Main error type for the exchange CLI.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Environment configuration error: {0}")]
    EnvConfig(#[from] envy::Error),

    #[error("Deployment manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Alloy signer error: {0}")]
    AlloySigner(#[from] alloy::signers::local::LocalSignerError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(#[from] url::ParseError),

    #[error("No account connected or contracts not deployed to the wallet network")]
    NotReady,
}

pub type Result<T> = std::result::Result<T, Error>;
