//! Error types

use thiserror::Error;

/// Chain access failures
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("provider: {0}")]
    Provider(#[from] ethers::providers::ProviderError),
    #[error("invalid endpoint url: {0}")]
    Endpoint(String),
    #[error("contract call: {0}")]
    Contract(String),
    #[error("subscription interface unavailable")]
    SubscriptionUnavailable,
    #[error("subscription closed before it was established")]
    SubscriptionClosed,
}

/// Calldata decoding failures for recognized selectors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("abi: {0}")]
    Abi(String),
    #[error("unexpected argument layout")]
    Layout,
    #[error("path has {0} hops, need at least 2 tokens")]
    ShortPath(usize),
}

/// Configuration problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
