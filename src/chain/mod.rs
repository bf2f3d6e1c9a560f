//! Chain access
//!
//! The pipeline only talks to the chain through [`ChainClient`] (point
//! queries) and [`ChainFeed`] (subscriptions). [`EthersChain`] is the
//! production implementation.

mod ethers_client;
mod subscription;

#[cfg(test)]
pub(crate) mod mock;

pub use ethers_client::EthersChain;
pub use subscription::{Subscription, SubscriptionHandle};

use async_trait::async_trait;
use ethers::types::{Address, Transaction, H256, U256};

use crate::error::ChainError;

/// `PairCreated(token0, token1, pair, index)` log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairCreated {
    pub factory: Address,
    pub token0: Address,
    pub token1: Address,
    pub pair: Address,
}

/// Token ordering and reserves of a pair, all read at one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairSnapshot {
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    pub block: u64,
}

/// Request/response side of the RPC endpoint
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// `None` once the transaction is mined or dropped
    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError>;

    /// `factory.getPair(a, b)`; the zero address means no pair
    async fn get_pair(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address, ChainError>;

    /// `token0`, `token1` and `getReserves` pinned to `block`
    async fn pair_snapshot(&self, pair: Address, block: u64) -> Result<PairSnapshot, ChainError>;
}

/// Subscription side of the RPC endpoint
#[async_trait]
pub trait ChainFeed: Send + Sync + 'static {
    async fn subscribe_pending(&self, buffer: usize) -> Result<Subscription<H256>, ChainError>;

    async fn subscribe_pair_created(
        &self,
        factory: Address,
        buffer: usize,
    ) -> Result<Subscription<PairCreated>, ChainError>;
}
