//! Core types for the detection pipeline

use ethers::types::{Address, Bytes, Transaction, H256, I256, U256};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::amm;

/// Opportunity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpportunityKind {
    Arbitrage,
    Sandwich,
}

impl OpportunityKind {
    pub fn label(&self) -> &'static str {
        match self {
            OpportunityKind::Arbitrage => "arbitrage",
            OpportunityKind::Sandwich => "sandwich",
        }
    }
}

/// V2 router swap entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapMethod {
    SwapExactTokensForTokens,
    SwapTokensForExactTokens,
    SwapExactEthForTokens,
    SwapTokensForExactEth,
    SwapExactTokensForEth,
    SwapEthForExactTokens,
}

impl SwapMethod {
    pub const ALL: [SwapMethod; 6] = [
        SwapMethod::SwapExactTokensForTokens,
        SwapMethod::SwapTokensForExactTokens,
        SwapMethod::SwapExactEthForTokens,
        SwapMethod::SwapTokensForExactEth,
        SwapMethod::SwapExactTokensForEth,
        SwapMethod::SwapEthForExactTokens,
    ];

    /// Solidity function name on the router
    pub fn name(&self) -> &'static str {
        match self {
            SwapMethod::SwapExactTokensForTokens => "swapExactTokensForTokens",
            SwapMethod::SwapTokensForExactTokens => "swapTokensForExactTokens",
            SwapMethod::SwapExactEthForTokens => "swapExactETHForTokens",
            SwapMethod::SwapTokensForExactEth => "swapTokensForExactETH",
            SwapMethod::SwapExactTokensForEth => "swapExactTokensForETH",
            SwapMethod::SwapEthForExactTokens => "swapETHForExactTokens",
        }
    }

    /// Input amount is fixed and output is bounded below
    pub fn is_exact_input(&self) -> bool {
        matches!(
            self,
            SwapMethod::SwapExactTokensForTokens
                | SwapMethod::SwapExactEthForTokens
                | SwapMethod::SwapExactTokensForEth
        )
    }

    /// Input is paid with msg.value
    pub fn is_eth_input(&self) -> bool {
        matches!(
            self,
            SwapMethod::SwapExactEthForTokens | SwapMethod::SwapEthForExactTokens
        )
    }
}

impl std::fmt::Display for SwapMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pending transaction as held by the mempool working set
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub hash: H256,
    pub from: Address,
    pub to: Option<Address>,
    pub value_wei: U256,
    pub gas_price_wei: U256,
    pub data: Bytes,
    pub first_seen_at: Instant,
}

impl PendingTransaction {
    /// Build from an RPC transaction body. Type-2 transactions carry no legacy
    /// gas price, so the fee cap stands in for it.
    pub fn from_rpc(tx: Transaction, first_seen_at: Instant) -> Self {
        let gas_price_wei = tx
            .gas_price
            .or(tx.max_fee_per_gas)
            .unwrap_or_default();

        Self {
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
            value_wei: tx.value,
            gas_price_wei,
            data: tx.input,
            first_seen_at,
        }
    }
}

/// Decoded swap intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedSwap {
    pub source_hash: H256,
    pub router: Address,
    pub method: SwapMethod,
    pub path: Vec<Address>,
    /// Exact input, or the caller's maximum input for exact-output methods
    pub amount_in: U256,
    /// Minimum output, or the exact requested output for exact-output methods
    pub amount_out_min: U256,
    pub deadline: U256,
    pub value_wei: U256,
}

impl ClassifiedSwap {
    pub fn token_in(&self) -> Address {
        self.path[0]
    }

    pub fn token_out(&self) -> Address {
        self.path[self.path.len() - 1]
    }
}

/// Unordered token pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    token0: Address,
    token1: Address,
}

impl PoolKey {
    pub fn new(token_a: Address, token_b: Address) -> Self {
        let (token0, token1) = if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        Self { token0, token1 }
    }

    pub fn tokens(&self) -> (Address, Address) {
        (self.token0, self.token1)
    }
}

/// Reserve snapshot of a V2 pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub pool_address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    pub observed_at_block: u64,
}

impl PoolState {
    /// Zero on either side means uninitialized
    pub fn is_live(&self) -> bool {
        !self.reserve0.is_zero() && !self.reserve1.is_zero()
    }

    pub fn contains(&self, token: Address) -> bool {
        self.token0 == token || self.token1 == token
    }

    pub fn other(&self, token: Address) -> Option<Address> {
        if token == self.token0 {
            Some(self.token1)
        } else if token == self.token1 {
            Some(self.token0)
        } else {
            None
        }
    }

    /// (reserve_in, reserve_out) when selling `token_in`
    pub fn reserves_for(&self, token_in: Address) -> Option<(U256, U256)> {
        if token_in == self.token0 {
            Some((self.reserve0, self.reserve1))
        } else if token_in == self.token1 {
            Some((self.reserve1, self.reserve0))
        } else {
            None
        }
    }

    pub fn amount_out(&self, token_in: Address, amount_in: U256) -> Option<U256> {
        let (reserve_in, reserve_out) = self.reserves_for(token_in)?;
        amm::get_amount_out(amount_in, reserve_in, reserve_out)
    }

    /// Reserves after `amount_in` of `token_in` is sold for `amount_out`
    pub fn after_trade(&self, token_in: Address, amount_in: U256, amount_out: U256) -> Option<Self> {
        let (reserve_in, reserve_out) = self.reserves_for(token_in)?;
        let new_in = reserve_in.checked_add(amount_in)?;
        let new_out = reserve_out.checked_sub(amount_out)?;
        let (reserve0, reserve1) = if token_in == self.token0 {
            (new_in, new_out)
        } else {
            (new_out, new_in)
        };

        Some(Self {
            reserve0,
            reserve1,
            ..self.clone()
        })
    }

    /// Apply an exact-input swap
    pub fn after_swap(&self, token_in: Address, amount_in: U256) -> Option<Self> {
        let amount_out = self.amount_out(token_in, amount_in)?;
        self.after_trade(token_in, amount_in, amount_out)
    }
}

/// MEV opportunity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opportunity {
    pub kind: OpportunityKind,
    pub trigger_tx_hash: H256,
    pub estimated_profit_wei: I256,
    pub required_capital_wei: U256,
    pub involved_pools: Vec<Address>,
    pub observed_at_block: u64,
}

/// Outcome of the financing check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinancingVerdict {
    pub profitable: bool,
    pub net_profit_wei: I256,
    pub fee_wei: U256,
    pub gas_cost_wei: U256,
}

/// Opportunity that passed every filter, handed to the execution side
#[derive(Debug, Clone)]
pub struct ScoredOpportunity {
    pub opportunity: Opportunity,
    pub verdict: FinancingVerdict,
    pub gas_price_wei: U256,
}
