//! Opportunity scoring

mod arbitrage;
mod sandwich;

pub use arbitrage::{apply_victim, best_arbitrage, round_trip, ArbitrageCandidate};
pub use sandwich::{estimate_sandwich, trade_value_wei, SandwichCandidate};

use ethers::types::{Address, I256, U256};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::chain::ChainClient;
use crate::classifier;
use crate::config::Config;
use crate::oracle::PoolOracle;
use crate::types::{ClassifiedSwap, Opportunity, OpportunityKind, PendingTransaction, PoolState};

/// Scorer settings
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Wrapped native token; profits are denominated in it
    pub weth: Address,
    /// Swaps larger than this (in wei) are sandwich targets
    pub sandwich_threshold_wei: U256,
    /// Snapshots older than head minus this are rejected
    pub max_block_lag: u64,
    /// Router → factory of the pool the router trades on
    pub router_factories: HashMap<Address, Address>,
}

impl ScorerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            weth: config.chain.weth,
            sandwich_threshold_wei: U256::from(config.strategy.sandwich_threshold_wei),
            max_block_lag: config.strategy.max_block_lag,
            router_factories: config
                .dexes
                .iter()
                .map(|dex| (dex.router, dex.factory))
                .collect(),
        }
    }
}

/// Scores classified swaps against live pool state
pub struct OpportunityScorer {
    config: ScorerConfig,
    count: AtomicU64,
}

impl OpportunityScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self {
            config,
            count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Coarse size filter, strictly above the threshold
    pub fn is_sandwich_target(&self, swap: &ClassifiedSwap) -> bool {
        trade_value_wei(swap, self.config.weth)
            .map_or(false, |value| value > self.config.sandwich_threshold_wei)
    }

    /// Sandwich-sized swaps among a working-set snapshot
    pub fn sandwich_targets(&self, txs: &[PendingTransaction]) -> Vec<ClassifiedSwap> {
        txs.iter()
            .filter_map(classifier::classify)
            .filter(|swap| self.is_sandwich_target(swap))
            .collect()
    }

    /// Best opportunity created by `swap`, or `None`.
    ///
    /// Reads the head block once and every pool of the pair pinned to it.
    /// Returns `None` for multi-hop paths, pairs without WETH, unknown
    /// routers, missing or stale pools, and non-positive profit.
    pub async fn score<C: ChainClient>(
        &self,
        swap: &ClassifiedSwap,
        oracle: &PoolOracle<C>,
    ) -> Option<Opportunity> {
        if swap.path.len() != 2 {
            return None;
        }
        let (token_a, token_b) = (swap.token_in(), swap.token_out());
        if token_a != self.config.weth && token_b != self.config.weth {
            return None;
        }
        let victim_factory = *self.config.router_factories.get(&swap.router)?;

        let head = match oracle.client().block_number().await {
            Ok(head) => head,
            Err(err) => {
                debug!(%err, "head lookup failed, skipping swap");
                return None;
            }
        };

        let pools = oracle.pools_for_pair(token_a, token_b).await;
        let reads = pools.iter().map(|&(factory, pool)| async move {
            oracle.get_reserves_at(pool, head).await.map(|state| (factory, state))
        });
        let states: Vec<(Address, PoolState)> = join_all(reads)
            .await
            .into_iter()
            .flatten()
            .filter(|(_, state)| self.is_usable(state, head, token_a, token_b))
            .collect();

        let (_, victim) = states.iter().find(|(factory, _)| *factory == victim_factory)?;
        let alternates: Vec<PoolState> = states
            .iter()
            .filter(|(factory, _)| *factory != victim_factory)
            .map(|(_, state)| state.clone())
            .collect();

        let arbitrage = self.score_arbitrage(swap, victim, &alternates);
        let sandwich = self.score_sandwich(swap, victim);

        let best = match (arbitrage, sandwich) {
            (Some(a), Some(s)) => Some(if s.estimated_profit_wei > a.estimated_profit_wei { s } else { a }),
            (a, s) => a.or(s),
        }?;

        self.count.fetch_add(1, Ordering::Relaxed);
        Some(best)
    }

    /// Round trip against the alternates on the victim's post-trade reserves
    pub fn score_arbitrage(
        &self,
        swap: &ClassifiedSwap,
        victim: &PoolState,
        alternates: &[PoolState],
    ) -> Option<Opportunity> {
        if alternates.is_empty() {
            return None;
        }
        let victim_after = apply_victim(victim, swap)?;
        let best = best_arbitrage(&victim_after, alternates, self.config.weth)?;

        Some(Opportunity {
            kind: OpportunityKind::Arbitrage,
            trigger_tx_hash: swap.source_hash,
            estimated_profit_wei: to_signed(best.profit)?,
            required_capital_wei: best.input,
            involved_pools: vec![best.buy_pool, best.sell_pool],
            observed_at_block: victim.observed_at_block,
        })
    }

    pub fn score_sandwich(&self, swap: &ClassifiedSwap, victim: &PoolState) -> Option<Opportunity> {
        if !self.is_sandwich_target(swap) {
            return None;
        }
        let candidate = estimate_sandwich(victim, swap, self.config.weth)?;

        Some(Opportunity {
            kind: OpportunityKind::Sandwich,
            trigger_tx_hash: swap.source_hash,
            estimated_profit_wei: to_signed(candidate.profit)?,
            required_capital_wei: candidate.front_run_in,
            involved_pools: vec![candidate.pool],
            observed_at_block: victim.observed_at_block,
        })
    }

    /// Opportunities produced so far
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn is_usable(&self, state: &PoolState, head: u64, token_a: Address, token_b: Address) -> bool {
        if state.observed_at_block.saturating_add(self.config.max_block_lag) < head {
            debug!(pool = ?state.pool_address, block = state.observed_at_block, head, "stale snapshot");
            return false;
        }
        state.contains(token_a) && state.contains(token_b)
    }
}

fn to_signed(value: U256) -> Option<I256> {
    I256::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::types::SwapMethod;
    use ethers::types::H256;
    use std::sync::Arc;

    const ETH: u128 = 1_000_000_000_000_000_000;

    fn weth() -> Address {
        Address::repeat_byte(0x0e)
    }
    fn dai() -> Address {
        Address::repeat_byte(0xda)
    }
    fn uni_router() -> Address {
        Address::repeat_byte(0x7a)
    }
    fn uni_factory() -> Address {
        Address::repeat_byte(0xf1)
    }
    fn sushi_router() -> Address {
        Address::repeat_byte(0x7b)
    }
    fn sushi_factory() -> Address {
        Address::repeat_byte(0xf2)
    }
    fn third_factory() -> Address {
        Address::repeat_byte(0xf3)
    }

    fn scorer() -> OpportunityScorer {
        OpportunityScorer::new(ScorerConfig {
            weth: weth(),
            sandwich_threshold_wei: U256::from(ETH),
            max_block_lag: 2,
            router_factories: HashMap::from([
                (uni_router(), uni_factory()),
                (sushi_router(), sushi_factory()),
            ]),
        })
    }

    fn oracle(chain: MockChain) -> PoolOracle<MockChain> {
        PoolOracle::new(
            Arc::new(chain),
            vec![uni_factory(), sushi_factory(), third_factory()],
        )
    }

    fn buy(amount_in: u128, amount_out_min: u128) -> ClassifiedSwap {
        ClassifiedSwap {
            source_hash: H256::repeat_byte(0x42),
            router: uni_router(),
            method: SwapMethod::SwapExactEthForTokens,
            path: vec![weth(), dai()],
            amount_in: U256::from(amount_in),
            amount_out_min: U256::from(amount_out_min),
            deadline: U256::MAX,
            value_wei: U256::from(amount_in),
        }
    }

    #[test]
    fn test_sandwich_threshold_is_strict() {
        let scorer = scorer();
        assert!(!scorer.is_sandwich_target(&buy(ETH, 0)));
        assert!(scorer.is_sandwich_target(&buy(ETH + 1, 0)));
    }

    #[tokio::test]
    async fn test_no_alternate_pool_means_no_arbitrage() {
        let chain = MockChain::new();
        chain.add_pair(uni_factory(), Address::repeat_byte(0xb1), weth(), dai(), 100 * ETH, 200_000 * ETH);
        let oracle = oracle(chain);

        // below the sandwich threshold, so only arbitrage could score
        assert_eq!(scorer().score(&buy(ETH / 2, 0), &oracle).await, None);
    }

    #[tokio::test]
    async fn test_multi_hop_is_not_scored() {
        let chain = MockChain::new();
        chain.add_pair(uni_factory(), Address::repeat_byte(0xb1), weth(), dai(), 100 * ETH, 200_000 * ETH);
        chain.add_pair(sushi_factory(), Address::repeat_byte(0xb2), weth(), dai(), 100 * ETH, 200_000 * ETH);
        let oracle = oracle(chain);

        let mut swap = buy(10 * ETH, 0);
        swap.path.push(Address::repeat_byte(0x55));
        assert_eq!(scorer().score(&swap, &oracle).await, None);
    }

    #[tokio::test]
    async fn test_arbitrage_against_best_alternate() {
        let chain = MockChain::new();
        chain.add_pair(uni_factory(), Address::repeat_byte(0xb1), weth(), dai(), 100 * ETH, 200_000 * ETH);
        chain.add_pair(sushi_factory(), Address::repeat_byte(0xb2), weth(), dai(), 10 * ETH, 20_000 * ETH);
        chain.add_pair(third_factory(), Address::repeat_byte(0xb3), weth(), dai(), 1_000 * ETH, 2_000_000 * ETH);
        let oracle = oracle(chain);

        // tight slippage keeps the sandwich out of the picture
        let quoted = U256::from(200_000 * ETH) * U256::from(10 * ETH) * U256::from(997u64)
            / (U256::from(100 * ETH) * U256::from(1000u64) + U256::from(10 * ETH) * U256::from(997u64));
        let swap = buy(10 * ETH, quoted.as_u128());

        let opportunity = scorer().score(&swap, &oracle).await.unwrap();
        assert_eq!(opportunity.kind, OpportunityKind::Arbitrage);
        assert_eq!(opportunity.trigger_tx_hash, swap.source_hash);
        assert_eq!(
            opportunity.involved_pools,
            vec![Address::repeat_byte(0xb3), Address::repeat_byte(0xb1)]
        );
        assert!(opportunity.estimated_profit_wei > I256::zero());
        assert_eq!(opportunity.observed_at_block, 100);
    }

    #[tokio::test]
    async fn test_zero_reserve_pool_scores_none() {
        let chain = MockChain::new();
        chain.add_pair(uni_factory(), Address::repeat_byte(0xb1), weth(), dai(), 0, 0);
        chain.add_pair(sushi_factory(), Address::repeat_byte(0xb2), weth(), dai(), 10 * ETH, 20_000 * ETH);
        let oracle = oracle(chain);

        assert_eq!(scorer().score(&buy(10 * ETH, 0), &oracle).await, None);
    }

    #[tokio::test]
    async fn test_unknown_router_is_skipped() {
        let chain = MockChain::new();
        chain.add_pair(uni_factory(), Address::repeat_byte(0xb1), weth(), dai(), 100 * ETH, 200_000 * ETH);
        chain.add_pair(sushi_factory(), Address::repeat_byte(0xb2), weth(), dai(), 100 * ETH, 100_000 * ETH);
        let oracle = oracle(chain);

        let mut swap = buy(10 * ETH, 0);
        swap.router = Address::repeat_byte(0x99);
        assert_eq!(scorer().score(&swap, &oracle).await, None);
    }

    #[tokio::test]
    async fn test_loose_slippage_scores_sandwich() {
        let chain = MockChain::new();
        chain.add_pair(uni_factory(), Address::repeat_byte(0xb1), weth(), dai(), 100 * ETH, 200_000 * ETH);
        let oracle = oracle(chain);

        let opportunity = scorer().score(&buy(10 * ETH, 0), &oracle).await.unwrap();
        assert_eq!(opportunity.kind, OpportunityKind::Sandwich);
        assert_eq!(opportunity.involved_pools, vec![Address::repeat_byte(0xb1)]);
        assert!(opportunity.required_capital_wei > U256::zero());
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        let scorer = scorer();
        let state = PoolState {
            pool_address: Address::repeat_byte(0xb1),
            token0: weth(),
            token1: dai(),
            reserve0: U256::from(ETH),
            reserve1: U256::from(ETH),
            observed_at_block: 97,
        };
        assert!(!scorer.is_usable(&state, 100, weth(), dai()));
        assert!(scorer.is_usable(&state, 99, weth(), dai()));
    }

    #[test]
    fn test_sandwich_targets_from_snapshot() {
        use crate::classifier::tests::{calldata, pending};

        let data = calldata(SwapMethod::SwapExactEthForTokens, 1, 0, &[weth(), dai()]);
        let large = pending(data.clone(), 2_000_000_000_000_000_000);
        let small = pending(data, 1_000);
        let noise = pending(vec![0xde, 0xad, 0xbe, 0xef], 5_000_000_000_000_000_000);

        let targets = scorer().sandwich_targets(&[large, small, noise]);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].value_wei, U256::from(2_000_000_000_000_000_000u64));
    }
}
