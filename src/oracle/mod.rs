//! Pool state oracle
//!
//! Resolves V2 pair addresses through factory contracts and reads reserve
//! snapshots. Pair addresses are immutable, so they are cached per
//! `(factory, PoolKey)` and kept current by the factories' `PairCreated`
//! feeds. Reserves change every block and are never cached: every call reads
//! them fresh, pinned to a single block.

use dashmap::DashMap;
use ethers::types::{Address, U256};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::amm;
use crate::chain::{ChainClient, ChainFeed, SubscriptionHandle};
use crate::error::ChainError;
use crate::types::{PoolKey, PoolState};

#[derive(Default)]
pub struct OracleStats {
    pub lookups: AtomicU64,
    pub cache_hits: AtomicU64,
    pub missing_pools: AtomicU64,
    pub rpc_failures: AtomicU64,
    pub pairs_indexed: AtomicU64,
}

pub struct PoolOracle<C> {
    client: Arc<C>,
    /// First entry is the canonical factory
    factories: Vec<Address>,
    addresses: DashMap<(Address, PoolKey), Address>,
    stats: OracleStats,
}

impl<C: ChainClient> PoolOracle<C> {
    pub fn new(client: Arc<C>, factories: Vec<Address>) -> Self {
        Self {
            client,
            factories,
            addresses: DashMap::new(),
            stats: OracleStats::default(),
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn factories(&self) -> &[Address] {
        &self.factories
    }

    pub fn canonical_factory(&self) -> Option<Address> {
        self.factories.first().copied()
    }

    pub fn stats(&self) -> &OracleStats {
        &self.stats
    }

    pub fn cached_pools(&self) -> usize {
        self.addresses.len()
    }

    pub fn cached(&self, factory: Address, token_a: Address, token_b: Address) -> Option<Address> {
        self.addresses
            .get(&(factory, PoolKey::new(token_a, token_b)))
            .map(|entry| *entry.value())
    }

    /// Pair address on the canonical factory
    pub async fn resolve_pool(&self, token_a: Address, token_b: Address) -> Option<Address> {
        let factory = self.canonical_factory()?;
        self.resolve_pool_on(factory, token_a, token_b).await
    }

    /// Pair address on `factory`; the zero address sentinel maps to `None`.
    /// Misses are not cached, a pair can be created at any block.
    pub async fn resolve_pool_on(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Option<Address> {
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);
        let key = (factory, PoolKey::new(token_a, token_b));
        if let Some(pool) = self.addresses.get(&key) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Some(*pool.value());
        }

        let pool = match self.client.get_pair(factory, token_a, token_b).await {
            Ok(pool) => pool,
            Err(err) => {
                self.record_rpc_failure(&err);
                warn!(?factory, ?token_a, ?token_b, %err, "getPair failed");
                return None;
            }
        };

        if pool.is_zero() {
            self.stats.missing_pools.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.addresses.insert(key, pool);
        Some(pool)
    }

    /// Every configured factory's pair for the token pair, in factory order
    pub async fn pools_for_pair(&self, token_a: Address, token_b: Address) -> Vec<(Address, Address)> {
        let lookups = self.factories.iter().map(|&factory| async move {
            self.resolve_pool_on(factory, token_a, token_b)
                .await
                .map(|pool| (factory, pool))
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }

    /// Reserves at the current head
    pub async fn get_reserves(&self, pool: Address) -> Option<PoolState> {
        let block = match self.client.block_number().await {
            Ok(block) => block,
            Err(err) => {
                self.record_rpc_failure(&err);
                warn!(%err, "block number lookup failed");
                return None;
            }
        };
        self.get_reserves_at(pool, block).await
    }

    /// Reserves and token ordering read together at `block`. Uninitialized
    /// pairs (either reserve zero) are reported as absent.
    pub async fn get_reserves_at(&self, pool: Address, block: u64) -> Option<PoolState> {
        let snapshot = match self.client.pair_snapshot(pool, block).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.record_rpc_failure(&err);
                warn!(?pool, block, %err, "reserve read failed");
                return None;
            }
        };

        let state = PoolState {
            pool_address: pool,
            token0: snapshot.token0,
            token1: snapshot.token1,
            reserve0: snapshot.reserve0,
            reserve1: snapshot.reserve1,
            observed_at_block: snapshot.block,
        };

        if !state.is_live() {
            debug!(?pool, "pair has zero reserves");
            self.stats.missing_pools.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        Some(state)
    }

    /// Price `amount_in` of `token_in` through the canonical pair
    pub async fn quote(&self, token_in: Address, token_out: Address, amount_in: U256) -> Option<U256> {
        let pool = self.resolve_pool(token_in, token_out).await?;
        let state = self.get_reserves(pool).await?;
        let (reserve_in, reserve_out) = state.reserves_for(token_in)?;
        amm::get_amount_out(amount_in, reserve_in, reserve_out)
    }

    /// Index a pair announced by a factory
    pub fn on_pair_created(&self, factory: Address, token0: Address, token1: Address, pool: Address) {
        if pool.is_zero() {
            return;
        }
        let previous = self.addresses.insert((factory, PoolKey::new(token0, token1)), pool);
        if previous.is_none() {
            self.stats.pairs_indexed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("oracle_pairs_indexed_total").increment(1);
            info!(?token0, ?token1, ?pool, "New pair created");
        }
    }

    fn record_rpc_failure(&self, err: &ChainError) {
        self.stats.rpc_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("oracle_rpc_failures_total").increment(1);
        debug!(%err, "oracle rpc failure");
    }
}

impl<C: ChainClient> PoolOracle<C> {
    /// Subscribe to `PairCreated` on every configured factory and keep the
    /// address cache current in the background. Factories whose feed cannot
    /// be opened are skipped with a warning.
    pub async fn watch_pair_creation<F: ChainFeed + ?Sized>(
        self: &Arc<Self>,
        feed: &F,
        buffer: usize,
    ) -> Vec<SubscriptionHandle> {
        let mut handles = Vec::with_capacity(self.factories.len());

        for &factory in &self.factories {
            let subscription = match feed.subscribe_pair_created(factory, buffer).await {
                Ok(subscription) => subscription,
                Err(err) => {
                    warn!(?factory, %err, "PairCreated feed unavailable");
                    continue;
                }
            };
            info!(?factory, "Watching pair creation");
            handles.push(subscription.handle());

            let oracle = Arc::clone(self);
            let (mut rx, _) = subscription.into_parts();
            tokio::spawn(async move {
                while let Some(created) = rx.recv().await {
                    oracle.on_pair_created(created.factory, created.token0, created.token1, created.pair);
                }
                debug!(?factory, "pair creation watcher finished");
            });
        }

        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::chain::PairCreated;
    use std::time::Duration;

    const ETH: u128 = 1_000_000_000_000_000_000;

    fn factory() -> Address {
        Address::repeat_byte(0xf1)
    }
    fn weth() -> Address {
        Address::repeat_byte(0x0e)
    }
    fn usdc() -> Address {
        Address::repeat_byte(0x0c)
    }
    fn pair() -> Address {
        Address::repeat_byte(0xb1)
    }

    fn oracle(chain: MockChain) -> PoolOracle<MockChain> {
        PoolOracle::new(Arc::new(chain), vec![factory()])
    }

    #[tokio::test]
    async fn test_resolve_caches_address() {
        let chain = MockChain::new();
        chain.add_pair(factory(), pair(), weth(), usdc(), 10 * ETH, 20_000 * ETH);
        let oracle = oracle(chain);

        assert_eq!(oracle.resolve_pool(weth(), usdc()).await, Some(pair()));
        assert_eq!(oracle.resolve_pool(usdc(), weth()).await, Some(pair()));
        assert_eq!(oracle.client().get_pair_calls.load(Ordering::SeqCst), 1);
        assert_eq!(oracle.stats().cache_hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_missing_pair_is_none_and_not_cached() {
        let oracle = oracle(MockChain::new());
        assert_eq!(oracle.resolve_pool(weth(), usdc()).await, None);
        assert_eq!(oracle.resolve_pool(weth(), usdc()).await, None);
        assert_eq!(oracle.client().get_pair_calls.load(Ordering::SeqCst), 2);
        assert_eq!(oracle.cached_pools(), 0);
    }

    #[tokio::test]
    async fn test_reserves_read_fresh() {
        let chain = MockChain::new();
        chain.add_pair(factory(), pair(), weth(), usdc(), 10 * ETH, 20_000 * ETH);
        let oracle = oracle(chain);

        let state = oracle.get_reserves(pair()).await.unwrap();
        assert_eq!(state.observed_at_block, 100);
        assert_eq!(state.reserves_for(weth()), Some((U256::from(10 * ETH), U256::from(20_000 * ETH))));

        oracle.client().add_pair(factory(), pair(), weth(), usdc(), 11 * ETH, 19_000 * ETH);
        oracle.client().block.store(101, Ordering::SeqCst);
        let state = oracle.get_reserves(pair()).await.unwrap();
        assert_eq!(state.observed_at_block, 101);
        assert_eq!(state.reserves_for(weth()), Some((U256::from(11 * ETH), U256::from(19_000 * ETH))));
    }

    #[tokio::test]
    async fn test_zero_reserves_are_no_pool() {
        let chain = MockChain::new();
        chain.add_pair(factory(), pair(), weth(), usdc(), 0, 20_000 * ETH);
        let oracle = oracle(chain);

        assert_eq!(oracle.get_reserves(pair()).await, None);
        assert_eq!(oracle.quote(weth(), usdc(), U256::from(ETH)).await, None);
    }

    #[tokio::test]
    async fn test_rpc_failure_is_counted_not_raised() {
        let chain = MockChain::new();
        chain.add_pair(factory(), pair(), weth(), usdc(), 10 * ETH, 20_000 * ETH);
        chain.failing.lock().insert(pair());
        let oracle = oracle(chain);

        assert_eq!(oracle.get_reserves(pair()).await, None);
        assert_eq!(oracle.stats().rpc_failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_quote_uses_exact_formula() {
        let chain = MockChain::new();
        chain.add_pair(factory(), pair(), weth(), usdc(), 1000, 1000);
        let oracle = oracle(chain);

        assert_eq!(oracle.quote(weth(), usdc(), U256::from(100)).await, Some(U256::from(90)));
    }

    #[tokio::test]
    async fn test_pair_created_feeds_cache() {
        let oracle = Arc::new(oracle(MockChain::new()));
        let handles = oracle.watch_pair_creation(oracle.client().as_ref(), 16).await;
        assert_eq!(handles.len(), 1);

        oracle.client().push_pair_created(PairCreated {
            factory: factory(),
            token0: usdc(),
            token1: weth(),
            pair: pair(),
        });

        let indexed = tokio::time::timeout(Duration::from_secs(1), async {
            while oracle.cached(factory(), weth(), usdc()).is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(indexed.is_ok());

        assert_eq!(oracle.resolve_pool(weth(), usdc()).await, Some(pair()));
        assert_eq!(oracle.client().get_pair_calls.load(Ordering::SeqCst), 0);
        assert!(handles[0].cancel());
    }

    #[tokio::test]
    async fn test_watch_without_feed_is_noop() {
        let oracle = Arc::new(oracle(MockChain::without_subscriptions()));
        let handles = oracle.watch_pair_creation(oracle.client().as_ref(), 16).await;
        assert!(handles.is_empty());
    }
}
