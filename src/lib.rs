//! MEV Sentinel
//!
//! Mempool opportunity detection for Uniswap-V2-style pools.
//!
//! ## Architecture
//! - Mempool: pending-hash subscription feeding a time-windowed working set
//! - Classifier: router selector table + ABI decoding of swap calldata
//! - Oracle: factory pair resolution and block-pinned reserve snapshots
//! - Detector: arbitrage and sandwich scoring with exact V2 math
//! - Financing: flash-loan fee + gas go/no-go verdict

pub mod amm;
pub mod bench;
pub mod chain;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod financing;
pub mod logging;
pub mod mempool;
pub mod oracle;
pub mod types;

pub use bench::run_all_benchmarks;
pub use chain::{ChainClient, ChainFeed, EthersChain};
pub use config::Config;
pub use detector::{OpportunityScorer, ScorerConfig};
pub use financing::FinancingModel;
pub use mempool::{MempoolConfig, MempoolMonitor};
pub use oracle::PoolOracle;
pub use types::{FinancingVerdict, Opportunity, PendingTransaction, ScoredOpportunity};

use ethers::types::{I256, U256};
use ethers::utils::format_units;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock, Semaphore};
use tracing::{debug, info, warn};

use chain::SubscriptionHandle;
use classifier::Classification;

/// Pipeline counters
#[derive(Default)]
struct Counters {
    txs_seen: AtomicU64,
    swaps_classified: AtomicU64,
    swaps_unparsed: AtomicU64,
    gas_rejected: AtomicU64,
    opportunities_scored: AtomicU64,
    below_threshold: AtomicU64,
    opportunities_forwarded: AtomicU64,
    forward_dropped: AtomicU64,
}

/// Engine wires monitor → classifier → scorer → financing
pub struct Engine<C> {
    config: Arc<Config>,
    client: Arc<C>,
    monitor: Arc<MempoolMonitor<C>>,
    oracle: Arc<PoolOracle<C>>,
    scorer: Arc<OpportunityScorer>,
    financing: FinancingModel,
    workers: Arc<Semaphore>,
    counters: Arc<Counters>,
    running: Arc<RwLock<bool>>,
    handles: Arc<Mutex<Vec<SubscriptionHandle>>>,
    started_at: Instant,
}

impl<C> Clone for Engine<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            client: Arc::clone(&self.client),
            monitor: Arc::clone(&self.monitor),
            oracle: Arc::clone(&self.oracle),
            scorer: Arc::clone(&self.scorer),
            financing: self.financing,
            workers: Arc::clone(&self.workers),
            counters: Arc::clone(&self.counters),
            running: Arc::clone(&self.running),
            handles: Arc::clone(&self.handles),
            started_at: self.started_at,
        }
    }
}

impl<C: ChainClient + ChainFeed> Engine<C> {
    pub fn new(config: Config, client: Arc<C>) -> Self {
        let monitor = MempoolMonitor::new(Arc::clone(&client), MempoolConfig::from_config(&config));
        let oracle = PoolOracle::new(Arc::clone(&client), config.factories());
        let scorer = OpportunityScorer::new(ScorerConfig::from_config(&config));
        let financing = FinancingModel::from(&config.financing);
        let workers = Semaphore::new(config.performance.scoring_workers.max(1));

        Self {
            config: Arc::new(config),
            client,
            monitor: Arc::new(monitor),
            oracle: Arc::new(oracle),
            scorer: Arc::new(scorer),
            financing,
            workers: Arc::new(workers),
            counters: Arc::new(Counters::default()),
            running: Arc::new(RwLock::new(false)),
            handles: Arc::new(Mutex::new(Vec::new())),
            started_at: Instant::now(),
        }
    }

    /// Start pair-creation watchers, the mempool monitor and the dispatch
    /// loop. Accepted opportunities are sent to `out`.
    ///
    /// Feeds that cannot be opened are logged and skipped; every handle
    /// taken here is released by `stop`.
    pub async fn start(&self, out: mpsc::Sender<ScoredOpportunity>) {
        {
            let mut running = self.running.write().await;
            if *running {
                return;
            }
            *running = true;
        }
        info!("Starting MEV Sentinel...");

        let watchers = self
            .oracle
            .watch_pair_creation(self.client.as_ref(), self.config.performance.channel_size)
            .await;
        self.handles.lock().extend(watchers);

        let (tx_sender, mut tx_receiver) = mpsc::channel(self.config.performance.channel_size);
        if !self.monitor.start(self.client.as_ref(), tx_sender).await {
            warn!("⚠️ Mempool feed idle, only pair-creation watchers are active");
        }

        let engine = self.clone();
        let dispatch = tokio::spawn(async move {
            while let Some(tx) = tx_receiver.recv().await {
                engine.dispatch(tx, out.clone()).await;
            }
            debug!("dispatch loop finished");
        });
        self.handles.lock().push(SubscriptionHandle::new(dispatch.abort_handle()));

        info!("MEV Sentinel started");
    }

    /// Hand one transaction to a scoring worker, waiting for a free slot
    async fn dispatch(&self, tx: PendingTransaction, out: mpsc::Sender<ScoredOpportunity>) {
        let permit = match Arc::clone(&self.workers).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let engine = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Some(scored) = engine.evaluate(&tx).await {
                engine.forward(scored, &out);
            }
        });
    }

    /// Full per-transaction pass: gas ceiling, classification, scoring,
    /// financing and the minimum-profit threshold
    pub async fn evaluate(&self, tx: &PendingTransaction) -> Option<ScoredOpportunity> {
        self.counters.txs_seen.fetch_add(1, Ordering::Relaxed);

        if tx.gas_price_wei > self.config.max_gas_price_wei() {
            self.counters.gas_rejected.fetch_add(1, Ordering::Relaxed);
            debug!(hash = ?tx.hash, gas_price = %tx.gas_price_wei, "above gas ceiling");
            return None;
        }

        let swap = match classifier::decode(tx) {
            Classification::Swap(swap) => swap,
            Classification::Unparsed { method, error } => {
                self.counters.swaps_unparsed.fetch_add(1, Ordering::Relaxed);
                debug!(hash = ?tx.hash, %method, %error, "swap calldata not decodable");
                return None;
            }
            Classification::NotSwap => return None,
        };
        self.counters.swaps_classified.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("engine_swaps_classified_total").increment(1);

        let opportunity = self.scorer.score(&swap, &self.oracle).await?;
        self.counters.opportunities_scored.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("engine_opportunities_total", "kind" => opportunity.kind.label()).increment(1);

        let verdict = self
            .financing
            .evaluate(&opportunity, opportunity.required_capital_wei, tx.gas_price_wei);

        if !verdict.profitable || verdict.net_profit_wei < self.min_profit() {
            self.counters.below_threshold.fetch_add(1, Ordering::Relaxed);
            debug!(
                hash = ?tx.hash,
                kind = opportunity.kind.label(),
                net = %verdict.net_profit_wei,
                "below profit threshold"
            );
            return None;
        }

        info!(
            "💰 {} | trigger: {:?} | gross: {} ETH | net: {} ETH | fee: {} ETH | gas: {} ETH",
            opportunity.kind.label(),
            opportunity.trigger_tx_hash,
            eth(opportunity.estimated_profit_wei),
            eth(verdict.net_profit_wei),
            eth(verdict.fee_wei),
            eth(verdict.gas_cost_wei),
        );

        Some(ScoredOpportunity {
            opportunity,
            verdict,
            gas_price_wei: tx.gas_price_wei,
        })
    }

    fn forward(&self, scored: ScoredOpportunity, out: &mpsc::Sender<ScoredOpportunity>) {
        if out.try_send(scored).is_ok() {
            self.counters.opportunities_forwarded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.forward_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Opportunity channel full, dropping opportunity");
        }
    }

    fn min_profit(&self) -> I256 {
        I256::try_from(U256::from(self.config.strategy.min_profit_wei)).unwrap_or(I256::MAX)
    }

    /// Sandwich-sized swaps currently in the working set
    pub fn sandwich_sweep(&self) -> usize {
        self.scorer.sandwich_targets(&self.monitor.get_pending_txs()).len()
    }

    /// Stop the engine; safe to call more than once
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }
        info!("Stopping MEV Sentinel...");

        self.monitor.stop();
        for handle in self.handles.lock().drain(..) {
            handle.cancel();
        }
        info!("MEV Sentinel stopped");
    }

    /// Check if engine is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Get engine statistics
    pub fn stats(&self) -> EngineStats {
        let mempool = self.monitor.stats();
        let oracle = self.oracle.stats();
        EngineStats {
            hashes_received: mempool.hashes_received.load(Ordering::Relaxed),
            txs_tracked: mempool.txs_tracked.load(Ordering::Relaxed),
            working_set: self.monitor.working_set().len(),
            swaps_classified: self.counters.swaps_classified.load(Ordering::Relaxed),
            swaps_unparsed: self.counters.swaps_unparsed.load(Ordering::Relaxed),
            gas_rejected: self.counters.gas_rejected.load(Ordering::Relaxed),
            opportunities_detected: self.counters.opportunities_scored.load(Ordering::Relaxed),
            below_threshold: self.counters.below_threshold.load(Ordering::Relaxed),
            opportunities_forwarded: self.counters.opportunities_forwarded.load(Ordering::Relaxed),
            pools_cached: self.oracle.cached_pools(),
            rpc_failures: oracle.rpc_failures.load(Ordering::Relaxed),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }

    pub fn monitor(&self) -> &Arc<MempoolMonitor<C>> {
        &self.monitor
    }

    pub fn oracle(&self) -> &Arc<PoolOracle<C>> {
        &self.oracle
    }

    pub fn scorer(&self) -> &Arc<OpportunityScorer> {
        &self.scorer
    }

    /// Start, log a heartbeat every 10 s and stop on Ctrl-C
    pub async fn run(self, out: mpsc::Sender<ScoredOpportunity>) -> anyhow::Result<()> {
        self.start(out).await;
        info!("🚀 MEV SENTINEL STARTED | Scanning mempool for opportunities...");

        let mut heartbeat = tokio::time::interval(Duration::from_secs(10));
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let stats = self.stats();
                    info!(
                        "📊 Scanning | hashes: {} | tracked: {} | window: {} | swaps: {} | opportunities: {} | forwarded: {} | sandwich targets: {}",
                        stats.hashes_received,
                        stats.txs_tracked,
                        stats.working_set,
                        stats.swaps_classified,
                        stats.opportunities_detected,
                        stats.opportunities_forwarded,
                        self.sandwich_sweep(),
                    );
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("🛑 Shutdown signal received");
                    break;
                }
            }
        }

        self.stop().await;
        Ok(())
    }
}

fn eth<T: Into<ethers::utils::ParseUnits>>(value: T) -> String {
    format_units(value, "ether").unwrap_or_else(|_| "?".to_string())
}

/// Engine statistics
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub hashes_received: u64,
    pub txs_tracked: u64,
    pub working_set: usize,
    pub swaps_classified: u64,
    pub swaps_unparsed: u64,
    pub gas_rejected: u64,
    pub opportunities_detected: u64,
    pub below_threshold: u64,
    pub opportunities_forwarded: u64,
    pub pools_cached: usize,
    pub rpc_failures: u64,
    pub uptime_seconds: u64,
}
