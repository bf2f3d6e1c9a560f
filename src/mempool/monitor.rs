//! Pending transaction monitor
//! Hash feed → body lookup → router allowlist → working set

use ethers::types::{Address, H256};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::WorkingSet;
use crate::chain::{ChainClient, ChainFeed, SubscriptionHandle};
use crate::config::Config;
use crate::types::PendingTransaction;

/// Monitor config
#[derive(Clone, Debug)]
pub struct MempoolConfig {
    /// Working-set window
    pub window: Duration,
    /// Only transactions sent to these addresses are tracked
    pub routers: HashSet<Address>,
    /// Capacity of the hash feed channel
    pub channel_size: usize,
    /// Body lookups in flight at once
    pub lookup_concurrency: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
            routers: HashSet::new(),
            channel_size: 10_000,
            lookup_concurrency: 32,
        }
    }
}

impl MempoolConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window: Duration::from_secs(config.strategy.mempool_window_secs),
            routers: config.watched_routers(),
            channel_size: config.performance.channel_size,
            lookup_concurrency: config.performance.lookup_concurrency,
        }
    }
}

/// Statistics for performance monitoring
#[derive(Default)]
pub struct MempoolStats {
    pub hashes_received: AtomicU64,
    pub lookups_missed: AtomicU64,
    pub lookup_failures: AtomicU64,
    pub filtered_out: AtomicU64,
    pub txs_tracked: AtomicU64,
    pub forward_dropped: AtomicU64,
    pub max_lookup_ns: AtomicU64,
}

impl MempoolStats {
    /// Hashes fully handled, whatever the outcome
    pub fn processed(&self) -> u64 {
        self.lookups_missed.load(Ordering::Relaxed)
            + self.lookup_failures.load(Ordering::Relaxed)
            + self.filtered_out.load(Ordering::Relaxed)
            + self.txs_tracked.load(Ordering::Relaxed)
    }
}

/// Per-hash work shared by the concurrent lookups
struct Ingest<C> {
    client: Arc<C>,
    routers: HashSet<Address>,
    working_set: Arc<WorkingSet>,
    stats: Arc<MempoolStats>,
    out: mpsc::Sender<PendingTransaction>,
}

impl<C: ChainClient> Ingest<C> {
    async fn handle(&self, hash: H256) {
        self.stats.hashes_received.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let body = self.client.transaction(hash).await;
        let elapsed = started.elapsed().as_nanos() as u64;
        self.stats.max_lookup_ns.fetch_max(elapsed, Ordering::Relaxed);

        let tx = match body {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                // mined or dropped before we got to it
                self.stats.lookups_missed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(err) => {
                self.stats.lookup_failures.fetch_add(1, Ordering::Relaxed);
                debug!(?hash, %err, "pending tx lookup failed");
                return;
            }
        };

        if !tx.to.map_or(false, |to| self.routers.contains(&to)) {
            self.stats.filtered_out.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let now = Instant::now();
        let pending = PendingTransaction::from_rpc(tx, now);
        if !self.working_set.insert(pending.clone(), now) {
            // duplicate notification, already counted once
            self.stats.filtered_out.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.stats.txs_tracked.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("mempool_txs_tracked_total").increment(1);

        if self.out.try_send(pending).is_err() {
            self.stats.forward_dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("mempool_txs_forward_dropped_total").increment(1);
        }
    }
}

/// Mempool monitor
pub struct MempoolMonitor<C> {
    client: Arc<C>,
    config: MempoolConfig,
    working_set: Arc<WorkingSet>,
    running: Arc<AtomicBool>,
    stats: Arc<MempoolStats>,
    handles: Mutex<Vec<SubscriptionHandle>>,
}

impl<C: ChainClient> MempoolMonitor<C> {
    pub fn new(client: Arc<C>, config: MempoolConfig) -> Self {
        let working_set = Arc::new(WorkingSet::new(config.window));
        Self {
            client,
            config,
            working_set,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(MempoolStats::default()),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to pending hashes and start tracking in the background.
    /// Tracked transactions are also forwarded to `out`; a full channel drops
    /// the forward but keeps the entry in the working set.
    ///
    /// Returns whether the feed is live. A provider that cannot open the
    /// subscription, for any reason, leaves the monitor idle.
    pub async fn start<F: ChainFeed + ?Sized>(
        &self,
        feed: &F,
        out: mpsc::Sender<PendingTransaction>,
    ) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Mempool monitor already running");
            return true;
        }

        let subscription = match feed.subscribe_pending(self.config.channel_size).await {
            Ok(subscription) => subscription,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                warn!(%err, "⚠️ Pending-transaction subscription unavailable, mempool monitor idle");
                return false;
            }
        };
        info!(
            window_secs = self.config.window.as_secs(),
            routers = self.config.routers.len(),
            "Subscribed to pending transactions"
        );

        let ingest = Arc::new(Ingest {
            client: Arc::clone(&self.client),
            routers: self.config.routers.clone(),
            working_set: Arc::clone(&self.working_set),
            stats: Arc::clone(&self.stats),
            out,
        });
        let concurrency = self.config.lookup_concurrency.max(1);
        let (rx, feed_handle) = subscription.into_parts();

        let task = tokio::spawn(async move {
            ReceiverStream::new(rx)
                .for_each_concurrent(concurrency, |hash| {
                    let ingest = Arc::clone(&ingest);
                    async move { ingest.handle(hash).await }
                })
                .await;
            debug!("pending hash feed ended");
        });

        let mut handles = self.handles.lock();
        handles.push(feed_handle);
        handles.push(SubscriptionHandle::new(task.abort_handle()));
        true
    }

    /// Visible working-set entries in arrival order
    pub fn get_pending_txs(&self) -> Vec<PendingTransaction> {
        self.working_set.snapshot(Instant::now())
    }

    /// Cancel the feed without waiting for lookups in flight. Safe to call
    /// more than once; the working set stays readable.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        for handle in self.handles.lock().drain(..) {
            handle.cancel();
        }
        info!("Mempool monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn working_set(&self) -> &Arc<WorkingSet> {
        &self.working_set
    }

    pub fn stats(&self) -> &MempoolStats {
        &self.stats
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }
}
