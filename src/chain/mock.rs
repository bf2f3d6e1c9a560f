// In-memory chain used by unit tests

use async_trait::async_trait;
use ethers::types::{Address, Bytes, Transaction, H256, U256};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::mpsc;

use super::{ChainClient, ChainFeed, PairCreated, PairSnapshot, Subscription, SubscriptionHandle};
use crate::error::ChainError;
use crate::types::PoolKey;

pub(crate) struct MockChain {
    pub block: AtomicU64,
    pub txs: Mutex<HashMap<H256, Transaction>>,
    pub pairs: Mutex<HashMap<(Address, PoolKey), Address>>,
    pub reserves: Mutex<HashMap<Address, (Address, Address, U256, U256)>>,
    pub failing: Mutex<HashSet<Address>>,
    pub get_pair_calls: AtomicUsize,
    pub subscriptions: bool,
    pending_error: Mutex<Option<ChainError>>,
    pending_tx: mpsc::UnboundedSender<H256>,
    pending_rx: Mutex<Option<mpsc::UnboundedReceiver<H256>>>,
    created_tx: mpsc::UnboundedSender<PairCreated>,
    created_rx: Mutex<Option<mpsc::UnboundedReceiver<PairCreated>>>,
}

impl MockChain {
    pub fn new() -> Self {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        let (created_tx, created_rx) = mpsc::unbounded_channel();
        Self {
            block: AtomicU64::new(100),
            txs: Mutex::new(HashMap::new()),
            pairs: Mutex::new(HashMap::new()),
            reserves: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            get_pair_calls: AtomicUsize::new(0),
            subscriptions: true,
            pending_error: Mutex::new(None),
            pending_tx,
            pending_rx: Mutex::new(Some(pending_rx)),
            created_tx,
            created_rx: Mutex::new(Some(created_rx)),
        }
    }

    pub fn without_subscriptions() -> Self {
        Self {
            subscriptions: false,
            ..Self::new()
        }
    }

    /// Pair feeds work; the pending feed fails once with `err`
    pub fn rejecting_pending(err: ChainError) -> Self {
        Self {
            pending_error: Mutex::new(Some(err)),
            ..Self::new()
        }
    }

    pub fn add_tx(&self, hash: H256, to: Address, value: U256, input: Vec<u8>) {
        let tx = Transaction {
            hash,
            from: Address::repeat_byte(0xee),
            to: Some(to),
            value,
            gas_price: Some(U256::from(30_000_000_000u64)),
            input: Bytes::from(input),
            ..Default::default()
        };
        self.txs.lock().insert(hash, tx);
    }

    /// Registers the pair with `factory` and sets its reserves
    pub fn add_pair(
        &self,
        factory: Address,
        pair: Address,
        token_a: Address,
        token_b: Address,
        reserve_a: u128,
        reserve_b: u128,
    ) {
        let key = PoolKey::new(token_a, token_b);
        let (token0, token1) = key.tokens();
        let (reserve0, reserve1) = if token0 == token_a {
            (reserve_a, reserve_b)
        } else {
            (reserve_b, reserve_a)
        };
        self.pairs.lock().insert((factory, key), pair);
        self.reserves
            .lock()
            .insert(pair, (token0, token1, U256::from(reserve0), U256::from(reserve1)));
    }

    pub fn push_pending(&self, hash: H256) {
        let _ = self.pending_tx.send(hash);
    }

    pub fn push_pair_created(&self, created: PairCreated) {
        let _ = self.created_tx.send(created);
    }

    fn forward<T: Send + 'static>(
        source: &Mutex<Option<mpsc::UnboundedReceiver<T>>>,
        buffer: usize,
    ) -> Result<Subscription<T>, ChainError> {
        let mut source = source.lock().take().ok_or(ChainError::SubscriptionClosed)?;
        let (tx, rx) = mpsc::channel(buffer);
        let task = tokio::spawn(async move {
            while let Some(item) = source.recv().await {
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });
        Ok(Subscription::new(rx, SubscriptionHandle::new(task.abort_handle())))
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.block.load(Ordering::SeqCst))
    }

    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError> {
        Ok(self.txs.lock().get(&hash).cloned())
    }

    async fn get_pair(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address, ChainError> {
        self.get_pair_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(&factory) {
            return Err(ChainError::Contract("mock getPair failure".into()));
        }
        Ok(self
            .pairs
            .lock()
            .get(&(factory, PoolKey::new(token_a, token_b)))
            .copied()
            .unwrap_or_else(Address::zero))
    }

    async fn pair_snapshot(&self, pair: Address, block: u64) -> Result<PairSnapshot, ChainError> {
        if self.failing.lock().contains(&pair) {
            return Err(ChainError::Contract("mock getReserves failure".into()));
        }
        let (token0, token1, reserve0, reserve1) = self
            .reserves
            .lock()
            .get(&pair)
            .copied()
            .ok_or_else(|| ChainError::Contract("no code at address".into()))?;
        Ok(PairSnapshot {
            token0,
            token1,
            reserve0,
            reserve1,
            block,
        })
    }
}

#[async_trait]
impl ChainFeed for MockChain {
    async fn subscribe_pending(&self, buffer: usize) -> Result<Subscription<H256>, ChainError> {
        if !self.subscriptions {
            return Err(ChainError::SubscriptionUnavailable);
        }
        if let Some(err) = self.pending_error.lock().take() {
            return Err(err);
        }
        Self::forward(&self.pending_rx, buffer)
    }

    async fn subscribe_pair_created(
        &self,
        _factory: Address,
        buffer: usize,
    ) -> Result<Subscription<PairCreated>, ChainError> {
        if !self.subscriptions {
            return Err(ChainError::SubscriptionUnavailable);
        }
        Self::forward(&self.created_rx, buffer)
    }
}
