// ethers-rs backed chain access: HTTP for point queries, optional WebSocket for feeds

use async_trait::async_trait;
use ethers::{
    contract::abigen,
    providers::{Http, Middleware, Provider, Ws},
    types::{Address, BlockId, BlockNumber, Filter, Log, Transaction, H256},
};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::{ChainClient, ChainFeed, PairCreated, PairSnapshot, Subscription, SubscriptionHandle};
use crate::error::ChainError;

abigen!(
    UniswapV2Factory,
    r#"[
        function getPair(address tokenA, address tokenB) external view returns (address pair)
    ]"#
);

abigen!(
    UniswapV2Pair,
    r#"[
        function token0() external view returns (address)
        function token1() external view returns (address)
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
    ]"#
);

const PAIR_CREATED_EVENT: &str = "PairCreated(address,address,address,uint256)";

/// Chain endpoint pair: HTTP for requests, WebSocket (if any) for subscriptions
#[derive(Clone)]
pub struct EthersChain {
    rpc: Arc<Provider<Http>>,
    ws: Option<Arc<Provider<Ws>>>,
}

impl EthersChain {
    /// The HTTP endpoint is mandatory. A missing or unreachable WebSocket
    /// endpoint only disables subscriptions.
    pub async fn connect(rpc_url: &str, ws_url: Option<&str>) -> Result<Self, ChainError> {
        let rpc = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ChainError::Endpoint(format!("{rpc_url}: {e}")))?;

        let ws = match ws_url {
            Some(url) => match Provider::<Ws>::connect(url).await {
                Ok(provider) => {
                    info!("Connected to WebSocket: {}", url);
                    Some(Arc::new(provider))
                }
                Err(err) => {
                    warn!(%err, "WebSocket connect failed, subscriptions disabled");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            rpc: Arc::new(rpc),
            ws,
        })
    }

    /// (chain id, head block)
    pub async fn network(&self) -> Result<(u64, u64), ChainError> {
        let chain_id = self.rpc.get_chainid().await?;
        let block = self.rpc.get_block_number().await?;
        Ok((chain_id.as_u64(), block.as_u64()))
    }

    pub fn has_subscriptions(&self) -> bool {
        self.ws.is_some()
    }

    fn ws(&self) -> Result<Arc<Provider<Ws>>, ChainError> {
        self.ws.clone().ok_or(ChainError::SubscriptionUnavailable)
    }
}

fn contract_err(err: impl std::fmt::Display) -> ChainError {
    ChainError::Contract(err.to_string())
}

#[async_trait]
impl ChainClient for EthersChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.rpc.get_block_number().await?.as_u64())
    }

    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>, ChainError> {
        Ok(self.rpc.get_transaction(hash).await?)
    }

    async fn get_pair(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address, ChainError> {
        let factory = UniswapV2Factory::new(factory, self.rpc.clone());
        factory.get_pair(token_a, token_b).call().await.map_err(contract_err)
    }

    async fn pair_snapshot(&self, pair: Address, block: u64) -> Result<PairSnapshot, ChainError> {
        let contract = UniswapV2Pair::new(pair, self.rpc.clone());
        let at = BlockId::Number(BlockNumber::Number(block.into()));

        let token0 = contract.token_0().block(at);
        let token1 = contract.token_1().block(at);
        let reserves = contract.get_reserves().block(at);

        let (token0, token1, (reserve0, reserve1, _)) =
            tokio::try_join!(token0.call(), token1.call(), reserves.call()).map_err(contract_err)?;

        Ok(PairSnapshot {
            token0,
            token1,
            reserve0: reserve0.into(),
            reserve1: reserve1.into(),
            block,
        })
    }
}

#[async_trait]
impl ChainFeed for EthersChain {
    async fn subscribe_pending(&self, buffer: usize) -> Result<Subscription<H256>, ChainError> {
        let provider = self.ws()?;
        let (tx, rx) = mpsc::channel(buffer);
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut stream = match provider.subscribe_pending_txs().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(ChainError::from(err)));
                    return;
                }
            };

            while let Some(hash) = stream.next().await {
                match tx.try_send(hash) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!(?hash, "pending channel full, dropping hash");
                        metrics::counter!("mempool_hashes_dropped_total").increment(1);
                    }
                    Err(TrySendError::Closed(_)) => return,
                }
            }
            info!("Pending transaction subscription ended");
        });

        ready_rx.await.map_err(|_| ChainError::SubscriptionClosed)??;
        Ok(Subscription::new(rx, SubscriptionHandle::new(task.abort_handle())))
    }

    async fn subscribe_pair_created(
        &self,
        factory: Address,
        buffer: usize,
    ) -> Result<Subscription<PairCreated>, ChainError> {
        let provider = self.ws()?;
        let (tx, rx) = mpsc::channel(buffer);
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let filter = Filter::new().address(factory).event(PAIR_CREATED_EVENT);
            let mut stream = match provider.subscribe_logs(&filter).await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(ChainError::from(err)));
                    return;
                }
            };

            while let Some(log) = stream.next().await {
                let Some(created) = decode_pair_created(factory, &log) else {
                    debug!(?factory, "undecodable PairCreated log");
                    continue;
                };
                // pair creation is rare; wait rather than lose a pool
                if tx.send(created).await.is_err() {
                    return;
                }
            }
            info!(?factory, "PairCreated subscription ended");
        });

        ready_rx.await.map_err(|_| ChainError::SubscriptionClosed)??;
        Ok(Subscription::new(rx, SubscriptionHandle::new(task.abort_handle())))
    }
}

/// token0 and token1 are indexed; the pair address is the first data word
pub(crate) fn decode_pair_created(factory: Address, log: &Log) -> Option<PairCreated> {
    if log.topics.len() < 3 || log.data.len() < 32 {
        return None;
    }

    Some(PairCreated {
        factory,
        token0: Address::from(log.topics[1]),
        token1: Address::from(log.topics[2]),
        pair: Address::from_slice(&log.data[12..32]),
    })
}
