//! MEV Sentinel CLI
//! Mempool opportunity detection for V2 pools

use anyhow::Context;
use mev_sentinel::{logging, Config, Engine, EthersChain, ScoredOpportunity};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("loading configuration")?;
    logging::init(&config.logging)?;

    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("║          MEV SENTINEL v0.1.0 - ETHEREUM MAINNET               ║");
    println!("║          Mempool scanning | V2 arbitrage + sandwich sizing    ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // Check CLI args
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 && args[1] == "benchmark" {
        info!("Running latency benchmarks...");
        mev_sentinel::run_all_benchmarks();
        return Ok(());
    }

    config.validate().context("invalid configuration")?;
    info!("✅ Configuration loaded");
    info!("   DEXes: {}", config.dexes.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(", "));
    info!("   Window: {}s | Max gas: {} gwei", config.strategy.mempool_window_secs, config.strategy.max_gas_price_gwei);

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing prometheus exporter")?;
        info!("✅ Metrics exported on {}", addr);
    }

    let chain = EthersChain::connect(&config.chain.rpc_url, config.chain.ws_url.as_deref())
        .await
        .context("connecting to RPC endpoint")?;
    let (chain_id, block) = chain
        .network()
        .await
        .context("fetching network and block number")?;
    info!("✅ Connected | Chain ID: {} | Block: {}", chain_id, block);
    if chain_id != config.chain.chain_id {
        warn!("⚠️ Endpoint chain id {} differs from configured {}", chain_id, config.chain.chain_id);
    }
    if !chain.has_subscriptions() {
        warn!("⚠️ No WebSocket endpoint, mempool monitoring disabled");
    }

    let (out, mut opportunities) =
        mpsc::channel::<ScoredOpportunity>(config.performance.max_pending_opportunities);
    let engine = Engine::new(config, Arc::new(chain));

    // Execution lives elsewhere; drain accepted opportunities
    tokio::spawn(async move {
        while let Some(scored) = opportunities.recv().await {
            info!(
                trigger = ?scored.opportunity.trigger_tx_hash,
                pools = ?scored.opportunity.involved_pools,
                block = scored.opportunity.observed_at_block,
                "opportunity ready for execution"
            );
        }
    });

    engine.run(out).await?;

    info!("✅ MEV Sentinel shutdown complete");
    Ok(())
}
