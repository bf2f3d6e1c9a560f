//! Configuration module

use ethers::types::{Address, H160, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfigError;

/// Mainnet addresses
pub mod addresses {
    use super::{Address, H160};
    use hex_literal::hex;

    pub const UNISWAP_V2_ROUTER: Address = H160(hex!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"));
    pub const UNISWAP_V2_FACTORY: Address = H160(hex!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"));
    pub const SUSHISWAP_ROUTER: Address = H160(hex!("d9e1cE17f2641f24aE83637ab66a2cca9C378B9F"));
    pub const SUSHISWAP_FACTORY: Address = H160(hex!("C0AEe478e3658e2610c5F7A4A2E1777cE9e4f2Ac"));
    /// Observed only; its calls are not V2 router swaps
    pub const UNISWAP_V3_ROUTER: Address = H160(hex!("E592427A0AEce92De3Edee1F18E0157C05861564"));
    pub const WETH: Address = H160(hex!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"));
    pub const AAVE_V3_POOL: Address = H160(hex!("87870Bced4dd9BdF73e4d4e75Bce4FFC1c15d7EC"));
}

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chain endpoint
    pub chain: ChainConfig,

    /// V2 deployments, the first is canonical
    pub dexes: Vec<DexConfig>,

    /// Routers watched in the mempool without a V2 factory behind them
    #[serde(default)]
    pub extra_routers: Vec<Address>,

    /// Strategy settings
    pub strategy: StrategyConfig,

    /// Flash-loan financing
    pub financing: FinancingConfig,

    /// Performance settings
    pub performance: PerformanceConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Prometheus exporter port, disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub ws_url: Option<String>,
    pub weth: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexConfig {
    pub name: String,
    pub router: Address,
    pub factory: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub min_profit_wei: u128,
    pub max_gas_price_gwei: u64,
    pub mempool_window_secs: u64,
    pub sandwich_threshold_wei: u128,
    pub max_block_lag: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancingConfig {
    pub fee_bps: u32,
    pub gas_units: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub scoring_workers: usize,
    pub lookup_concurrency: usize,
    pub channel_size: usize,
    pub max_pending_opportunities: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig {
                name: "Ethereum".to_string(),
                chain_id: 1,
                rpc_url: String::new(),
                ws_url: None,
                weth: addresses::WETH,
            },
            dexes: vec![
                DexConfig {
                    name: "UniswapV2".to_string(),
                    router: addresses::UNISWAP_V2_ROUTER,
                    factory: addresses::UNISWAP_V2_FACTORY,
                },
                DexConfig {
                    name: "SushiSwap".to_string(),
                    router: addresses::SUSHISWAP_ROUTER,
                    factory: addresses::SUSHISWAP_FACTORY,
                },
            ],
            extra_routers: vec![addresses::UNISWAP_V3_ROUTER],
            strategy: StrategyConfig {
                min_profit_wei: 10_000_000_000_000_000, // 0.01 ETH
                max_gas_price_gwei: 50,
                mempool_window_secs: 30,
                sandwich_threshold_wei: 1_000_000_000_000_000_000, // 1 ETH
                max_block_lag: 2,
            },
            financing: FinancingConfig {
                fee_bps: 5,
                gas_units: 200_000,
            },
            performance: PerformanceConfig {
                scoring_workers: num_cpus::get(),
                lookup_concurrency: 32,
                channel_size: 10_000,
                max_pending_opportunities: 1000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_output: false,
            },
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load config from `.env`, the `MEV_CONFIG` file and environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let config_path = std::env::var("MEV_CONFIG")
            .unwrap_or_else(|_| "config/config.json".to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::load(&config_path)?
        } else {
            Config::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply `ETHEREUM_RPC_URL`, `ETHEREUM_WSS_URL`, `MIN_PROFIT_ETH`,
    /// `MAX_GAS_PRICE_GWEI` and `MEMPOOL_WINDOW_SECONDS` from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ETHEREUM_RPC_URL") {
            self.chain.rpc_url = url;
        }
        if let Some(url) = lookup("ETHEREUM_WSS_URL") {
            self.chain.ws_url = Some(url).filter(|url| !url.is_empty());
        }
        if let Some(eth) = lookup("MIN_PROFIT_ETH") {
            self.strategy.min_profit_wei = parse_eth_amount("MIN_PROFIT_ETH", &eth)?;
        }
        if let Some(gwei) = lookup("MAX_GAS_PRICE_GWEI") {
            self.strategy.max_gas_price_gwei = parse_integer("MAX_GAS_PRICE_GWEI", &gwei)?;
        }
        if let Some(secs) = lookup("MEMPOOL_WINDOW_SECONDS") {
            self.strategy.mempool_window_secs = parse_integer("MEMPOOL_WINDOW_SECONDS", &secs)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.rpc_url.trim().is_empty() {
            return Err(ConfigError::Missing("ETHEREUM_RPC_URL"));
        }
        if self.dexes.is_empty() {
            return Err(ConfigError::Invalid {
                key: "dexes",
                reason: "at least one V2 deployment is required".to_string(),
            });
        }
        if self.strategy.mempool_window_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "strategy.mempool_window_secs",
                reason: "window must be positive".to_string(),
            });
        }
        if self.financing.fee_bps > 10_000 {
            return Err(ConfigError::Invalid {
                key: "financing.fee_bps",
                reason: format!("{} exceeds 10000", self.financing.fee_bps),
            });
        }
        Ok(())
    }

    /// Every address a tracked transaction may be sent to
    pub fn watched_routers(&self) -> HashSet<Address> {
        self.dexes
            .iter()
            .map(|dex| dex.router)
            .chain(self.extra_routers.iter().copied())
            .collect()
    }

    /// Configured factories in order, without duplicates
    pub fn factories(&self) -> Vec<Address> {
        let mut seen = HashSet::new();
        self.dexes
            .iter()
            .map(|dex| dex.factory)
            .filter(|factory| seen.insert(*factory))
            .collect()
    }

    pub fn max_gas_price_wei(&self) -> U256 {
        U256::from(self.strategy.max_gas_price_gwei) * U256::exp10(9)
    }

    /// Save config to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn parse_eth_amount(key: &'static str, value: &str) -> Result<u128, ConfigError> {
    let wei = ethers::utils::parse_ether(value.trim()).map_err(|err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
    })?;
    if wei > U256::from(u128::MAX) {
        return Err(ConfigError::Invalid {
            key,
            reason: "amount out of range".to_string(),
        });
    }
    Ok(wei.as_u128())
}

fn parse_integer(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|err: std::num::ParseIntError| ConfigError::Invalid {
        key,
        reason: err.to_string(),
    })
}
