//! Latency benchmarks for the synchronous pipeline stages
//! Classification, constant-product math, working-set insert, financing

use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256, I256, U256};
use std::hint::black_box;
use std::time::{Duration, Instant};

use crate::amm;
use crate::classifier;
use crate::financing::FinancingModel;
use crate::mempool::WorkingSet;
use crate::types::{Opportunity, OpportunityKind, PendingTransaction, SwapMethod};

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchResult {
    pub name: String,
    pub iterations: u64,
    pub total_ns: u64,
    pub avg_ns: f64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub p50_ns: u64,
    pub p99_ns: u64,
    pub throughput_ops: f64,
}

impl std::fmt::Display for BenchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<30} | avg: {:>8.2}ns | min: {:>6}ns | p50: {:>6}ns | p99: {:>6}ns | throughput: {:>12.0} ops/s",
            self.name, self.avg_ns, self.min_ns, self.p50_ns, self.p99_ns, self.throughput_ops
        )
    }
}

/// Run a benchmark with high precision
pub fn run_bench<F>(name: &str, iterations: u64, mut f: F) -> BenchResult
where
    F: FnMut(),
{
    // Warmup
    for _ in 0..1000 {
        black_box(f());
    }

    let mut samples = Vec::with_capacity(iterations as usize);
    for _ in 0..iterations {
        let start = Instant::now();
        black_box(f());
        samples.push(start.elapsed().as_nanos() as u64);
    }

    samples.sort_unstable();

    let total: u64 = samples.iter().sum();
    let avg = total as f64 / iterations.max(1) as f64;
    let min = *samples.first().unwrap_or(&0);
    let max = *samples.last().unwrap_or(&0);
    let p50 = samples.get(samples.len() / 2).copied().unwrap_or(0);
    let p99 = samples.get(samples.len() * 99 / 100).copied().unwrap_or(0);
    let throughput = if avg > 0.0 { 1_000_000_000.0 / avg } else { 0.0 };

    BenchResult {
        name: name.to_string(),
        iterations,
        total_ns: total,
        avg_ns: avg,
        min_ns: min,
        max_ns: max,
        p50_ns: p50,
        p99_ns: p99,
        throughput_ops: throughput,
    }
}

/// `swapExactTokensForTokens` calldata for a two-hop path
pub fn sample_swap_calldata() -> Vec<u8> {
    let args = abi::encode(&[
        Token::Uint(U256::exp10(18)),
        Token::Uint(U256::from(1_900u64) * U256::exp10(18)),
        Token::Array(vec![
            Token::Address(Address::repeat_byte(0x0e)),
            Token::Address(Address::repeat_byte(0xda)),
        ]),
        Token::Address(Address::repeat_byte(0x03)),
        Token::Uint(U256::from(1_700_000_000u64)),
    ]);
    let mut data = classifier::selector(SwapMethod::SwapExactTokensForTokens).to_vec();
    data.extend_from_slice(&args);
    data
}

fn sample_tx(hash: H256, data: Vec<u8>) -> PendingTransaction {
    PendingTransaction {
        hash,
        from: Address::repeat_byte(0x02),
        to: Some(Address::repeat_byte(0x7a)),
        value_wei: U256::zero(),
        gas_price_wei: U256::from(30_000_000_000u64),
        data: Bytes::from(data),
        first_seen_at: Instant::now(),
    }
}

pub fn bench_classify_swap() -> BenchResult {
    let tx = sample_tx(H256::repeat_byte(1), sample_swap_calldata());

    run_bench("Classify V2 swap", 100_000, || {
        black_box(classifier::classify(&tx));
    })
}

pub fn bench_classify_miss() -> BenchResult {
    let tx = sample_tx(H256::repeat_byte(1), vec![0xa9, 0x05, 0x9c, 0xbb, 0, 0, 0, 0]);

    run_bench("Classify non-swap", 100_000, || {
        black_box(classifier::classify(&tx));
    })
}

pub fn bench_amount_out() -> BenchResult {
    let reserve0 = U256::from(1_000u64) * U256::exp10(18); // 1000 ETH
    let reserve1 = U256::from(2_000_000u64) * U256::exp10(18); // 2M tokens
    let amount_in = U256::exp10(18);

    run_bench("Constant product amount out", 100_000, || {
        black_box(amm::get_amount_out(amount_in, reserve0, reserve1));
    })
}

pub fn bench_optimal_input() -> BenchResult {
    let e18 = U256::exp10(18);
    // buy on an untouched pool, sell where a victim pushed the price up
    let (s_in, t_out) = (U256::from(100u64) * e18, U256::from(200_000u64) * e18);
    let (t_in, s_out) = (U256::from(181_818u64) * e18, U256::from(110u64) * e18);

    run_bench("Two-pool optimal input", 100_000, || {
        black_box(amm::optimal_cycle_input(s_in, t_out, t_in, s_out));
    })
}

pub fn bench_working_set_insert() -> BenchResult {
    let set = WorkingSet::new(Duration::from_secs(30));
    let data = sample_swap_calldata();
    let mut counter = 0u64;

    run_bench("Working set insert", 100_000, || {
        counter += 1;
        let tx = sample_tx(H256::from_low_u64_be(counter), data.clone());
        black_box(set.insert(tx, Instant::now()));
    })
}

pub fn bench_financing() -> BenchResult {
    let model = FinancingModel::default();
    let opportunity = Opportunity {
        kind: OpportunityKind::Arbitrage,
        trigger_tx_hash: H256::repeat_byte(1),
        estimated_profit_wei: I256::from(50_000_000_000_000_000i128),
        required_capital_wei: U256::from(10u64) * U256::exp10(18),
        involved_pools: vec![Address::repeat_byte(0xb1), Address::repeat_byte(0xb2)],
        observed_at_block: 1,
    };
    let amount = opportunity.required_capital_wei;
    let gas_price = U256::from(30_000_000_000u64);

    run_bench("Financing verdict", 100_000, || {
        black_box(model.evaluate(&opportunity, amount, gas_price));
    })
}

/// Run all benchmarks
pub fn run_all_benchmarks() -> Vec<BenchResult> {
    println!("\n╔══════════════════════════════════════════════════════════════════════════════╗");
    println!("║                    MEV SENTINEL - LATENCY BENCHMARKS                         ║");
    println!("╠══════════════════════════════════════════════════════════════════════════════╣");

    let results = vec![
        // Decode
        bench_classify_swap(),
        bench_classify_miss(),
        // Math
        bench_amount_out(),
        bench_optimal_input(),
        bench_financing(),
        // State
        bench_working_set_insert(),
    ];

    for r in &results {
        println!("║ {} ║", r);
    }

    println!("╚══════════════════════════════════════════════════════════════════════════════╝");

    println!("\n📊 LATENCY SUMMARY:");
    let critical_ops = ["Classify V2 swap", "Two-pool optimal input", "Financing verdict"];
    let total_critical: f64 = results
        .iter()
        .filter(|r| critical_ops.iter().any(|op| r.name.contains(op)))
        .map(|r| r.avg_ns)
        .sum();

    println!("   Per-swap CPU path: {:.2}ns ({:.2}µs)", total_critical, total_critical / 1000.0);
    if total_critical < 10_000.0 {
        println!("   ✅ Under 10µs, RPC round trips dominate");
    } else {
        println!("   ⚠️  Over 10µs of CPU per swap");
    }

    results
}
