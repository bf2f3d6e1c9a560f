//! Benchmark module
//! Latency measurements for the synchronous hot paths

pub mod latency;

pub use latency::{run_all_benchmarks, run_bench, BenchResult};
