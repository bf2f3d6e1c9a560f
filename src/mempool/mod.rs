//! Mempool monitoring module
//! Pending-hash subscription + time-windowed working set

pub mod monitor;
pub mod working_set;

pub use monitor::{MempoolConfig, MempoolMonitor, MempoolStats};
pub use working_set::WorkingSet;
