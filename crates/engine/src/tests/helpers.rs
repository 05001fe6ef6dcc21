//! Shared test fixtures: a small, deterministic [`Config`] (B=4 records,
//! T=2, page size of 4 records) sized for fast, reproducible flush and
//! compaction scenarios, and a helper for counting persisted run files on
//! disk.

use crate::executor::SequentialExecutor;
use crate::Tree;
use config::{Config, Policy};
use std::path::Path;

/// A `Config` with a 4-record buffer, fan-out 2, and 4 records per page --
/// small enough that flushes and compactions trigger after a handful of
/// puts, keeping the write/read/compaction test scenarios below fast and
/// easy to reason about by hand.
pub fn small_config(data_dir: &Path, policy: Policy) -> Config {
    Config {
        bloom_fpr: 0.01,
        buffer_pages: 1,
        page_size: 32, // 32 / 8 bytes-per-record = 4 records per page
        fanout: 2,
        policy,
        executor_width: 2,
        compaction_percentage: 0.5,
        data_dir: data_dir.to_path_buf(),
        verbose_benchmark_frequency: 0,
        throughput_reporting_frequency: 0,
    }
}

/// Opens a tree over [`small_config`] with a [`SequentialExecutor`] so tests
/// get deterministic, single-threaded compaction and scan ordering.
pub fn open_small_tree(data_dir: &Path, policy: Policy) -> Tree<SequentialExecutor> {
    let config = small_config(data_dir, policy);
    Tree::open_with_executor(config, SequentialExecutor).expect("opening a fresh tree never fails")
}

/// Counts the `.bin` run files directly inside `dir`.
pub fn count_run_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("bin"))
                .count()
        })
        .unwrap_or(0)
}
