//! Hit/miss counters and the throughput-reporting window.
//!
//! Tree-wide get/Bloom counters, plus a periodic commands/second throughput
//! report logged on a configurable window.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Tree-wide counters, independent of any single level or run.
#[derive(Default)]
pub struct Stats {
    pub get_hits: AtomicU64,
    pub get_misses: AtomicU64,
    pub bloom_checks: AtomicU64,
    pub bloom_negatives: AtomicU64,
    command_counter: AtomicU64,
    throughput: Mutex<ThroughputWindow>,
}

struct ThroughputWindow {
    last_report: Option<Instant>,
    commands_since_report: u64,
}

impl Default for ThroughputWindow {
    fn default() -> Self {
        Self {
            last_report: None,
            commands_since_report: 0,
        }
    }
}

impl Stats {
    pub fn record_get_hit(&self) {
        self.get_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get_miss(&self) {
        self.get_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bloom_check(&self, negative: bool) {
        self.bloom_checks.fetch_add(1, Ordering::Relaxed);
        if negative {
            self.bloom_negatives.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn command_counter(&self) -> u64 {
        self.command_counter.load(Ordering::Relaxed)
    }

    /// Bumps the command counter and, if `frequency` is non-zero and the
    /// window has elapsed, logs a commands/second figure.
    pub fn bump_command_counter(&self, frequency: u64) {
        self.command_counter.fetch_add(1, Ordering::Relaxed);
        if frequency == 0 {
            return;
        }

        let mut window = self.throughput.lock();
        window.commands_since_report += 1;
        let now_is_first = window.last_report.is_none();
        if now_is_first {
            window.last_report = Some(Instant::now());
        }
        if window.commands_since_report >= frequency {
            if let Some(start) = window.last_report {
                let elapsed = start.elapsed().as_secs_f64().max(1e-9);
                let throughput = window.commands_since_report as f64 / elapsed;
                info!(commands_per_second = throughput, "throughput report");
            }
            window.commands_since_report = 0;
            window.last_report = Some(Instant::now());
        }
    }

    pub fn reset_for_restore(&self, command_counter: u64, get_hits: u64, get_misses: u64, bloom_checks: u64, bloom_negatives: u64) {
        self.command_counter.store(command_counter, Ordering::Relaxed);
        self.get_hits.store(get_hits, Ordering::Relaxed);
        self.get_misses.store(get_misses, Ordering::Relaxed);
        self.bloom_checks.store(bloom_checks, Ordering::Relaxed);
        self.bloom_negatives.store(bloom_negatives, Ordering::Relaxed);
    }
}

/// Per-level I/O summary, part of [`TreeStats`].
#[derive(Debug, Clone)]
pub struct LevelStats {
    pub level_num: usize,
    pub run_count: usize,
    pub record_count: usize,
    pub max_records: usize,
    pub disk_name: &'static str,
    pub disk_penalty_multiplier: u32,
    pub io_count: u64,
    pub io_micros: u64,
    pub weighted_io_micros: u64,
}

/// The full status report backing the `s`/`i`/`misses`/`io` operator
/// commands. The `cli` crate formats this; the tree is the source of truth
/// for every number in it.
#[derive(Debug, Clone)]
pub struct TreeStats {
    pub get_hits: u64,
    pub get_misses: u64,
    pub bloom_checks: u64,
    pub bloom_negatives: u64,
    pub command_counter: u64,
    pub buffer_entries: usize,
    pub buffer_capacity: usize,
    pub levels: Vec<LevelStats>,
}

/// Raw, unmerged `(key, value)` records sampled from one source -- the
/// buffer (`source_level == 0`) or a level's runs in storage order --
/// for the `s [N]` stats dump. Tombstones are reported as-is, never hidden
/// behind "absent", since this walks raw storage rather than the tree's
/// logical view.
#[derive(Debug, Clone)]
pub struct RecordSample {
    pub source_level: usize,
    pub records: Vec<(i32, i32)>,
}
