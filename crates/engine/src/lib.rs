//! # engine - RiptideKV LSM-tree coordinator
//!
//! The central orchestrator tying [`memtable`], [`sstable`], and [`bloom`]
//! together into a complete leveled LSM tree over fixed-width `i32`
//! keys/values.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────────┐
//! │                      TREE                         │
//! │                                                    │
//! │ write.rs  -> buffer.put() -> (full?) -> flush to   │
//! │              a new level-1 run -> move_runs cascade│
//! │                                                    │
//! │ read.rs   -> buffer -> level 1..N runs             │
//! │              (newest first, first match wins)      │
//! │                                                    │
//! │ compaction.rs -> move_runs, execute_compaction_plan│
//! │                   Bloom/fence MONKEY autotuning     │
//! │                                                    │
//! │ manifest.rs -> single JSON document, atomic rename  │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module        | Purpose                                             |
//! |---------------|------------------------------------------------------|
//! | [`run`]       | `Run`: flush-once file + Bloom filter + fence index |
//! | [`level`]     | `Level`: run list, capacity, compaction primitives  |
//! | [`executor`]  | `Executor` trait + `rayon`-backed production impl   |
//! | [`stats`]     | hit/miss counters, throughput window, status report |
//! | [`error`]     | `TreeError`, the tree's own error kinds             |
//! | [`write`]     | `put`, `del`                                        |
//! | [`read`]      | `get`, `range`                                      |
//! | [`compaction`]| `move_runs`, `execute_compaction_plan`, MONKEY      |
//! | [`manifest`]  | JSON (de)serialization, fresh/restored lifecycle    |
//!
//! ## Concurrency
//!
//! Lock acquisition order: levels-vector ->
//! move-runs -> level(1..k ascending) -> compaction-plan -> buffer ->
//! run-internal. `move_runs_lock` is the one lock that is never collapsed
//! or bypassed.

mod compaction;
mod error;
mod executor;
mod level;
mod manifest;
mod read;
mod run;
mod stats;
mod write;

pub use error::TreeError;
pub use executor::{Executor, RayonExecutor, SequentialExecutor};
pub use level::Level;
pub use run::Run;
pub use stats::{LevelStats, RecordSample, TreeStats};

use config::Config;
use memtable::Memtable;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// The coordinator: owns the buffer and the level vector, orchestrates
/// flushes and compactions, routes queries, maintains counters, drives
/// Bloom-filter autotuning, and (de)serializes the whole tree state.
pub struct Tree<E: Executor = RayonExecutor> {
    pub(crate) config: Config,
    pub(crate) buffer: RwLock<Memtable>,
    pub(crate) levels: RwLock<Vec<Arc<Level>>>,
    pub(crate) move_runs_lock: Mutex<()>,
    pub(crate) compaction_plan: Mutex<HashMap<usize, (usize, usize)>>,
    pub(crate) stats: stats::Stats,
    pub(crate) executor: E,
}

impl Tree<RayonExecutor> {
    /// Opens a tree at `config.data_dir`: restores from the manifest if one
    /// exists, otherwise starts fresh with a single empty level 1.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        config.validate()?;
        let executor = RayonExecutor::new(config.executor_width)?;
        Self::open_with_executor(config, executor)
    }
}

impl<E: Executor> Tree<E> {
    /// Same as [`Tree::open`] but with an injected executor (used by tests
    /// that want deterministic, single-threaded compaction/scan ordering).
    pub fn open_with_executor(config: Config, executor: E) -> anyhow::Result<Self> {
        manifest::open(config, executor)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Persists the whole tree to `<data_dir>/lsm-tree.json`, atomically.
    pub fn checkpoint(&self) -> anyhow::Result<()> {
        manifest::save(self)
    }

    /// Returns a structured snapshot of every counter the `s`/`i`/`misses`/
    /// `io` operator commands report.
    pub fn stats(&self) -> TreeStats {
        let levels = self.levels.read();
        let buffer = self.buffer.read();
        TreeStats {
            get_hits: self.stats.get_hits.load(std::sync::atomic::Ordering::Relaxed),
            get_misses: self.stats.get_misses.load(std::sync::atomic::Ordering::Relaxed),
            bloom_checks: self.stats.bloom_checks.load(std::sync::atomic::Ordering::Relaxed),
            bloom_negatives: self.stats.bloom_negatives.load(std::sync::atomic::Ordering::Relaxed),
            command_counter: self.stats.command_counter(),
            buffer_entries: buffer.len(),
            buffer_capacity: buffer.capacity(),
            levels: levels
                .iter()
                .map(|l| LevelStats {
                    level_num: l.level_num(),
                    run_count: l.run_count(),
                    record_count: l.record_count(),
                    max_records: l.max_records(),
                    disk_name: l.storage_tier().name,
                    disk_penalty_multiplier: l.storage_tier().relative_cost,
                    io_count: l.io_count(),
                    io_micros: l.io_micros(),
                    weighted_io_micros: l.io_micros() * l.storage_tier().relative_cost as u64,
                })
                .collect(),
        }
    }

    /// Runs the MONKEY Bloom-filter bit-budget autotuner over every run in
    /// the tree with total budget `total_bits`. Callers are
    /// expected to hold the engine-wide control lock for the duration (the
    /// `monkey` operator command serializes this against every other
    /// operation at the `cli` layer).
    pub fn autotune_filters(&self, total_bits: u64) -> anyhow::Result<()> {
        compaction::autotune_filters(self, total_bits)
    }

    /// Returns the level, creating it (and every level between the current
    /// top and `level_num`) if it does not yet exist.
    ///
    /// Growing the level vector requires upgrading the
    /// levels-vector lock to exclusive; the upgradable-read pattern lets a
    /// holder check "does it exist" and "create it" without releasing and
    /// re-acquiring the lock in between.
    pub(crate) fn ensure_level(&self, level_num: usize) -> Arc<Level> {
        let guard = self.levels.upgradable_read();
        if let Some(level) = guard.get(level_num - 1) {
            return level.clone();
        }
        let mut guard = parking_lot::RwLockUpgradableReadGuard::upgrade(guard);
        while guard.len() < level_num {
            let next_num = guard.len() + 1;
            guard.push(Arc::new(Level::new(
                next_num,
                self.config.policy,
                self.config.fanout,
                self.config.buffer_capacity(),
            )));
        }
        guard[level_num - 1].clone()
    }

    /// Returns the level if it already exists, without creating it.
    pub(crate) fn get_level(&self, level_num: usize) -> Option<Arc<Level>> {
        self.levels.read().get(level_num - 1).cloned()
    }

    /// True if `level_num` is the deepest level currently in the tree.
    pub(crate) fn is_last_level(&self, level_num: usize) -> bool {
        self.levels.read().len() == level_num
    }

    /// Raw record samples for the `s [N]` stats dump: the
    /// buffer (`source_level == 0`) followed by every level in order,
    /// capping the number of records reported from each source at `limit`
    /// when given. Unlike `get`/`range`, this walks raw storage and does
    /// not merge across runs or hide tombstones -- each run's contents are
    /// dumped directly.
    pub fn sample_records(&self, limit: Option<usize>) -> Vec<stats::RecordSample> {
        let mut out = Vec::new();

        let buffer_records = {
            let buffer = self.buffer.read();
            let mut snapshot = buffer.snapshot();
            if let Some(n) = limit {
                snapshot.truncate(n);
            }
            snapshot
        };
        out.push(stats::RecordSample {
            source_level: 0,
            records: buffer_records,
        });

        for level in self.levels.read().iter() {
            let mut records = Vec::new();
            for run in level.runs_snapshot() {
                if let Some(n) = limit {
                    if records.len() >= n {
                        break;
                    }
                }
                if let Ok(scan) = run.scan() {
                    records.extend(scan);
                }
            }
            if let Some(n) = limit {
                records.truncate(n);
            }
            out.push(stats::RecordSample {
                source_level: level.level_num(),
                records,
            });
        }

        out
    }

    /// Per-run Bloom filter summaries, for the `bloom` operator command.
    pub fn bloom_summaries(&self) -> Vec<(usize, usize, u64, u32, u64, u64)> {
        let levels = self.levels.read();
        let mut out = Vec::new();
        for level in levels.iter() {
            for (idx, run) in level.runs_snapshot().iter().enumerate() {
                out.push((
                    level.level_num(),
                    idx,
                    run.bloom_num_bits(),
                    run.bloom_num_hashes(),
                    run.true_positives(),
                    run.false_positives(),
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests;
