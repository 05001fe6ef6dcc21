//! JSON manifest persistence: fresh/restored lifecycle.
//!
//! A single document at `<data_dir>/lsm-tree.json` describing the tree's
//! configuration, counters, memtable contents, and every level's runs (each
//! run's metadata plus its Bloom filter bits and fence pointers). Run data
//! itself stays in its `.bin` file, referenced by absolute path -- never
//! embedded in the manifest.
//!
//! Written atomically: serialized to a `.tmp` file in the data directory,
//! then renamed over the live manifest, the usual write-tmp-then-rename
//! convention for crash-safe metadata updates.

use crate::executor::Executor;
use crate::level::Level;
use crate::run::Run;
use crate::stats::Stats;
use crate::Tree;
use anyhow::{Context, Result};
use bloom::BloomFilter;
use config::{Config, Policy};
use memtable::Memtable;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filename of the manifest within the configured data directory.
pub const MANIFEST_FILENAME: &str = "lsm-tree.json";

fn manifest_path(data_dir: &Path) -> PathBuf {
    data_dir.join(MANIFEST_FILENAME)
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestDoc {
    bloom_fpr: f64,
    buffer_pages: usize,
    page_size: usize,
    fanout: u32,
    policy: Policy,
    executor_width: usize,
    compaction_percentage: f64,
    verbose_benchmark_frequency: u64,
    throughput_reporting_frequency: u64,
    command_counter: u64,
    get_hits: u64,
    get_misses: u64,
    bloom_checks: u64,
    bloom_negatives: u64,
    memtable_capacity: usize,
    memtable_records: Vec<(i32, i32)>,
    levels: Vec<LevelDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LevelDoc {
    level_num: usize,
    max_records: usize,
    buffer_capacity: usize,
    fanout: u32,
    policy: Policy,
    record_count: usize,
    disk_name: String,
    io_count: u64,
    io_micros: u64,
    runs: Vec<RunDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunDoc {
    max_records: usize,
    records_per_page: usize,
    error_rate: f64,
    file_path: PathBuf,
    size: usize,
    max_key: i32,
    first_key: i32,
    last_key: i32,
    fence_pointers: Vec<i32>,
    bloom_bits: Vec<u8>,
    bloom_num_hashes: u32,
    true_positives: u64,
    false_positives: u64,
}

/// Opens a tree at `config.data_dir`: restores every structure from the
/// manifest if one exists there, otherwise starts fresh with a single empty
/// level 1 (a missing manifest is non-fatal, not an error condition).
pub fn open<E: Executor>(config: Config, executor: E) -> Result<Tree<E>> {
    let path = manifest_path(&config.data_dir);
    if !path.exists() {
        return Ok(fresh(config, executor));
    }

    let bytes = std::fs::read(&path).with_context(|| format!("reading manifest at {}", path.display()))?;
    let doc: ManifestDoc =
        serde_json::from_slice(&bytes).with_context(|| format!("parsing manifest at {}", path.display()))?;

    let mut buffer = Memtable::new(doc.memtable_capacity);
    for (k, v) in doc.memtable_records {
        buffer.put(k, v);
    }

    let mut levels = Vec::with_capacity(doc.levels.len());
    for level_doc in doc.levels {
        let level = Level::new(level_doc.level_num, level_doc.policy, level_doc.fanout, level_doc.buffer_capacity);
        let runs: Vec<Arc<Run>> = level_doc
            .runs
            .into_iter()
            .map(|run_doc| {
                let bloom = BloomFilter::from_bits_json(&run_doc.bloom_bits, run_doc.bloom_num_hashes);
                Arc::new(Run::restore(
                    run_doc.file_path,
                    run_doc.max_records,
                    run_doc.records_per_page,
                    run_doc.size,
                    run_doc.fence_pointers,
                    run_doc.max_key,
                    run_doc.first_key,
                    run_doc.last_key,
                    bloom,
                    run_doc.true_positives,
                    run_doc.false_positives,
                ))
            })
            .collect();
        level.restore_runs(runs, level_doc.record_count, level_doc.io_count, level_doc.io_micros);
        levels.push(Arc::new(level));
    }
    if levels.is_empty() {
        levels.push(Arc::new(Level::new(1, config.policy, config.fanout, config.buffer_capacity())));
    }

    let stats = Stats::default();
    stats.reset_for_restore(doc.command_counter, doc.get_hits, doc.get_misses, doc.bloom_checks, doc.bloom_negatives);

    Ok(Tree {
        config,
        buffer: RwLock::new(buffer),
        levels: RwLock::new(levels),
        move_runs_lock: Mutex::new(()),
        compaction_plan: Mutex::new(HashMap::new()),
        stats,
        executor,
    })
}

fn fresh<E: Executor>(config: Config, executor: E) -> Tree<E> {
    let level = Level::new(1, config.policy, config.fanout, config.buffer_capacity());
    Tree {
        buffer: RwLock::new(Memtable::new(config.buffer_capacity())),
        levels: RwLock::new(vec![Arc::new(level)]),
        move_runs_lock: Mutex::new(()),
        compaction_plan: Mutex::new(HashMap::new()),
        stats: Stats::default(),
        executor,
        config,
    }
}

/// Serializes the whole tree to `<data_dir>/lsm-tree.json`, atomically.
pub fn save<E: Executor>(tree: &Tree<E>) -> Result<()> {
    std::fs::create_dir_all(&tree.config.data_dir)
        .with_context(|| format!("creating data directory {}", tree.config.data_dir.display()))?;

    let buffer = tree.buffer.read();
    let levels = tree.levels.read();

    let doc = ManifestDoc {
        bloom_fpr: tree.config.bloom_fpr,
        buffer_pages: tree.config.buffer_pages,
        page_size: tree.config.page_size,
        fanout: tree.config.fanout,
        policy: tree.config.policy,
        executor_width: tree.config.executor_width,
        compaction_percentage: tree.config.compaction_percentage,
        verbose_benchmark_frequency: tree.config.verbose_benchmark_frequency,
        throughput_reporting_frequency: tree.config.throughput_reporting_frequency,
        command_counter: tree.stats.command_counter(),
        get_hits: tree.stats.get_hits.load(std::sync::atomic::Ordering::Relaxed),
        get_misses: tree.stats.get_misses.load(std::sync::atomic::Ordering::Relaxed),
        bloom_checks: tree.stats.bloom_checks.load(std::sync::atomic::Ordering::Relaxed),
        bloom_negatives: tree.stats.bloom_negatives.load(std::sync::atomic::Ordering::Relaxed),
        memtable_capacity: buffer.capacity(),
        memtable_records: buffer.snapshot(),
        levels: levels
            .iter()
            .map(|level| LevelDoc {
                level_num: level.level_num(),
                max_records: level.max_records(),
                buffer_capacity: level.buffer_capacity(),
                fanout: level.fanout(),
                policy: level.policy(),
                record_count: level.record_count(),
                disk_name: level.storage_tier().name.to_string(),
                io_count: level.io_count(),
                io_micros: level.io_micros(),
                runs: level
                    .runs_snapshot()
                    .iter()
                    .map(|run| RunDoc {
                        max_records: run.max_records(),
                        records_per_page: run.records_per_page(),
                        error_rate: run.bloom_theoretical_fpr(),
                        file_path: run.path().to_path_buf(),
                        size: run.size(),
                        max_key: run.max_key(),
                        first_key: run.first_key(),
                        last_key: run.last_key(),
                        fence_pointers: run.fence_pointers(),
                        bloom_bits: run.bloom_bits_as_json(),
                        bloom_num_hashes: run.bloom_num_hashes(),
                        true_positives: run.true_positives(),
                        false_positives: run.false_positives(),
                    })
                    .collect(),
            })
            .collect(),
    };
    drop(buffer);
    drop(levels);

    let path = manifest_path(&tree.config.data_dir);
    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(&doc).context("serializing manifest")?;
    std::fs::write(&tmp_path, &json)
        .with_context(|| format!("writing manifest tmp file {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &path)
        .with_context(|| format!("renaming manifest tmp file into place at {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/manifest_tests.rs"]
mod tests;
