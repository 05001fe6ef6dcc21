//! A level: an ordered, newest-first sequence of runs with a compaction
//! policy, a capacity derived from a geometric fan-out, and a nominal
//! storage tier.

use crate::error::TreeError;
use crate::run::Run;
use anyhow::Result;
use config::{storage_tier_for_level, Policy, StorageTier};
use parking_lot::RwLock;
use sstable::{merge_runs, Record};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// `max_records = B * T^level_num`.
pub fn max_records_for_level(level_num: usize, buffer_capacity: usize, fanout: u32) -> usize {
    buffer_capacity * (fanout as u64).pow(level_num as u32) as usize
}

pub struct Level {
    level_num: usize,
    policy: Policy,
    fanout: u32,
    buffer_capacity: usize,
    max_records: usize,
    storage_tier: StorageTier,
    runs: RwLock<Vec<Arc<Run>>>,
    record_count: AtomicUsize,
    io_count: AtomicU64,
    io_micros: AtomicU64,
}

impl Level {
    pub fn new(level_num: usize, policy: Policy, fanout: u32, buffer_capacity: usize) -> Self {
        let max_records = max_records_for_level(level_num, buffer_capacity, fanout);
        Self {
            level_num,
            policy,
            fanout,
            buffer_capacity,
            max_records,
            storage_tier: storage_tier_for_level(level_num),
            runs: RwLock::new(Vec::new()),
            record_count: AtomicUsize::new(0),
            io_count: AtomicU64::new(0),
            io_micros: AtomicU64::new(0),
        }
    }

    pub fn level_num(&self) -> usize {
        self.level_num
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn fanout(&self) -> u32 {
        self.fanout
    }

    pub fn storage_tier(&self) -> StorageTier {
        self.storage_tier
    }

    pub fn record_count(&self) -> usize {
        self.record_count.load(Ordering::Relaxed)
    }

    pub fn io_count(&self) -> u64 {
        self.io_count.load(Ordering::Relaxed)
    }

    pub fn io_micros(&self) -> u64 {
        self.io_micros.load(Ordering::Relaxed)
    }

    pub fn io_counters(&self) -> (&AtomicU64, &AtomicU64) {
        (&self.io_count, &self.io_micros)
    }

    pub fn run_count(&self) -> usize {
        self.runs.read().len()
    }

    /// Returns a snapshot of the run list (newest-first), cheap `Arc` clones.
    pub fn runs_snapshot(&self) -> Vec<Arc<Run>> {
        self.runs.read().clone()
    }

    fn recompute_record_count(runs: &[Arc<Run>]) -> usize {
        runs.iter().map(|r| r.max_records()).sum()
    }

    /// Prepends a run. Fails if doing so would exceed `max_records`.
    pub fn put_front(&self, run: Arc<Run>) -> Result<()> {
        let mut runs = self.runs.write();
        let projected = Self::recompute_record_count(&runs) + run.max_records();
        if projected > self.max_records {
            return Err(TreeError::invariant(format!(
                "level {} would overflow: {} + {} > {}",
                self.level_num,
                Self::recompute_record_count(&runs),
                run.max_records(),
                self.max_records
            ))
            .into());
        }
        runs.insert(0, run);
        self.record_count.store(projected, Ordering::Relaxed);
        Ok(())
    }

    /// `record_count + B <= max_records`.
    pub fn fits_buffer(&self) -> bool {
        self.record_count() + self.buffer_capacity <= self.max_records
    }

    /// `record_count + max_records_of_level(max(1, level_num - 2)) <= max_records`.
    pub fn fits_lower_level(&self) -> bool {
        let ref_level = self.level_num.saturating_sub(2).max(1);
        let ref_max = max_records_for_level(ref_level, self.buffer_capacity, self.fanout);
        self.record_count() + ref_max <= self.max_records
    }

    /// Picks the contiguous window of `n = max(2, round(p * runs.len()))`
    /// runs minimizing the sum of `|last_key(run_i) - first_key(run_{i+1})|`
    /// over adjacent pairs in the window. Ties broken by lowest start index.
    /// Returns `None` if the level has fewer than 2 runs.
    pub fn find_best_segment_to_compact(&self, compaction_percentage: f64) -> Option<(usize, usize)> {
        let runs = self.runs.read();
        if runs.len() < 2 {
            return None;
        }
        let n = ((compaction_percentage * runs.len() as f64).round() as usize).max(2).min(runs.len());

        let mut best: Option<(usize, usize, i64)> = None;
        for start in 0..=(runs.len() - n) {
            let end = start + n - 1;
            let mut cost: i64 = 0;
            for i in start..end {
                let gap = (runs[i].last_key() as i64 - runs[i + 1].first_key() as i64).abs();
                cost += gap;
            }
            if best.map(|(_, _, c)| cost < c).unwrap_or(true) {
                best = Some((start, end, cost));
            }
        }
        best.map(|(s, e, _)| (s, e))
    }

    /// K-way merges runs in the inclusive index window `[start, end]` into a
    /// single new run, dropping tombstones when `is_last_level`.
    pub fn compact_segment(
        &self,
        data_dir: &std::path::Path,
        target_fpr: f64,
        start: usize,
        end: usize,
        is_last_level: bool,
    ) -> Result<Arc<Run>> {
        let window: Vec<Arc<Run>> = {
            let runs = self.runs.read();
            runs[start..=end].to_vec()
        };

        let merge_start = Instant::now();
        let scans: Vec<Vec<Record>> = window.iter().map(|r| r.scan()).collect::<Result<_>>()?;
        let merged = merge_runs(scans, is_last_level);
        let merged_max_records: usize = window.iter().map(|r| r.max_records()).sum();
        let records_per_page = window[0].records_per_page();

        let new_run = Arc::new(Run::create_fresh(
            data_dir,
            merged_max_records.max(merged.len() + 1),
            records_per_page,
        )?);
        new_run.flush(&merged, target_fpr)?;

        self.io_count.fetch_add(1, Ordering::Relaxed);
        self.io_micros
            .fetch_add(merge_start.elapsed().as_micros() as u64, Ordering::Relaxed);

        Ok(new_run)
    }

    /// Deletes the replaced runs' files, splices `new_run` in at `start`,
    /// and recomputes `record_count`.
    pub fn replace_segment(&self, start: usize, end: usize, new_run: Arc<Run>) {
        let mut runs = self.runs.write();
        let removed: Vec<Arc<Run>> = runs.splice(start..=end, std::iter::once(new_run)).collect();
        for r in removed {
            r.delete_file();
        }
        let count = Self::recompute_record_count(&runs);
        self.record_count.store(count, Ordering::Relaxed);
    }

    /// Splices `incoming` (newest-first) onto the front of this level's run
    /// list, without a capacity check -- used by `move_runs` where the
    /// caller has already verified headroom via `fits_lower_level`.
    pub fn splice_front(&self, incoming: Vec<Arc<Run>>) {
        let mut runs = self.runs.write();
        for run in incoming.into_iter().rev() {
            runs.insert(0, run);
        }
        let count = Self::recompute_record_count(&runs);
        self.record_count.store(count, Ordering::Relaxed);
    }

    /// Removes and returns every run currently in this level (newest-first),
    /// leaving the level empty. Used by `move_runs` to drain level `L`
    /// before splicing its runs into `L+1`.
    pub fn take_all_runs(&self) -> Vec<Arc<Run>> {
        let mut runs = self.runs.write();
        let taken = std::mem::take(&mut *runs);
        self.record_count.store(0, Ordering::Relaxed);
        taken
    }

    pub fn set_record_count(&self, count: usize) {
        self.record_count.store(count, Ordering::Relaxed);
    }

    /// Sum of `max_records` for the runs in the inclusive index window
    /// `[start, end]`, used by `move_runs` to decide whether a `PARTIAL`
    /// segment fits in the next level before actually moving it.
    pub fn segment_max_records(&self, start: usize, end: usize) -> usize {
        let runs = self.runs.read();
        runs[start..=end].iter().map(|r| r.max_records()).sum()
    }

    /// Removes and returns the runs in the inclusive index window
    /// `[start, end]` (newest-first order preserved within the window),
    /// leaving the rest of the run list intact. Used by `PARTIAL` moves.
    pub fn take_segment(&self, start: usize, end: usize) -> Vec<Arc<Run>> {
        let mut runs = self.runs.write();
        let taken: Vec<Arc<Run>> = runs.splice(start..=end, std::iter::empty()).collect();
        let count = Self::recompute_record_count(&runs);
        self.record_count.store(count, Ordering::Relaxed);
        taken
    }

    /// Rebuilds this level's run list and counters from manifest-deserialized
    /// parts, bypassing every capacity check (the persisted state is assumed
    /// consistent at the moment it was serialized).
    pub fn restore_runs(&self, runs: Vec<Arc<Run>>, record_count: usize, io_count: u64, io_micros: u64) {
        *self.runs.write() = runs;
        self.record_count.store(record_count, Ordering::Relaxed);
        self.io_count.store(io_count, Ordering::Relaxed);
        self.io_micros.store(io_micros, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "tests/level_tests.rs"]
mod tests;
