//! Read path: `get`, `range`.
//!
//! Point lookups consult the buffer first (freshest data, tombstones
//! authoritative), then each level's runs newest-first; the first match
//! wins. Range scans fan per-run probes out across the executor and merge
//! results through a min-heap keyed by key, newest source wins ties.

use crate::executor::Executor;
use crate::run::LookupOutcome;
use crate::{Run, Tree};
use anyhow::Result;
use sstable::TOMBSTONE;
use std::sync::Arc;

impl<E: Executor> Tree<E> {
    /// Looks up `key`, returning `Some(value)` if present and live.
    pub fn get(&self, key: i32) -> Result<Option<i32>> {
        // i32 already bounds every representable key; the only "out of
        // range" input is the reserved tombstone sentinel itself, which is
        // not a valid user key to look up by convention but is otherwise
        // just another i32 here -- no range check is needed beyond the
        // type system.

        {
            let buffer = self.buffer.read();
            if let Some(value) = buffer.get(key) {
                self.stats.record_get_hit();
                return Ok(if value == TOMBSTONE { None } else { Some(value) });
            }
        }

        let levels = self.levels.read().clone();
        for level in &levels {
            let (io_count, io_micros) = level.io_counters();
            for run in level.runs_snapshot() {
                match run.get(key, io_count, io_micros)? {
                    LookupOutcome::Hit(value) => {
                        self.stats.record_bloom_check(false);
                        self.stats.record_get_hit();
                        return Ok(if value == TOMBSTONE { None } else { Some(value) });
                    }
                    LookupOutcome::BloomNegative => {
                        self.stats.record_bloom_check(true);
                        continue;
                    }
                    LookupOutcome::Miss => {
                        self.stats.record_bloom_check(false);
                        continue;
                    }
                }
            }
        }

        self.stats.record_get_miss();
        Ok(None)
    }

    /// Returns every live `(key, value)` with `lo <= key < hi`, in ascending
    /// key order. Swaps `lo`/`hi` if `lo > hi`; returns empty if `lo == hi`.
    pub fn range(&self, lo: i32, hi: i32) -> Result<Vec<(i32, i32)>> {
        let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };
        if lo == hi {
            return Ok(Vec::new());
        }

        // (key, arrival_rank) ordered so the heap pops ascending key, and
        // for equal keys the lowest arrival_rank (the newest source) wins.
        // rank 0 is reserved for the buffer, the freshest source.
        let mut best: std::collections::BTreeMap<i32, (u32, i32)> = std::collections::BTreeMap::new();
        let mut consider = |key: i32, value: i32, rank: u32| {
            best.entry(key)
                .and_modify(|slot| {
                    if rank < slot.0 {
                        *slot = (rank, value);
                    }
                })
                .or_insert((rank, value));
        };

        {
            let buffer = self.buffer.read();
            for (k, v) in buffer.range(lo, hi) {
                consider(k, v, 0);
            }
        }

        let levels = self.levels.read().clone();
        let mut rank: u32 = 1;
        for level in &levels {
            let (io_count, io_micros) = level.io_counters();
            let runs: Vec<Arc<Run>> = level.runs_snapshot();
            let tasks: Vec<_> = runs
                .iter()
                .cloned()
                .map(|run| {
                    let lo = lo;
                    let hi = hi;
                    move || run.range(lo, hi, io_count, io_micros)
                })
                .collect();
            let results = self.executor.map(tasks);
            for (run_idx, result) in results.into_iter().enumerate() {
                let records = result?;
                for (k, v) in records {
                    consider(k, v, rank + run_idx as u32);
                }
            }
            rank += runs.len() as u32;
        }

        let out: Vec<(i32, i32)> = best
            .into_iter()
            .filter_map(|(k, (_, v))| if v == TOMBSTONE { None } else { Some((k, v)) })
            .collect();
        Ok(out)
    }
}

#[cfg(test)]
#[path = "tests/read_tests.rs"]
mod tests;
