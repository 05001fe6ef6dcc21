//! Write path: `put`, `del`.
//!
//! Try the buffer first; on overflow, snapshot + clear + accept into the
//! fresh buffer,
//! then flush the snapshot to a new level-1 run, possibly cascading a
//! `move_runs` first if level 1 itself has no room for another buffer's
//! worth of records.

use crate::compaction;
use crate::executor::Executor;
use crate::run::Run;
use crate::Tree;
use anyhow::Result;
use memtable::PutOutcome;
use sstable::TOMBSTONE;
use std::sync::Arc;

impl<E: Executor> Tree<E> {
    /// Inserts `(key, value)`. Writing the tombstone value directly is
    /// undefined behavior; callers wanting a delete should use
    /// [`Tree::del`].
    pub fn put(&self, key: i32, value: i32) -> Result<()> {
        self.stats.bump_command_counter(self.config.throughput_reporting_frequency);

        {
            let mut buffer = self.buffer.write();
            if buffer.put(key, value) == PutOutcome::Accepted {
                return Ok(());
            }
        }

        let (snapshot, snapshot_capacity) = {
            let mut buffer = self.buffer.write();
            let snapshot = buffer.snapshot();
            let capacity = buffer.capacity();
            buffer.clear();
            buffer.put(key, value);
            (snapshot, capacity)
        };

        self.flush_snapshot_to_level_one(snapshot, snapshot_capacity)
    }

    /// Deletes `key` -- sugar for `put(key, TOMBSTONE)`.
    pub fn del(&self, key: i32) -> Result<()> {
        self.put(key, TOMBSTONE)
    }

    fn flush_snapshot_to_level_one(&self, snapshot: Vec<(i32, i32)>, snapshot_capacity: usize) -> Result<()> {
        let level1 = self.ensure_level(1);

        if !level1.fits_buffer() {
            let _guard = self.move_runs_lock.lock();
            compaction::move_runs(self, 1)?;
        }

        let existing_run_count = level1.run_count();
        let should_merge_on_flush = existing_run_count > 0
            && (level1.policy() == config::Policy::Leveled
                || (level1.policy() == config::Policy::LazyLeveled && self.is_last_level(1)));
        if should_merge_on_flush {
            self.compaction_plan.lock().insert(1, (0, existing_run_count));
        }

        let new_run = Arc::new(Run::create_fresh(
            &self.config.data_dir,
            snapshot_capacity.max(snapshot.len() + 1),
            self.config.records_per_page(),
        )?);
        new_run.flush(&snapshot, self.config.bloom_fpr)?;
        level1.put_front(new_run)?;

        compaction::execute_compaction_plan(self)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/write_tests.rs"]
mod tests;
