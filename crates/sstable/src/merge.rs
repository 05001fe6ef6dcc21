//! K-way merge of sorted record streams, used by compaction.
//!
//! Implements the priority-queue merge design: a binary heap keyed by
//! `(key, run_index)`, where a smaller `run_index` denotes a *newer* run
//! (runs are conventionally stored newest-first, so index 0 is the most
//! recent). On a tie the newest entry wins and every older duplicate for
//! that key is silently dropped, never surfacing in the merged output.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::format::{Record, TOMBSTONE};

#[derive(Debug, Eq, PartialEq)]
struct HeapEntry {
    key: i32,
    run_idx: usize,
    value: i32,
}

// `BinaryHeap` is a max-heap; implement `Ord` so the *smallest* `(key,
// run_idx)` pair compares greatest, making it the one `peek`/`pop` return.
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.run_idx.cmp(&self.run_idx))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Streams a sorted, deduplicated merge over several sorted record vectors.
///
/// `runs[0]` is treated as the newest source, `runs[runs.len() - 1]` as the
/// oldest -- matching the tree's newest-first run ordering. When the same
/// key appears in more than one source, only the copy from the
/// numerically-smallest index (the newest run) survives.
pub struct MergeIterator {
    heap: BinaryHeap<HeapEntry>,
    iters: Vec<std::vec::IntoIter<Record>>,
}

impl MergeIterator {
    /// Builds a merge iterator over `runs`, each already sorted ascending
    /// by key with unique keys within itself.
    #[must_use]
    pub fn new(runs: Vec<Vec<Record>>) -> Self {
        let mut iters: Vec<std::vec::IntoIter<Record>> =
            runs.into_iter().map(|v| v.into_iter()).collect();
        let mut heap = BinaryHeap::with_capacity(iters.len());
        for (run_idx, it) in iters.iter_mut().enumerate() {
            if let Some((key, value)) = it.next() {
                heap.push(HeapEntry {
                    key,
                    run_idx,
                    value,
                });
            }
        }
        Self { heap, iters }
    }

    fn refill(&mut self, run_idx: usize) {
        if let Some((key, value)) = self.iters[run_idx].next() {
            self.heap.push(HeapEntry {
                key,
                run_idx,
                value,
            });
        }
    }
}

impl Iterator for MergeIterator {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let winner = self.heap.pop()?;
        self.refill(winner.run_idx);

        // Drop every other pending entry for the same key -- they come
        // from older runs and are shadowed by the winner.
        while let Some(top) = self.heap.peek() {
            if top.key != winner.key {
                break;
            }
            let shadowed = self.heap.pop().unwrap();
            self.refill(shadowed.run_idx);
        }

        Some((winner.key, winner.value))
    }
}

/// Merges `runs` (newest-first) into a single sorted, deduplicated vector.
///
/// When `drop_tombstones` is `true` (the terminal-level case per the
/// tree's compaction rule), records whose value is [`TOMBSTONE`] are
/// omitted from the output entirely rather than carried forward.
#[must_use]
pub fn merge_runs(runs: Vec<Vec<Record>>, drop_tombstones: bool) -> Vec<Record> {
    MergeIterator::new(runs)
        .filter(|&(_, value)| !(drop_tombstones && value == TOMBSTONE))
        .collect()
}

#[cfg(test)]
#[path = "tests/merge_tests.rs"]
mod tests;
