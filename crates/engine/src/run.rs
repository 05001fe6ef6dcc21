//! An immutable, sorted, on-disk run augmented with a Bloom filter and a
//! sparse fence-pointer index.
//!
//! A run is written exactly once (`flush`), then read-only for the rest of
//! its life. Per-run locks are collapsed into a single [`parking_lot::RwLock`]
//! around the mutable metadata (size, key extremes, fence pointers, Bloom
//! filter) rather than one lock per field, since the whole bundle changes
//! together on every flush. `true_positives`/`false_positives` are plain
//! atomics since they are incremented far more often than the rest of the
//! metadata changes.

use crate::error::TreeError;
use anyhow::{Context, Result};
use bloom::BloomFilter;
use parking_lot::RwLock;
use sstable::{Record, RunReader, RunWriter, TOMBSTONE};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A run's mutable metadata, all populated in one shot by [`Run::flush`].
struct RunMeta {
    size: usize,
    fence_pointers: Vec<i32>,
    max_key: i32,
    first_key: i32,
    last_key: i32,
    bloom: BloomFilter,
    flushed: bool,
}

/// An immutable sorted run, backed by a single `.bin` file.
pub struct Run {
    file_path: PathBuf,
    max_records: usize,
    records_per_page: usize,
    meta: RwLock<RunMeta>,
    true_positives: AtomicU64,
    false_positives: AtomicU64,
}

/// The outcome of a single point lookup against a run, used by the tree to
/// bump its own hit/miss counters without re-deriving the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Hit(i32),
    BloomNegative,
    Miss,
}

impl Run {
    /// Allocates a fresh, empty run file under `dir`, ready for [`flush`](Self::flush).
    pub fn create_fresh(
        dir: &Path,
        max_records: usize,
        records_per_page: usize,
    ) -> Result<Self> {
        let (path, file) = RunWriter::create_fresh(dir, "run")?;
        drop(file);
        Ok(Self {
            file_path: path,
            max_records,
            records_per_page: records_per_page.max(1),
            meta: RwLock::new(RunMeta {
                size: 0,
                fence_pointers: Vec::new(),
                max_key: i32::MIN,
                first_key: i32::MIN,
                last_key: i32::MIN,
                bloom: BloomFilter::with_bits(0, 1),
                flushed: false,
            }),
            true_positives: AtomicU64::new(0),
            false_positives: AtomicU64::new(0),
        })
    }

    /// Rebuilds a run from manifest-deserialized parts, skipping the write
    /// path entirely (the file already exists on disk).
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        file_path: PathBuf,
        max_records: usize,
        records_per_page: usize,
        size: usize,
        fence_pointers: Vec<i32>,
        max_key: i32,
        first_key: i32,
        last_key: i32,
        bloom: BloomFilter,
        true_positives: u64,
        false_positives: u64,
    ) -> Self {
        Self {
            file_path,
            max_records,
            records_per_page: records_per_page.max(1),
            meta: RwLock::new(RunMeta {
                size,
                fence_pointers,
                max_key,
                first_key,
                last_key,
                bloom,
                flushed: true,
            }),
            true_positives: AtomicU64::new(true_positives),
            false_positives: AtomicU64::new(false_positives),
        }
    }

    /// Writes `records` (already sorted ascending, unique keys) to the run's
    /// file, building the Bloom filter and fence pointers in the same pass.
    ///
    /// Irrevocable: a run may be flushed exactly once. Fails if the run was
    /// already flushed, or if `records.len() >= max_records` at entry.
    pub fn flush(&self, records: &[Record], target_fpr: f64) -> Result<()> {
        let mut meta = self.meta.write();
        if meta.flushed {
            return Err(TreeError::invariant(format!(
                "run at {} was already flushed",
                self.file_path.display()
            ))
            .into());
        }
        if records.len() >= self.max_records {
            return Err(TreeError::invariant(format!(
                "refusing to flush {} records into a run with max_records {}",
                records.len(),
                self.max_records
            ))
            .into());
        }

        let mut bloom = if records.is_empty() {
            BloomFilter::with_bits(0, 1)
        } else {
            BloomFilter::new(records.len(), target_fpr)
        };
        let mut fence_pointers = Vec::with_capacity(records.len() / self.records_per_page + 1);
        let mut max_key = i32::MIN;

        for (idx, &(key, _value)) in records.iter().enumerate() {
            bloom.insert(key);
            if idx % self.records_per_page == 0 {
                fence_pointers.push(key);
            }
            max_key = max_key.max(key);
        }

        let (first_key, last_key) = match (records.first(), records.last()) {
            (Some(&(f, _)), Some(&(l, _))) => (f, l),
            _ => (i32::MIN, i32::MIN),
        };

        let (_path, mut file) = (
            self.file_path.clone(),
            std::fs::OpenOptions::new()
                .write(true)
                .open(&self.file_path)
                .with_context(|| format!("reopening run file {}", self.file_path.display()))?,
        );
        RunWriter::write_all(&mut file, records)?;

        meta.size = records.len();
        meta.fence_pointers = fence_pointers;
        meta.max_key = max_key;
        meta.first_key = first_key;
        meta.last_key = last_key;
        meta.bloom = bloom;
        meta.flushed = true;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    pub fn records_per_page(&self) -> usize {
        self.records_per_page
    }

    pub fn size(&self) -> usize {
        self.meta.read().size
    }

    pub fn max_key(&self) -> i32 {
        self.meta.read().max_key
    }

    pub fn first_key(&self) -> i32 {
        self.meta.read().first_key
    }

    pub fn last_key(&self) -> i32 {
        self.meta.read().last_key
    }

    pub fn fence_pointers(&self) -> Vec<i32> {
        self.meta.read().fence_pointers.clone()
    }

    pub fn true_positives(&self) -> u64 {
        self.true_positives.load(Ordering::Relaxed)
    }

    pub fn false_positives(&self) -> u64 {
        self.false_positives.load(Ordering::Relaxed)
    }

    pub fn bloom_num_bits(&self) -> u64 {
        self.meta.read().bloom.num_bits()
    }

    pub fn bloom_num_hashes(&self) -> u32 {
        self.meta.read().bloom.num_hashes()
    }

    pub fn bloom_theoretical_fpr(&self) -> f64 {
        let meta = self.meta.read();
        meta.bloom.theoretical_fpr(meta.size)
    }

    pub fn bloom_bits_as_json(&self) -> Vec<u8> {
        self.meta.read().bloom.bits_as_json()
    }

    /// Resizes this run's Bloom filter to `new_bits` and repopulates it by
    /// rescanning the run file. Used by the MONKEY autotuner.
    pub fn resize_bloom_and_repopulate(&self, new_bits: u64) -> Result<()> {
        let records = self.scan()?;
        let mut meta = self.meta.write();
        meta.bloom.resize(new_bits);
        for &(key, _) in &records {
            meta.bloom.insert(key);
        }
        Ok(())
    }

    /// Point lookup.
    ///
    /// Fast-rejects on an empty run, a key below the first fence pointer, a
    /// key above `max_key`, or a Bloom-filter negative -- in that order, so
    /// none of those paths touch disk. On a Bloom-filter pass, binary
    /// searches the fence pointers for the candidate page, then binary
    /// searches within that page on disk.
    pub fn get(&self, key: i32, level_io_count: &AtomicU64, level_io_micros: &AtomicU64) -> Result<LookupOutcome> {
        let (size, fence_pointers, max_key, first_fence, bloom_maybe) = {
            let meta = self.meta.read();
            if meta.size == 0 {
                return Ok(LookupOutcome::Miss);
            }
            let first_fence = meta.fence_pointers[0];
            if key < first_fence || key > meta.max_key {
                return Ok(LookupOutcome::Miss);
            }
            if !meta.bloom.contains(key) {
                return Ok(LookupOutcome::BloomNegative);
            }
            (
                meta.size,
                meta.fence_pointers.clone(),
                meta.max_key,
                first_fence,
                true,
            )
        };
        let _ = (max_key, first_fence, bloom_maybe);

        let start = Instant::now();
        let page = upper_bound_page(&fence_pointers, key);
        let page_start = page * self.records_per_page;
        let page_end = (page_start + self.records_per_page).min(size);

        let reader = RunReader::open(&self.file_path)?;
        let page_records = reader.read_range(page_start, page_end)?;
        let found = page_records
            .binary_search_by_key(&key, |&(k, _)| k)
            .ok()
            .map(|idx| page_records[idx].1);

        level_io_count.fetch_add(1, Ordering::Relaxed);
        level_io_micros.fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);

        match found {
            Some(value) => {
                self.true_positives.fetch_add(1, Ordering::Relaxed);
                Ok(LookupOutcome::Hit(value))
            }
            None => {
                self.false_positives.fetch_add(1, Ordering::Relaxed);
                Ok(LookupOutcome::Miss)
            }
        }
    }

    /// Range scan: `lo <= key < hi`.
    pub fn range(
        &self,
        lo: i32,
        hi: i32,
        level_io_count: &AtomicU64,
        level_io_micros: &AtomicU64,
    ) -> Result<Vec<Record>> {
        let (size, fence_pointers, max_key) = {
            let meta = self.meta.read();
            if meta.size == 0 || meta.fence_pointers.is_empty() {
                return Ok(Vec::new());
            }
            if hi <= meta.fence_pointers[0] || lo > meta.max_key {
                return Ok(Vec::new());
            }
            (meta.size, meta.fence_pointers.clone(), meta.max_key)
        };
        let _ = max_key;

        let start = Instant::now();
        let page = upper_bound_page(&fence_pointers, lo);
        let page_start = page * self.records_per_page;

        let reader = RunReader::open(&self.file_path)?;
        let tail = reader.read_range(page_start, size)?;

        level_io_count.fetch_add(1, Ordering::Relaxed);
        level_io_micros.fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);

        let mut out = Vec::new();
        for (k, v) in tail {
            if k >= hi {
                break;
            }
            if k >= lo {
                out.push((k, v));
            }
        }
        Ok(out)
    }

    /// Returns the run's full contents in ascending key order.
    pub fn scan(&self) -> Result<Vec<Record>> {
        let reader = RunReader::open(&self.file_path)?;
        reader.scan()
    }

    /// Deletes the run's underlying file. Called by [`crate::level::Level::replace_segment`]
    /// after the run has been spliced out of its level's run list.
    pub fn delete_file(&self) {
        let _ = std::fs::remove_file(&self.file_path);
    }
}

/// Returns the index of the last fence-pointer page whose key is `<= key`,
/// clamped to 0. Equivalent to an upper-bound binary search.
fn upper_bound_page(fence_pointers: &[i32], key: i32) -> usize {
    match fence_pointers.binary_search(&key) {
        Ok(idx) => idx,
        Err(0) => 0,
        Err(idx) => idx - 1,
    }
}

/// True if `value` is the reserved tombstone sentinel.
#[inline]
pub fn is_tombstone(value: i32) -> bool {
    value == TOMBSTONE
}

#[cfg(test)]
#[path = "tests/run_tests.rs"]
mod tests;
