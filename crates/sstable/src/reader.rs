//! Random-access and sequential reading of run files.
//!
//! Per the tree's shared-resource policy, a [`RunReader`] does **not** hold
//! a long-lived file descriptor: every read opens the file, seeks, reads,
//! and lets the handle close at the end of the call. This keeps file
//! descriptor usage bounded by concurrent in-flight operations rather than
//! by the number of runs in the tree, which can grow into the thousands
//! across levels.

use anyhow::{bail, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::format::{decode_record, decode_records, Record, RECORD_BYTES};

/// Reads records from an immutable, packed-record run file.
#[derive(Debug, Clone)]
pub struct RunReader {
    path: PathBuf,
    /// Record count, derived once at construction from `file_len / RECORD_BYTES`.
    size: usize,
}

impl RunReader {
    /// Opens `path`, validating that its length is an exact multiple of the
    /// record width, and returns a reader sized accordingly.
    ///
    /// The file is opened only long enough to stat its length; no handle is
    /// retained.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = std::fs::metadata(&path)
            .map_err(|e| anyhow::anyhow!("stat {}: {}", path.display(), e))?
            .len();
        if len % RECORD_BYTES as u64 != 0 {
            bail!(
                "run file {} has size {} which is not a multiple of {}",
                path.display(),
                len,
                RECORD_BYTES
            );
        }
        let size = (len / RECORD_BYTES as u64) as usize;
        Ok(Self { path, size })
    }

    /// Returns the path of the underlying run file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of records in the run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the run holds zero records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Reads the record at `idx`, a single seek + read of 8 bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `idx >= len()` or on I/O failure.
    pub fn read_at(&self, idx: usize) -> Result<Record> {
        if idx >= self.size {
            bail!(
                "index {} out of range for run {} with {} records",
                idx,
                self.path.display(),
                self.size
            );
        }
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start((idx * RECORD_BYTES) as u64))?;
        let mut buf = [0u8; RECORD_BYTES];
        file.read_exact(&mut buf)?;
        Ok(decode_record(&buf))
    }

    /// Reads records `[start_idx, end_idx)` sequentially in a single pass.
    ///
    /// `end_idx` is clamped to `len()`. Returns an empty vector if
    /// `start_idx >= end_idx` after clamping.
    pub fn read_range(&self, start_idx: usize, end_idx: usize) -> Result<Vec<Record>> {
        let end_idx = end_idx.min(self.size);
        if start_idx >= end_idx {
            return Ok(Vec::new());
        }
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start((start_idx * RECORD_BYTES) as u64))?;
        let count = end_idx - start_idx;
        let mut buf = vec![0u8; count * RECORD_BYTES];
        file.read_exact(&mut buf)?;
        Ok(decode_records(&buf)?)
    }

    /// Reads the entire run into memory in ascending key order.
    ///
    /// Used by compaction (to feed the k-way merge) and by statistics
    /// reporting; not on the point-lookup hot path.
    pub fn scan(&self) -> Result<Vec<Record>> {
        self.read_range(0, self.size)
    }
}

#[cfg(test)]
#[path = "tests/reader_tests.rs"]
mod tests;
