//! Fresh run-file allocation and sequential record writing.

use anyhow::{Context, Result};
use rand::Rng;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::format::{encode_record, Record};

/// How many times [`RunWriter::create_fresh`] retries on a filename
/// collision before giving up. Collisions are only expected under very
/// heavy concurrent flush/compaction load; this bound exists so a corrupt
/// or adversarial data directory cannot hang the tree forever.
const MAX_CREATE_ATTEMPTS: u32 = 1000;

/// Allocates and writes immutable run files.
///
/// The writer is stateless -- both methods are plain functions grouped
/// under a unit struct for symmetry with [`crate::reader::RunReader`].
pub struct RunWriter;

impl RunWriter {
    /// Creates a uniquely-named, empty file under `dir` and returns its path
    /// together with an open handle for writing.
    ///
    /// The filename combines `prefix` with a random `u64` suffix. The file
    /// is opened with `create_new` so two concurrent callers can never open
    /// the same path; on a collision (astronomically unlikely, but the
    /// random suffix makes it possible) a new suffix is drawn and the open
    /// is retried.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be created, or if no unique
    /// filename could be allocated within [`MAX_CREATE_ATTEMPTS`] attempts.
    pub fn create_fresh(dir: &Path, prefix: &str) -> Result<(PathBuf, File)> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating data directory {}", dir.display()))?;

        let mut rng = rand::thread_rng();
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let suffix: u64 = rng.gen();
            let path = dir.join(format!("{prefix}-{suffix}.bin"));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("creating run file {}", path.display()))
                }
            }
        }
        anyhow::bail!(
            "could not allocate a unique run filename under {} after {} attempts",
            dir.display(),
            MAX_CREATE_ATTEMPTS
        );
    }

    /// Writes `records` sequentially to `file` as packed 8-byte pairs.
    ///
    /// Records are assumed to already be sorted ascending by key; the
    /// writer performs no sorting or deduplication of its own. The file is
    /// flushed and fsynced before returning so the run is durable the
    /// instant the call succeeds.
    pub fn write_all(file: &mut File, records: &[Record]) -> Result<()> {
        let mut w = BufWriter::new(file);
        for &record in records {
            w.write_all(&encode_record(record))?;
        }
        w.flush()?;
        w.into_inner()
            .map_err(|e| anyhow::anyhow!("flushing run file: {}", e.error()))?
            .sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/writer_tests.rs"]
mod tests;
