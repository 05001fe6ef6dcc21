//! # config - startup configuration and storage-tier table
//!
//! Everything the tree needs to know before it opens its first level:
//! the Bloom false-positive target, the memtable's capacity in pages, the
//! fan-out between levels, the level-merge policy, the executor width, the
//! `PARTIAL` policy's compaction percentage, the data directory, and the
//! two reporting frequencies (verbose benchmarking, throughput). Parsing
//! itself (argv -> [`Config`]) is deliberately thin -- only the
//! configuration *values* are load-bearing for the tree, not the argv
//! surface that produces them.
//!
//! [`Cli`] is the `clap`-derived argv surface; [`Config`] is a plain struct
//! usable independent of the CLI (tests construct it directly via
//! [`Config::default`] or its builder methods).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod storage_tier;
pub use storage_tier::{storage_tier_for_level, StorageTier, STORAGE_TIERS};

/// The level-merge policy governing how runs accumulate and compact on
/// promotion from one level to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Batch-only: runs accumulate up to the fan-out, then merge as a unit.
    Tiered,
    /// Single-run levels: every promotion immediately merges with existing content.
    Leveled,
    /// Tiered everywhere except the last level, which behaves like Leveled.
    LazyLeveled,
    /// Merge a chosen key-contiguous window to reduce write amplification.
    Partial,
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Policy::Tiered => "TIERED",
            Policy::Leveled => "LEVELED",
            Policy::LazyLeveled => "LAZY_LEVELED",
            Policy::Partial => "PARTIAL",
        };
        f.write_str(s)
    }
}

/// Default target false-positive rate for every run's Bloom filter.
pub const DEFAULT_BLOOM_FPR: f64 = 1e-5;

/// Default memtable capacity, expressed in pages.
pub const DEFAULT_BUFFER_PAGES: usize = 1;

/// Default level fan-out.
pub const DEFAULT_FANOUT: u32 = 2;

/// Default number of executor worker threads.
pub const DEFAULT_EXECUTOR_WIDTH: usize = 4;

/// Default fraction of a level's runs considered for a `PARTIAL` compaction.
pub const DEFAULT_COMPACTION_PERCENTAGE: f64 = 0.5;

/// Default data directory, relative to the process's working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// The tree's full startup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Target Bloom filter false-positive rate for freshly-flushed runs.
    pub bloom_fpr: f64,
    /// Memtable capacity, expressed as a number of disk pages.
    pub buffer_pages: usize,
    /// The OS page size in bytes, used to convert `buffer_pages` and a
    /// run's record count into a page count for fence pointers.
    pub page_size: usize,
    /// Fan-out `T` between adjacent levels; must be `>= 2`.
    pub fanout: u32,
    /// The level-merge policy applied tree-wide (and per-level for
    /// `LAZY_LEVELED`'s last-level exception).
    pub policy: Policy,
    /// Number of worker threads backing the executor used for parallel
    /// per-run range probes and per-level compaction fan-out.
    pub executor_width: usize,
    /// Fraction `p` of a level's runs considered when `PARTIAL` selects a
    /// contiguous compaction window: `n = max(2, round(p * runs.len()))`.
    pub compaction_percentage: f64,
    /// Directory holding the manifest and every run's `.bin` file.
    pub data_dir: PathBuf,
    /// When non-zero, the `b` (benchmark) command logs progress every this
    /// many lines of the workload file.
    pub verbose_benchmark_frequency: u64,
    /// When non-zero, the tree logs a commands/second figure every this
    /// many served commands. Zero disables throughput reporting.
    pub throughput_reporting_frequency: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bloom_fpr: DEFAULT_BLOOM_FPR,
            buffer_pages: DEFAULT_BUFFER_PAGES,
            page_size: os_page_size(),
            fanout: DEFAULT_FANOUT,
            policy: Policy::Leveled,
            executor_width: DEFAULT_EXECUTOR_WIDTH,
            compaction_percentage: DEFAULT_COMPACTION_PERCENTAGE,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            verbose_benchmark_frequency: 0,
            throughput_reporting_frequency: 0,
        }
    }
}

impl Config {
    /// Validates the configuration, returning a descriptive error for the
    /// first invariant violated.
    ///
    /// This is an input-error check: malformed startup flags are reported
    /// to the operator, not treated as a fatal invariant violation inside
    /// the tree itself.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fanout < 2 {
            anyhow::bail!("fanout must be >= 2, got {}", self.fanout);
        }
        if !(0.0..1.0).contains(&self.bloom_fpr) || self.bloom_fpr <= 0.0 {
            anyhow::bail!("bloom_fpr must be in (0, 1), got {}", self.bloom_fpr);
        }
        if self.buffer_pages == 0 {
            anyhow::bail!("buffer_pages must be >= 1");
        }
        if self.page_size == 0 {
            anyhow::bail!("page_size must be >= 1");
        }
        if self.executor_width == 0 {
            anyhow::bail!("executor_width must be >= 1");
        }
        if !(0.0..=1.0).contains(&self.compaction_percentage) {
            anyhow::bail!(
                "compaction_percentage must be in [0, 1], got {}",
                self.compaction_percentage
            );
        }
        Ok(())
    }

    /// The memtable's capacity `B`, in records: `buffer_pages * records_per_page`.
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_pages * self.records_per_page().max(1)
    }

    /// How many fixed-width 8-byte records fit in one OS page -- the unit
    /// a run's fence pointers are spaced by.
    #[must_use]
    pub fn records_per_page(&self) -> usize {
        (self.page_size / 8).max(1)
    }
}

/// Returns the OS page size in bytes.
///
/// On Unix this is `sysconf(_SC_PAGESIZE)`; elsewhere it falls back to the
/// common default of 4 KiB.
#[must_use]
pub fn os_page_size() -> usize {
    #[cfg(unix)]
    {
        let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if n > 0 {
            return n as usize;
        }
    }
    4096
}

/// `clap`-derived command-line surface for the `cli` server binary.
///
/// Kept separate from [`Config`] so the engine and its tests never need to
/// depend on `clap`; [`Cli::into_config`] is the one conversion point.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "riptidekv", about = "RiptideKV LSM-tree storage server")]
pub struct Cli {
    /// Target Bloom filter false-positive rate.
    #[arg(long, default_value_t = DEFAULT_BLOOM_FPR)]
    pub bloom_fpr: f64,

    /// Memtable capacity in pages.
    #[arg(long, default_value_t = DEFAULT_BUFFER_PAGES)]
    pub buffer_pages: usize,

    /// Fan-out between adjacent levels (must be >= 2).
    #[arg(long, default_value_t = DEFAULT_FANOUT)]
    pub fanout: u32,

    /// Level-merge policy.
    #[arg(long, value_enum, default_value_t = Policy::Leveled)]
    pub policy: Policy,

    /// Number of executor worker threads.
    #[arg(long, default_value_t = DEFAULT_EXECUTOR_WIDTH)]
    pub executor_width: usize,

    /// `PARTIAL` policy compaction percentage, in [0, 1].
    #[arg(long, default_value_t = DEFAULT_COMPACTION_PERCENTAGE)]
    pub compaction_percentage: f64,

    /// Directory to store the manifest and run files in.
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Log workload progress every N lines when running `b` (0 disables).
    #[arg(long, default_value_t = 0)]
    pub verbose_benchmark_frequency: u64,

    /// Log a commands/second figure every N served commands (0 disables).
    #[arg(long, default_value_t = 0)]
    pub throughput_reporting_frequency: u64,

    /// TCP port the command-protocol server listens on.
    #[arg(long, default_value_t = 9090)]
    pub port: u16,
}

impl Cli {
    /// Converts parsed command-line arguments into a [`Config`], using the
    /// OS page size (not an argv flag -- it comes from the platform, not
    /// the operator).
    #[must_use]
    pub fn into_config(self) -> Config {
        Config {
            bloom_fpr: self.bloom_fpr,
            buffer_pages: self.buffer_pages,
            page_size: os_page_size(),
            fanout: self.fanout,
            policy: self.policy,
            executor_width: self.executor_width,
            compaction_percentage: self.compaction_percentage,
            data_dir: self.data_dir,
            verbose_benchmark_frequency: self.verbose_benchmark_frequency,
            throughput_reporting_frequency: self.throughput_reporting_frequency,
        }
    }
}
