//! Error kinds for the tree's public API boundary.
//!
//! A small `thiserror`-derived enum for the error *kinds* the tree itself
//! distinguishes, propagated
//! everywhere else through `anyhow::Result`. "Not found" is deliberately not
//! a variant here -- it is represented as `Option`/`Result` the way the rest
//! of the call chain already expects.

use thiserror::Error;

/// The error kinds the tree itself raises, as opposed to I/O errors bubbled
/// up unchanged from the filesystem.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Malformed command input: out-of-range key/value, bad arguments.
    #[error("input error: {0}")]
    InputError(String),

    /// An I/O failure reading or writing a run file or the manifest.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A violated internal invariant (negative level, overflowing a full
    /// run, etc). Fatal -- the tree has no WAL and cannot repair partial
    /// compactions.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl TreeError {
    pub fn input<S: Into<String>>(msg: S) -> Self {
        TreeError::InputError(msg.into())
    }

    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        TreeError::Invariant(msg.into())
    }
}
