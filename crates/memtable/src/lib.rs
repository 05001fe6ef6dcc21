//! # Memtable (Buffer)
//!
//! The sole mutable store for fresh writes in the RiptideKV LSM tree.
//!
//! The memtable is an ordered in-memory map of fixed-width 32-bit signed
//! integer keys to 32-bit signed integer values, bounded by a capacity `B`
//! (a count of records, not bytes). It is the first point of contact for
//! every `put`; once it fills up, the tree snapshots it into an immutable
//! on-disk [run](https://docs.rs/sstable) and starts a fresh, empty buffer.
//!
//! ## Key properties
//! - **Sorted order**: entries are always in ascending key order, so
//!   [`snapshot`](Memtable::snapshot) can be written straight to a run file
//!   with no re-sort.
//! - **Bounded capacity**: `put` never silently grows past `B`; once full it
//!   reports [`PutOutcome::Full`] and the caller (the `Tree`) is responsible
//!   for rotating the buffer.
//! - **Tombstones are just values**: the reserved sentinel `i32::MIN` marks a
//!   logical delete. The memtable does not special-case it -- callers
//!   (the `Tree`) translate it to "absent" on read.
//!
//! ## Example
//! ```rust
//! use memtable::{Memtable, PutOutcome};
//!
//! let mut m = Memtable::new(4);
//! assert_eq!(m.put(1, 10), PutOutcome::Accepted);
//! assert_eq!(m.get(1), Some(10));
//! ```

use std::collections::BTreeMap;

/// The reserved sentinel value marking a logical delete.
///
/// Writing this literal value as a genuine user value is undefined per the
/// tree's data model; callers validate against it before it ever reaches
/// the memtable.
pub const TOMBSTONE: i32 = i32::MIN;

/// The result of a [`Memtable::put`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The key/value pair was inserted (or an existing key overwritten).
    Accepted,
    /// The buffer is at capacity and does not already hold this key; the
    /// caller must flush and retry against a fresh buffer.
    Full,
}

/// An ordered, bounded in-memory write buffer backed by a `BTreeMap`.
///
/// Invariants: keys are unique, and `len() <= capacity()` always holds.
#[derive(Debug, Clone)]
pub struct Memtable {
    map: BTreeMap<i32, i32>,
    capacity: usize,
}

impl Memtable {
    /// Creates a new, empty memtable with capacity for `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            map: BTreeMap::new(),
            capacity,
        }
    }

    /// Inserts or overwrites `key` with `value`.
    ///
    /// If `key` already exists, it is overwritten regardless of capacity
    /// (overwriting never grows the record count). Otherwise, if the buffer
    /// has room, the pair is inserted. If the buffer is full and `key` is
    /// new, nothing is inserted and [`PutOutcome::Full`] is returned -- the
    /// caller must treat this as the flush trigger, not retry blindly.
    pub fn put(&mut self, key: i32, value: i32) -> PutOutcome {
        if self.map.contains_key(&key) {
            self.map.insert(key, value);
            return PutOutcome::Accepted;
        }
        if self.map.len() >= self.capacity {
            return PutOutcome::Full;
        }
        self.map.insert(key, value);
        PutOutcome::Accepted
    }

    /// Returns the value for `key`, if present. Tombstones are returned as
    /// ordinary values (`Some(TOMBSTONE)`); translating them to "absent" is
    /// the caller's responsibility.
    #[must_use]
    pub fn get(&self, key: i32) -> Option<i32> {
        self.map.get(&key).copied()
    }

    /// Returns the ordered subset of records with `lo <= key < hi`.
    #[must_use]
    pub fn range(&self, lo: i32, hi: i32) -> Vec<(i32, i32)> {
        if lo >= hi {
            return Vec::new();
        }
        self.map
            .range(lo..hi)
            .map(|(&k, &v)| (k, v))
            .collect()
    }

    /// Removes every entry, resetting the buffer to empty. Capacity is
    /// unchanged.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Returns an ordered copy of every record currently buffered, suitable
    /// for flushing to a run file without re-sorting.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(i32, i32)> {
        self.map.iter().map(|(&k, &v)| (k, v)).collect()
    }

    /// Returns the number of records currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the buffer holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns `true` if the buffer holds `capacity()` records.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.map.len() >= self.capacity
    }

    /// Returns the configured capacity `B`.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the smallest key in the buffer, if non-empty.
    #[must_use]
    pub fn min_key(&self) -> Option<i32> {
        self.map.keys().next().copied()
    }

    /// Returns the largest key in the buffer, if non-empty.
    #[must_use]
    pub fn max_key(&self) -> Option<i32> {
        self.map.keys().next_back().copied()
    }
}
