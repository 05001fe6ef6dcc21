//! Run file binary format: a packed sequence of fixed-width records.
//!
//! ```text
//! [key: i32 LE][value: i32 LE]  [key: i32 LE][value: i32 LE]  ...
//! ```
//!
//! There is no header, footer, magic, or padding. File size is always
//! exactly `RECORD_BYTES * record_count`. The format is append-only during
//! a single flush and read-only afterwards -- a run is never rewritten in
//! place; compaction always produces a brand new file.

use std::convert::TryInto;

/// A key in the tree: a 32-bit signed integer.
pub type Key = i32;

/// A value in the tree: a 32-bit signed integer. The reserved sentinel
/// [`TOMBSTONE`] marks a logical delete.
pub type Value = i32;

/// A single on-disk record: `(key, value)`.
pub type Record = (Key, Value);

/// The sentinel value marking a logical delete.
pub const TOMBSTONE: Value = i32::MIN;

/// The fixed on-disk width of a single record: two little-endian `i32`s.
pub const RECORD_BYTES: usize = 8;

/// Encodes a record into its 8-byte on-disk representation.
#[must_use]
pub fn encode_record(record: Record) -> [u8; RECORD_BYTES] {
    let mut buf = [0u8; RECORD_BYTES];
    buf[0..4].copy_from_slice(&record.0.to_le_bytes());
    buf[4..8].copy_from_slice(&record.1.to_le_bytes());
    buf
}

/// Decodes an 8-byte on-disk representation into a record.
#[must_use]
pub fn decode_record(buf: &[u8; RECORD_BYTES]) -> Record {
    let key = Key::from_le_bytes(buf[0..4].try_into().unwrap());
    let value = Value::from_le_bytes(buf[4..8].try_into().unwrap());
    (key, value)
}

/// Decodes a byte slice of arbitrary length that must be an exact multiple
/// of [`RECORD_BYTES`] into a vector of records, preserving order.
pub fn decode_records(bytes: &[u8]) -> std::io::Result<Vec<Record>> {
    if bytes.len() % RECORD_BYTES != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "run file size {} is not a multiple of the record width {}",
                bytes.len(),
                RECORD_BYTES
            ),
        ));
    }
    Ok(bytes
        .chunks_exact(RECORD_BYTES)
        .map(|chunk| decode_record(chunk.try_into().unwrap()))
        .collect())
}
