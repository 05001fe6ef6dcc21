use crate::*;
use std::fs::File;
use std::io::Read;

#[test]
fn create_fresh_produces_unique_paths() {
    let dir = tempfile::tempdir().unwrap();
    let (path1, _) = RunWriter::create_fresh(dir.path(), "run").unwrap();
    let (path2, _) = RunWriter::create_fresh(dir.path(), "run").unwrap();
    assert_ne!(path1, path2);
    assert!(path1.starts_with(dir.path()));
}

#[test]
fn create_fresh_creates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a/b/c");
    let (path, _) = RunWriter::create_fresh(&nested, "run").unwrap();
    assert!(path.exists());
}

#[test]
fn write_all_produces_packed_records() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut file) = RunWriter::create_fresh(dir.path(), "run").unwrap();
    let records: Vec<Record> = vec![(1, 10), (2, 20), (3, 30)];
    RunWriter::write_all(&mut file, &records).unwrap();
    drop(file);

    let mut buf = Vec::new();
    File::open(&path).unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(buf.len(), records.len() * RECORD_BYTES);
    assert_eq!(decode_records(&buf).unwrap(), records);
}

#[test]
fn write_all_empty_slice_produces_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut file) = RunWriter::create_fresh(dir.path(), "run").unwrap();
    RunWriter::write_all(&mut file, &[]).unwrap();
    drop(file);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn write_all_preserves_negative_and_tombstone_values() {
    let dir = tempfile::tempdir().unwrap();
    let (path, mut file) = RunWriter::create_fresh(dir.path(), "run").unwrap();
    let records: Vec<Record> = vec![(-5, TOMBSTONE), (i32::MIN + 1, i32::MAX), (0, -1)];
    RunWriter::write_all(&mut file, &records).unwrap();
    drop(file);

    let mut buf = Vec::new();
    File::open(&path).unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(decode_records(&buf).unwrap(), records);
}
