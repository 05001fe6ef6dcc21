use crate::run::{is_tombstone, LookupOutcome, Run};
use sstable::TOMBSTONE;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::tempdir;

fn io_counters() -> (AtomicU64, AtomicU64) {
    (AtomicU64::new(0), AtomicU64::new(0))
}

#[test]
fn flush_then_get_finds_every_key() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 16, 4).unwrap();
    let records: Vec<(i32, i32)> = (1..=10).map(|k| (k, k * 100)).collect();
    run.flush(&records, 0.01).unwrap();

    let (io_count, io_micros) = io_counters();
    for (k, v) in &records {
        match run.get(*k, &io_count, &io_micros).unwrap() {
            LookupOutcome::Hit(value) => assert_eq!(value, *v),
            other => panic!("expected a hit for key {}, got {:?}", k, other),
        }
    }
}

#[test]
fn get_below_first_key_or_above_max_key_is_a_miss_without_touching_bloom() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 16, 4).unwrap();
    run.flush(&[(10, 1), (20, 2), (30, 3)], 0.01).unwrap();

    let (io_count, io_micros) = io_counters();
    assert_eq!(run.get(1, &io_count, &io_micros).unwrap(), LookupOutcome::Miss);
    assert_eq!(run.get(100, &io_count, &io_micros).unwrap(), LookupOutcome::Miss);
}

#[test]
fn get_on_empty_run_is_a_miss() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 16, 4).unwrap();
    run.flush(&[], 0.01).unwrap();

    let (io_count, io_micros) = io_counters();
    assert_eq!(run.get(5, &io_count, &io_micros).unwrap(), LookupOutcome::Miss);
}

#[test]
fn range_returns_half_open_window_in_ascending_order() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 16, 4).unwrap();
    let records: Vec<(i32, i32)> = (1..=12).map(|k| (k, k)).collect();
    run.flush(&records, 0.01).unwrap();

    let (io_count, io_micros) = io_counters();
    let got = run.range(3, 7, &io_count, &io_micros).unwrap();
    assert_eq!(got, vec![(3, 3), (4, 4), (5, 5), (6, 6)]);
}

#[test]
fn range_outside_the_runs_key_span_is_empty() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 16, 4).unwrap();
    run.flush(&[(10, 1), (20, 2)], 0.01).unwrap();

    let (io_count, io_micros) = io_counters();
    assert!(run.range(0, 5, &io_count, &io_micros).unwrap().is_empty());
    assert!(run.range(100, 200, &io_count, &io_micros).unwrap().is_empty());
}

#[test]
fn scan_returns_every_record_in_key_order() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 16, 4).unwrap();
    let records: Vec<(i32, i32)> = (1..=9).map(|k| (k, k * 2)).collect();
    run.flush(&records, 0.01).unwrap();

    assert_eq!(run.scan().unwrap(), records);
}

// Fence pointers must be strictly non-decreasing and point at the first key
// of every page (invariant #9 on a sorted, fixed-page-size run).
#[test]
fn fence_pointers_are_monotonic_and_cover_every_page() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 32, 4).unwrap();
    let records: Vec<(i32, i32)> = (1..=20).map(|k| (k, k)).collect();
    run.flush(&records, 0.01).unwrap();

    let fences = run.fence_pointers();
    assert_eq!(fences.len(), 5); // 20 records / 4 per page
    for window in fences.windows(2) {
        assert!(window[0] < window[1]);
    }
    assert_eq!(fences[0], 1);
}

#[test]
fn flushing_twice_is_rejected() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 16, 4).unwrap();
    run.flush(&[(1, 1)], 0.01).unwrap();
    assert!(run.flush(&[(2, 2)], 0.01).is_err());
}

#[test]
fn flushing_at_or_past_capacity_is_rejected() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 4, 4).unwrap();
    let records: Vec<(i32, i32)> = (1..=4).map(|k| (k, k)).collect();
    assert!(run.flush(&records, 0.01).is_err());
}

#[test]
fn resize_bloom_and_repopulate_keeps_every_key_a_positive() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 32, 4).unwrap();
    let records: Vec<(i32, i32)> = (1..=16).map(|k| (k, k)).collect();
    run.flush(&records, 0.01).unwrap();

    run.resize_bloom_and_repopulate(512).unwrap();
    assert_eq!(run.bloom_num_bits(), 512);

    let (io_count, io_micros) = io_counters();
    for &(k, v) in &records {
        assert_eq!(run.get(k, &io_count, &io_micros).unwrap(), LookupOutcome::Hit(v));
    }
}

#[test]
fn tombstone_value_round_trips_through_flush_and_get() {
    let dir = tempdir().unwrap();
    let run = Run::create_fresh(dir.path(), 16, 4).unwrap();
    run.flush(&[(1, TOMBSTONE), (2, 20)], 0.01).unwrap();

    let (io_count, io_micros) = io_counters();
    match run.get(1, &io_count, &io_micros).unwrap() {
        LookupOutcome::Hit(v) => assert!(is_tombstone(v)),
        other => panic!("expected a hit carrying a tombstone, got {:?}", other),
    }
}
