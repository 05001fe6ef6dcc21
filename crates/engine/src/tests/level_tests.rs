use crate::level::Level;
use crate::run::Run;
use config::Policy;
use std::sync::Arc;
use tempfile::tempdir;

fn flushed_run(dir: &std::path::Path, records: &[(i32, i32)], max_records: usize) -> Arc<Run> {
    let run = Run::create_fresh(dir, max_records, 4).unwrap();
    run.flush(records, 0.01).unwrap();
    Arc::new(run)
}

#[test]
fn max_records_follows_the_geometric_fanout() {
    let level = Level::new(2, Policy::Leveled, 2, 4);
    // B * T^level_num = 4 * 2^2 = 16
    assert_eq!(level.max_records(), 16);
}

#[test]
fn put_front_rejects_a_run_that_would_overflow_capacity() {
    let dir = tempdir().unwrap();
    let level = Level::new(1, Policy::Tiered, 2, 4); // max_records = 8
    let a = flushed_run(dir.path(), &[(1, 1), (2, 2), (3, 3), (4, 4)], 4);
    let b = flushed_run(dir.path(), &[(5, 5), (6, 6), (7, 7), (8, 8)], 4);
    let c = flushed_run(dir.path(), &[(9, 9)], 4);

    level.put_front(a).unwrap();
    level.put_front(b).unwrap();
    assert_eq!(level.record_count(), 8);
    assert!(level.put_front(c).is_err());
}

#[test]
fn fits_buffer_reports_whether_b_more_records_would_fit() {
    let level = Level::new(1, Policy::Leveled, 2, 4); // max_records = 8
    assert!(level.fits_buffer());
    level.set_record_count(5);
    assert!(!level.fits_buffer()); // 5 + 4 > 8
    level.set_record_count(4);
    assert!(level.fits_buffer()); // 4 + 4 == 8
}

#[test]
fn fits_lower_level_uses_the_two_levels_up_reference_capacity() {
    let level = Level::new(3, Policy::Leveled, 2, 4); // max_records = 32
    // ref_level = max(1, 3-2) = 1, ref_max = 4 * 2^1 = 8
    assert!(level.fits_lower_level());
    level.set_record_count(25);
    assert!(!level.fits_lower_level()); // 25 + 8 > 32
}

#[test]
fn find_best_segment_to_compact_is_none_with_fewer_than_two_runs() {
    let dir = tempdir().unwrap();
    let level = Level::new(1, Policy::Partial, 2, 4);
    assert_eq!(level.find_best_segment_to_compact(0.5), None);

    let a = flushed_run(dir.path(), &[(1, 1)], 4);
    level.put_front(a).unwrap();
    assert_eq!(level.find_best_segment_to_compact(0.5), None);
}

#[test]
fn find_best_segment_to_compact_picks_the_lowest_cost_window() {
    let dir = tempdir().unwrap();
    let level = Level::new(1, Policy::Partial, 2, 16);

    // Newest-first order after these put_front calls: [c, b, a].
    let a = flushed_run(dir.path(), &[(1, 1), (2, 2)], 4);
    let b = flushed_run(dir.path(), &[(100, 1), (101, 2)], 4);
    let c = flushed_run(dir.path(), &[(3, 1), (4, 2)], 4);
    level.put_front(a).unwrap();
    level.put_front(b).unwrap();
    level.put_front(c).unwrap();

    // runs = [c(3..4), b(100..101), a(1..2)]; adjacent gaps: |4-100|=96,
    // |101-1|=100. With n = max(2, round(0.5*3)) = 2, the cheapest window
    // is [0, 1] (c, b) at cost 96 versus [1, 2] (b, a) at cost 100.
    let (start, end) = level.find_best_segment_to_compact(0.5).unwrap();
    assert_eq!((start, end), (0, 1));
}

#[test]
fn compact_segment_then_replace_segment_merges_and_drops_old_files() {
    let dir = tempdir().unwrap();
    let level = Level::new(1, Policy::Partial, 2, 16);

    let a = flushed_run(dir.path(), &[(1, 1), (2, 2)], 4);
    let b = flushed_run(dir.path(), &[(3, 3), (4, 4)], 4);
    let a_path = a.path().to_path_buf();
    let b_path = b.path().to_path_buf();
    level.put_front(a).unwrap();
    level.put_front(b).unwrap();
    assert_eq!(level.run_count(), 2);

    let merged = level.compact_segment(dir.path(), 0.01, 0, 1, false).unwrap();
    assert_eq!(merged.scan().unwrap(), vec![(1, 1), (2, 2), (3, 3), (4, 4)]);

    level.replace_segment(0, 1, merged);
    assert_eq!(level.run_count(), 1);
    assert!(!a_path.exists());
    assert!(!b_path.exists());
}

#[test]
fn compact_segment_drops_tombstones_only_at_the_last_level() {
    let dir = tempdir().unwrap();
    let level = Level::new(2, Policy::Leveled, 2, 16);

    let a = flushed_run(dir.path(), &[(1, sstable::TOMBSTONE), (2, 2)], 4);
    let b = flushed_run(dir.path(), &[(3, 3)], 4);
    level.put_front(a).unwrap();
    level.put_front(b).unwrap();

    let merged_last = level.compact_segment(dir.path(), 0.01, 0, 1, true).unwrap();
    assert_eq!(merged_last.scan().unwrap(), vec![(2, 2), (3, 3)]);
}

#[test]
fn take_segment_removes_only_the_requested_window() {
    let dir = tempdir().unwrap();
    let level = Level::new(1, Policy::Partial, 2, 16);

    let a = flushed_run(dir.path(), &[(1, 1)], 4);
    let b = flushed_run(dir.path(), &[(2, 2)], 4);
    let c = flushed_run(dir.path(), &[(3, 3)], 4);
    level.put_front(a).unwrap();
    level.put_front(b).unwrap();
    level.put_front(c).unwrap();
    assert_eq!(level.run_count(), 3);

    let taken = level.take_segment(1, 2);
    assert_eq!(taken.len(), 2);
    assert_eq!(level.run_count(), 1);
}

#[test]
fn take_all_runs_empties_the_level_and_resets_record_count() {
    let dir = tempdir().unwrap();
    let level = Level::new(1, Policy::Tiered, 2, 16);
    let a = flushed_run(dir.path(), &[(1, 1), (2, 2)], 4);
    level.put_front(a).unwrap();

    let taken = level.take_all_runs();
    assert_eq!(taken.len(), 1);
    assert_eq!(level.run_count(), 0);
    assert_eq!(level.record_count(), 0);
}

#[test]
fn splice_front_prepends_without_a_capacity_check() {
    let dir = tempdir().unwrap();
    let level = Level::new(1, Policy::Tiered, 2, 4); // max_records = 8
    let a = flushed_run(dir.path(), &[(1, 1), (2, 2), (3, 3), (4, 4)], 4);
    let b = flushed_run(dir.path(), &[(5, 5), (6, 6), (7, 7), (8, 8)], 4);
    let c = flushed_run(dir.path(), &[(9, 9)], 4);

    // Deliberately exceeds max_records; splice_front trusts the caller.
    level.splice_front(vec![a, b, c]);
    assert_eq!(level.run_count(), 3);
}

#[test]
fn restore_runs_rebuilds_counters_without_validation() {
    let dir = tempdir().unwrap();
    let level = Level::new(1, Policy::Leveled, 2, 4);
    let a = flushed_run(dir.path(), &[(1, 1), (2, 2)], 4);

    level.restore_runs(vec![a], 2, 7, 1500);
    assert_eq!(level.run_count(), 1);
    assert_eq!(level.record_count(), 2);
    assert_eq!(level.io_count(), 7);
    assert_eq!(level.io_micros(), 1500);
}
