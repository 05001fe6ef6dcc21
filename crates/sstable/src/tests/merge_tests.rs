use crate::*;

#[test]
fn merges_disjoint_runs_in_order() {
    let runs = vec![vec![(1, 10), (3, 30)], vec![(2, 20), (4, 40)]];
    let merged = merge_runs(runs, false);
    assert_eq!(merged, vec![(1, 10), (2, 20), (3, 30), (4, 40)]);
}

#[test]
fn newest_run_wins_on_key_collision() {
    // index 0 is newest.
    let runs = vec![vec![(1, 100)], vec![(1, 1)]];
    let merged = merge_runs(runs, false);
    assert_eq!(merged, vec![(1, 100)]);
}

#[test]
fn three_way_collision_keeps_only_newest() {
    let runs = vec![vec![(5, 500)], vec![(5, 50)], vec![(5, 5)]];
    let merged = merge_runs(runs, false);
    assert_eq!(merged, vec![(5, 500)]);
}

#[test]
fn drop_tombstones_removes_terminal_deletes() {
    let runs = vec![vec![(1, TOMBSTONE), (2, 20)]];
    let merged = merge_runs(runs, true);
    assert_eq!(merged, vec![(2, 20)]);
}

#[test]
fn keep_tombstones_when_not_terminal() {
    let runs = vec![vec![(1, TOMBSTONE), (2, 20)]];
    let merged = merge_runs(runs, false);
    assert_eq!(merged, vec![(1, TOMBSTONE), (2, 20)]);
}

#[test]
fn tombstone_from_newer_run_shadows_older_value_even_when_kept() {
    // Newer run has a tombstone for key 1; older run has a real value.
    // Non-terminal levels must keep the tombstone (it shadows the older
    // value), not silently prefer the older live value.
    let runs = vec![vec![(1, TOMBSTONE)], vec![(1, 42)]];
    let merged = merge_runs(runs, false);
    assert_eq!(merged, vec![(1, TOMBSTONE)]);
}

#[test]
fn empty_runs_produce_empty_output() {
    let runs: Vec<Vec<Record>> = vec![vec![], vec![]];
    assert!(merge_runs(runs, false).is_empty());
}

#[test]
fn single_run_passes_through_unchanged() {
    let runs = vec![vec![(1, 1), (2, 2), (3, 3)]];
    assert_eq!(merge_runs(runs, false), vec![(1, 1), (2, 2), (3, 3)]);
}

#[test]
fn many_runs_interleave_correctly() {
    let runs = vec![
        vec![(10, 1), (20, 1), (30, 1)],
        vec![(5, 2), (15, 2), (25, 2)],
        vec![(1, 3), (12, 3)],
    ];
    let merged = merge_runs(runs, false);
    let keys: Vec<i32> = merged.iter().map(|&(k, _)| k).collect();
    let mut sorted_keys = keys.clone();
    sorted_keys.sort_unstable();
    assert_eq!(keys, sorted_keys);
    assert_eq!(keys, vec![1, 5, 10, 12, 15, 20, 25, 30]);
}

#[test]
fn iterator_interface_matches_merge_runs() {
    let runs = vec![vec![(1, 1)], vec![(1, 2)]];
    let from_iter: Vec<Record> = MergeIterator::new(runs.clone()).collect();
    assert_eq!(from_iter, merge_runs(runs, false));
}
