use crate::tests::helpers::open_small_tree;
use config::Policy;
use tempfile::tempdir;

#[test]
fn get_out_of_range_or_absent_key_returns_none() {
    let dir = tempdir().unwrap();
    let tree = open_small_tree(dir.path(), Policy::Leveled);
    tree.put(1, 10).unwrap();
    assert_eq!(tree.get(999).unwrap(), None);
}

#[test]
fn range_swaps_reversed_bounds_and_is_half_open() {
    let dir = tempdir().unwrap();
    let tree = open_small_tree(dir.path(), Policy::Leveled);
    for (k, v) in [(1, 10), (2, 20), (3, 30)] {
        tree.put(k, v).unwrap();
    }
    assert_eq!(tree.range(3, 1).unwrap(), tree.range(1, 3).unwrap());
    // hi is exclusive: key 3 must not appear in range(1, 3).
    assert_eq!(tree.range(1, 3).unwrap(), vec![(1, 10), (2, 20)]);
}

#[test]
fn range_with_equal_bounds_is_empty() {
    let dir = tempdir().unwrap();
    let tree = open_small_tree(dir.path(), Policy::Leveled);
    tree.put(1, 10).unwrap();
    assert_eq!(tree.range(1, 1).unwrap(), Vec::new());
}

#[test]
fn range_merges_buffer_and_run_data_newest_first() {
    let dir = tempdir().unwrap();
    let tree = open_small_tree(dir.path(), Policy::Leveled);

    // Flush keys 1-4 to a level-1 run.
    for (k, v) in [(1, 10), (2, 20), (3, 30), (4, 40), (5, 50)] {
        tree.put(k, v).unwrap();
    }
    // Overwrite a flushed key from the (now fresh) buffer -- the buffer
    // copy must win over the stale on-disk copy.
    tree.put(2, 2000).unwrap();

    let range = tree.range(1, 6).unwrap();
    assert_eq!(range, vec![(1, 10), (2, 2000), (4, 40), (5, 50)]);
}

// 1000 ascending keys, every even key deleted; a full scan returns
// exactly the odd keys mapped to themselves.
#[test]
fn large_delete_sweep_leaves_only_odd_keys() {
    let dir = tempdir().unwrap();
    let tree = open_small_tree(dir.path(), Policy::Leveled);

    for k in 1..=1000 {
        tree.put(k, k).unwrap();
    }
    for k in (2..=1000).step_by(2) {
        tree.del(k).unwrap();
    }

    let scan = tree.range(i32::MIN, i32::MAX).unwrap();
    assert_eq!(scan.len(), 500);
    assert!(scan.iter().all(|&(k, v)| k % 2 == 1 && k == v));
}

#[test]
fn deleted_key_is_absent_even_after_many_more_writes() {
    let dir = tempdir().unwrap();
    let tree = open_small_tree(dir.path(), Policy::Leveled);

    tree.put(1, 1).unwrap();
    tree.del(1).unwrap();
    for k in 2..=50 {
        tree.put(k, k).unwrap();
    }

    assert_eq!(tree.get(1).unwrap(), None);
}
