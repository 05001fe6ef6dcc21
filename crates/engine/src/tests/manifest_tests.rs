use crate::tests::helpers::{small_config, open_small_tree};
use crate::Tree;
use crate::executor::SequentialExecutor;
use config::Policy;
use tempfile::tempdir;

#[test]
fn opening_an_empty_data_dir_starts_fresh_with_one_empty_level() {
    let dir = tempdir().unwrap();
    let tree = open_small_tree(dir.path(), Policy::Leveled);
    let stats = tree.stats();
    assert_eq!(stats.levels.len(), 1);
    assert_eq!(stats.levels[0].record_count, 0);
    assert!(tree.get(1).unwrap().is_none());
}

// Checkpoint, reopen, and the tree must answer every query exactly as it
// did before the restart.
#[test]
fn checkpoint_then_reopen_preserves_every_key_and_counter() {
    let dir = tempdir().unwrap();

    {
        let tree = open_small_tree(dir.path(), Policy::Leveled);
        for k in 1..=30 {
            tree.put(k, k * 10).unwrap();
        }
        tree.del(5).unwrap();
        // touch the hit/miss counters so restore can be checked too.
        let _ = tree.get(1).unwrap();
        let _ = tree.get(5).unwrap();
        let _ = tree.get(9999).unwrap();
        tree.checkpoint().unwrap();
    }

    let config = small_config(dir.path(), Policy::Leveled);
    let reopened = Tree::open_with_executor(config, SequentialExecutor).unwrap();

    for k in 1..=30 {
        if k == 5 {
            assert_eq!(reopened.get(k).unwrap(), None);
        } else {
            assert_eq!(reopened.get(k).unwrap(), Some(k * 10));
        }
    }

    let restored_stats = reopened.stats();
    assert!(restored_stats.get_hits >= 2);
    assert!(restored_stats.get_misses >= 1);
}

#[test]
fn checkpoint_then_reopen_preserves_range_scans() {
    let dir = tempdir().unwrap();

    {
        let tree = open_small_tree(dir.path(), Policy::Tiered);
        for k in 1..=25 {
            tree.put(k, k).unwrap();
        }
        tree.checkpoint().unwrap();
    }

    let config = small_config(dir.path(), Policy::Tiered);
    let reopened = Tree::open_with_executor(config, SequentialExecutor).unwrap();
    let scan = reopened.range(1, 26).unwrap();
    let expected: Vec<(i32, i32)> = (1..=25).map(|k| (k, k)).collect();
    assert_eq!(scan, expected);
}

#[test]
fn missing_manifest_file_is_not_an_error() {
    let dir = tempdir().unwrap();
    // No writes, no checkpoint -- data_dir has no lsm-tree.json at all.
    let config = small_config(dir.path(), Policy::Leveled);
    let tree = Tree::open_with_executor(config, SequentialExecutor).unwrap();
    assert!(tree.get(1).unwrap().is_none());
}

#[test]
fn checkpoint_writes_the_manifest_file_atomically() {
    let dir = tempdir().unwrap();
    let tree = open_small_tree(dir.path(), Policy::Leveled);
    tree.put(1, 1).unwrap();
    tree.checkpoint().unwrap();

    let manifest_path = dir.path().join("lsm-tree.json");
    assert!(manifest_path.exists());
    // No leftover temp file after a successful rename.
    assert!(!dir.path().join("lsm-tree.json.tmp").exists());
}

#[test]
fn reopening_after_many_cascades_still_answers_every_key() {
    let dir = tempdir().unwrap();

    {
        let tree = open_small_tree(dir.path(), Policy::Partial);
        for k in 1..=80 {
            tree.put(k, k).unwrap();
        }
        tree.checkpoint().unwrap();
    }

    let config = small_config(dir.path(), Policy::Partial);
    let reopened = Tree::open_with_executor(config, SequentialExecutor).unwrap();
    for k in 1..=80 {
        assert_eq!(reopened.get(k).unwrap(), Some(k));
    }
}
