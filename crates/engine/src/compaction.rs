//! Compaction state machine: `move_runs`, `execute_compaction_plan`, and the
//! MONKEY Bloom-filter bit-budget autotuner.
//!
//! `move_runs` propagates space downward from an overflowing level,
//! planning merges per the active [`config::Policy`]; `execute_compaction_plan`
//! fans the planned merges out across the executor, one task per level
//! (distinct levels are independent since the caller already holds every
//! involved level's write lock -- collapsed here into each level's own
//! internal run-list lock).

use crate::executor::Executor;
use crate::run::Run;
use crate::Tree;
use anyhow::Result;
use config::Policy;
use std::sync::Arc;

/// Propagates space downward from level `level_num`, recursing into deeper
/// levels first if the immediate next level has no room for a full
/// promotion. Entry invariant: level `level_num` is
/// exclusively held by the caller, and `move_runs` is never invoked by more
/// than one thread at a time (enforced by `Tree::move_runs_lock`).
pub fn move_runs<E: Executor>(tree: &Tree<E>, level_num: usize) -> Result<()> {
    let level = tree
        .get_level(level_num)
        .expect("move_runs called on a level that does not exist");

    if level.fits_lower_level() {
        return Ok(());
    }

    let next_num = level_num + 1;
    let next_level = tree.ensure_level(next_num);

    if !next_level.fits_lower_level() {
        move_runs(tree, next_num)?;
    }
    // The levels vector may have grown while recursing; re-resolve in case a
    // new `Arc` slot was pushed (the existing `Arc` handle stays valid
    // either way, but re-fetching avoids holding a stale reference).
    let next_level = tree
        .get_level(next_num)
        .expect("move_runs just ensured this level exists");

    let is_next_last = tree.is_last_level(next_num);

    match level.policy() {
        Policy::Tiered => splice_batch(tree, &level, &next_level, next_num),
        Policy::LazyLeveled if !is_next_last => splice_batch(tree, &level, &next_level, next_num),
        Policy::Leveled | Policy::LazyLeveled => splice_merge_with_existing(tree, &level, &next_level, next_num),
        Policy::Partial => splice_partial(tree, &level, &next_level, next_num, level_num),
    }

    Ok(())
}

/// TIERED, and LAZY_LEVELED when the target level is not the last one:
/// move the whole batch down and plan merging it alone.
fn splice_batch<E: Executor>(tree: &Tree<E>, level: &crate::Level, next_level: &crate::Level, next_num: usize) {
    let moved = level.take_all_runs();
    let moved_count = moved.len();
    if moved_count == 0 {
        return;
    }
    next_level.splice_front(moved);
    tree.compaction_plan.lock().insert(next_num, (0, moved_count - 1));
}

/// LEVELED everywhere, and LAZY_LEVELED when the target level is the last
/// one: move the whole batch down and plan merging it together with
/// whatever the target level already held.
fn splice_merge_with_existing<E: Executor>(
    tree: &Tree<E>,
    level: &crate::Level,
    next_level: &crate::Level,
    next_num: usize,
) {
    let prior_count = next_level.run_count();
    let moved = level.take_all_runs();
    let moved_count = moved.len();
    if moved_count == 0 {
        return;
    }
    next_level.splice_front(moved);
    tree.compaction_plan
        .lock()
        .insert(next_num, (0, moved_count + prior_count - 1));
}

/// PARTIAL: move only the best-scoring contiguous segment, if it fits;
/// otherwise fall back to a local partial compaction inside the source
/// level.
fn splice_partial<E: Executor>(
    tree: &Tree<E>,
    level: &crate::Level,
    next_level: &crate::Level,
    next_num: usize,
    level_num: usize,
) {
    let Some((start, end)) = level.find_best_segment_to_compact(tree.config.compaction_percentage) else {
        return;
    };

    let segment_max_records = level.segment_max_records(start, end);
    if next_level.record_count() + segment_max_records <= next_level.max_records() {
        let prior_count = next_level.run_count();
        let segment = level.take_segment(start, end);
        let segment_len = segment.len();
        next_level.splice_front(segment);
        tree.compaction_plan
            .lock()
            .insert(next_num, (0, segment_len + prior_count - 1));
    } else {
        tree.compaction_plan.lock().insert(level_num, (start, end));
    }
}

/// Drains the compaction plan and submits each planned merge to the
/// executor. Distinct levels compact independently and in parallel; the
/// caller guarantees every planned level is already write-locked.
pub fn execute_compaction_plan<E: Executor>(tree: &Tree<E>) -> Result<()> {
    let plan: Vec<(usize, (usize, usize))> = tree.compaction_plan.lock().drain().collect();
    if plan.is_empty() {
        return Ok(());
    }

    let data_dir = tree.config.data_dir.clone();
    let target_fpr = tree.config.bloom_fpr;

    let tasks: Vec<Box<dyn FnOnce() -> Result<()> + Send + '_>> = plan
        .into_iter()
        .map(|(level_num, (start, end))| {
            let data_dir = data_dir.clone();
            let task: Box<dyn FnOnce() -> Result<()> + Send> = Box::new(move || {
                let level = tree
                    .get_level(level_num)
                    .expect("planned level must still exist");
                let is_last = tree.is_last_level(level_num);
                let new_run = level.compact_segment(&data_dir, target_fpr, start, end, is_last)?;
                level.replace_segment(start, end, new_run);
                Ok(())
            });
            task
        })
        .collect();

    for result in tree.executor.map(tasks) {
        result?;
    }
    Ok(())
}

/// MONKEY: reallocates the global Bloom-filter bit budget `total_bits`
/// across every run in the tree to minimize the expected number of disk
/// probes per lookup.
///
/// Starts with every bit in the first run of level 1 and every other run at
/// zero, then greedily shifts bits between pairs of runs in decreasing
/// step sizes as long as a shift strictly reduces the global cost `R`.
pub fn autotune_filters<E: Executor>(tree: &Tree<E>, total_bits: u64) -> Result<()> {
    let levels = tree.levels.read().clone();
    let runs: Vec<Arc<Run>> = levels.iter().flat_map(|level| level.runs_snapshot()).collect();
    if runs.is_empty() {
        return Ok(());
    }

    let entries: Vec<f64> = runs.iter().map(|r| (r.size().max(1)) as f64).collect();
    let mut bits: Vec<u64> = vec![0; runs.len()];
    bits[0] = total_bits;

    let mut delta = total_bits;
    while delta >= 1 {
        let mut improved = false;
        let current_cost = cost(&bits, &entries);
        let mut best = (bits.clone(), current_cost);

        for i in 0..runs.len() {
            for j in 0..runs.len() {
                if i == j || bits[j] <= delta {
                    continue;
                }
                let mut candidate = bits.clone();
                candidate[j] -= delta;
                candidate[i] += delta;
                let candidate_cost = cost(&candidate, &entries);
                if candidate_cost < best.1 {
                    best = (candidate, candidate_cost);
                    improved = true;
                }
            }
        }

        if improved {
            bits = best.0;
        } else {
            delta /= 2;
        }
    }

    for (run, &run_bits) in runs.iter().zip(bits.iter()) {
        run.resize_bloom_and_repopulate(run_bits)?;
    }
    Ok(())
}

/// The theoretical false-positive-rate contribution of a single run with
/// `bits` bits and `entries` keys: `exp(-bits / entries * ln(2)^2)`.
fn eval(bits: u64, entries: f64) -> f64 {
    if entries <= 0.0 {
        return 1.0;
    }
    (-(bits as f64 / entries) * std::f64::consts::LN_2.powi(2)).exp()
}

/// The global cost `R = (#runs - 1) + sum(eval(bits_i, entries_i))`.
fn cost(bits: &[u64], entries: &[f64]) -> f64 {
    let n = bits.len() as f64;
    (n - 1.0) + bits.iter().zip(entries).map(|(&b, &e)| eval(b, e)).sum::<f64>()
}

#[cfg(test)]
#[path = "tests/compaction_tests.rs"]
mod tests;
