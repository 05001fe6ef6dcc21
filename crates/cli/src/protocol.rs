//! The command-protocol parser and executor: one line in, one (possibly
//! multi-line) response out. Kept independent of the TCP framing in
//! [`crate::server`] so it is testable without opening a socket.

use anyhow::{Context, Result};
use engine::{RayonExecutor, Tree};
use parking_lot::RwLock;
use std::path::Path;

/// Logs a fatal diagnostic and exits the process.
///
/// I/O errors and invariant violations are fatal for the
/// whole process, not just the offending connection -- the tree has no
/// write-ahead log, so a failed flush or compaction may have left the
/// in-memory state and on-disk runs inconsistent, and there is nothing
/// to repair. `{:?}` renders anyhow's full context chain as a back-trace
/// substitute.
fn fatal(e: anyhow::Error) -> ! {
    tracing::error!(error = ?e, "fatal tree error; the tree has no WAL and cannot repair a partial operation -- shutting down");
    std::process::exit(1);
}

/// Runs a tree operation that is only ever expected to fail with an I/O
/// error or an invariant violation (never a usage/input error -- those are
/// caught by the protocol layer's own argument parsing before the tree is
/// ever called). Any failure here is therefore treated as fatal.
fn fatal_on_err<T>(result: Result<T>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => fatal(e),
    }
}

/// A fixed, generous default bit budget for `monkey` when the caller omits
/// an explicit one.
const DEFAULT_MONKEY_BIT_BUDGET: u64 = 1 << 20;

/// Shared server state: the tree plus the engine-wide control lock that
/// `monkey` takes exclusively while every other command only needs shared
/// access, so a bit-budget reallocation blocks all other operations for
/// its duration.
pub struct AppState {
    pub tree: Tree<RayonExecutor>,
    control: RwLock<()>,
}

impl AppState {
    pub fn new(tree: Tree<RayonExecutor>) -> Self {
        Self {
            tree,
            control: RwLock::new(()),
        }
    }
}

/// Executes one command-protocol line against `state`, returning the
/// response text (without a trailing newline; the caller frames lines).
///
/// Returns `Ok(None)` for `q`/`qs`/`quit`, signaling the caller to close
/// the connection after sending the response.
pub fn dispatch(state: &AppState, line: &str) -> Result<Option<String>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Some(String::new()));
    }
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or("");
    let rest: Vec<&str> = parts.collect();

    // `monkey` takes the control lock exclusively and must not also hold
    // the shared guard every other command takes below, or the two would
    // deadlock against each other on the same thread.
    if verb == "monkey" {
        let _exclusive = state.control.write();
        return cmd_monkey(state, &rest).map(Some).or_else(|e| Ok(Some(format!("ERROR: {e}"))));
    }

    let _control = state.control.read();

    let response = match verb {
        "p" => cmd_put(state, &rest),
        "g" => cmd_get(state, &rest),
        "r" => cmd_range(state, &rest),
        "d" => cmd_del(state, &rest),
        "l" => cmd_load(state, &rest),
        "b" => cmd_benchmark(state, &rest),
        "s" => cmd_stats(state, &rest).map(Some),
        "i" => Ok(Some(cmd_info(state))),
        "misses" => Ok(Some(cmd_misses(state))),
        "io" => Ok(Some(cmd_io(state))),
        "bloom" => Ok(Some(cmd_bloom(state))),
        "help" => Ok(Some(HELP_TEXT.to_string())),
        "q" | "qs" | "quit" => {
            fatal_on_err(state.tree.checkpoint().context("checkpointing on shutdown"));
            return Ok(None);
        }
        other => Ok(Some(format!("ERROR: unknown command '{other}'"))),
    };

    match response {
        Ok(text) => Ok(text.or(Some("<OK>".to_string()))),
        Err(e) => Ok(Some(format!("ERROR: {e}"))),
    }
}

fn parse_i32(s: &str, what: &str) -> Result<i32> {
    s.parse::<i32>()
        .with_context(|| format!("invalid {what} '{s}': expected an integer"))
}

fn cmd_put(state: &AppState, args: &[&str]) -> Result<Option<String>> {
    let [k, v] = args else {
        anyhow::bail!("usage: p K V");
    };
    let key = parse_i32(k, "key")?;
    let value = parse_i32(v, "value")?;
    if value == sstable::TOMBSTONE {
        anyhow::bail!("value {} collides with the reserved tombstone sentinel", value);
    }
    fatal_on_err(state.tree.put(key, value));
    Ok(Some("<OK>".to_string()))
}

fn cmd_get(state: &AppState, args: &[&str]) -> Result<Option<String>> {
    let [k] = args else {
        anyhow::bail!("usage: g K");
    };
    let key = parse_i32(k, "key")?;
    match fatal_on_err(state.tree.get(key)) {
        Some(value) => Ok(Some(value.to_string())),
        None => Ok(Some("<NO_VALUE>".to_string())),
    }
}

fn cmd_range(state: &AppState, args: &[&str]) -> Result<Option<String>> {
    let [lo, hi] = args else {
        anyhow::bail!("usage: r L H");
    };
    let lo = parse_i32(lo, "low bound")?;
    let hi = parse_i32(hi, "high bound")?;
    let results = fatal_on_err(state.tree.range(lo, hi));
    if results.is_empty() {
        return Ok(Some("<NO_VALUE>".to_string()));
    }
    let body = results
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Some(body))
}

fn cmd_del(state: &AppState, args: &[&str]) -> Result<Option<String>> {
    let [k] = args else {
        anyhow::bail!("usage: d K");
    };
    let key = parse_i32(k, "key")?;
    fatal_on_err(state.tree.del(key));
    Ok(Some("<OK>".to_string()))
}

/// Bulk-loads packed `(K, V)` records from a binary file in the run-file
/// format, applying each via `put`.
fn cmd_load(state: &AppState, args: &[&str]) -> Result<Option<String>> {
    let [path] = args else {
        anyhow::bail!("usage: l \"path\"");
    };
    let path = unquote(path);
    let bytes = std::fs::read(Path::new(path)).with_context(|| format!("reading bulk-load file {path}"))?;
    let records = sstable::decode_records(&bytes).context("decoding bulk-load file")?;
    for (key, value) in records {
        fatal_on_err(state.tree.put(key, value));
    }
    Ok(Some("<OK>".to_string()))
}

/// Replays a text workload file, one command-protocol line per line; the
/// verbose/frequency knob lives in `config.verbose_benchmark_frequency`.
fn cmd_benchmark(state: &AppState, args: &[&str]) -> Result<Option<String>> {
    let [path] = args else {
        anyhow::bail!("usage: b \"path\"");
    };
    let path = unquote(path);
    let text = std::fs::read_to_string(Path::new(path)).with_context(|| format!("reading workload file {path}"))?;
    let frequency = state.tree.config().verbose_benchmark_frequency;

    for (idx, workload_line) in text.lines().enumerate() {
        if workload_line.trim().is_empty() {
            continue;
        }
        dispatch(state, workload_line)?;
        if frequency > 0 && (idx as u64 + 1) % frequency == 0 {
            tracing::info!(lines_replayed = idx + 1, "benchmark progress");
        }
    }
    Ok(Some("<OK>".to_string()))
}

fn unquote(s: &str) -> &str {
    s.trim_matches('"')
}

/// `s [N]`: a multi-line stats dump followed by a raw record sample, `N`
/// records from each source (buffer, then each level in order) if given,
/// or every record if `N` is omitted.
fn cmd_stats(state: &AppState, args: &[&str]) -> Result<String> {
    let sample_n: Option<usize> = match args.first() {
        Some(s) => {
            let n: i64 = s
                .parse()
                .with_context(|| format!("invalid sample count '{s}': expected an integer"))?;
            if n <= 0 {
                anyhow::bail!("for printing stats, the number of key-value pairs to print must be positive");
            }
            Some(n as usize)
        }
        None => None,
    };

    let stats = state.tree.stats();
    let mut out = String::new();
    out.push_str(&format!(
        "buffer: {}/{} entries\n",
        stats.buffer_entries, stats.buffer_capacity
    ));
    for level in &stats.levels {
        out.push_str(&format!(
            "level {}: {} runs, {}/{} records, disk={} (x{}), io_count={}, io_micros={}\n",
            level.level_num,
            level.run_count,
            level.record_count,
            level.max_records,
            level.disk_name,
            level.disk_penalty_multiplier,
            level.io_count,
            level.io_micros,
        ));
    }

    for sample in state.tree.sample_records(sample_n) {
        if sample.records.is_empty() {
            continue;
        }
        let label = if sample.source_level == 0 {
            "buffer".to_string()
        } else {
            format!("L{}", sample.source_level)
        };
        let body = sample
            .records
            .iter()
            .map(|&(k, v)| {
                if v == sstable::TOMBSTONE {
                    format!("{k}:TOMBSTONE:{label}")
                } else {
                    format!("{k}:{v}:{label}")
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&body);
        out.push('\n');
    }

    Ok(out.trim_end().to_string())
}

fn cmd_info(state: &AppState) -> String {
    let stats = state.tree.stats();
    format!(
        "commands served: {}\nget hits: {}\nget misses: {}\nlevels: {}",
        stats.command_counter,
        stats.get_hits,
        stats.get_misses,
        stats.levels.len()
    )
}

fn cmd_misses(state: &AppState) -> String {
    let stats = state.tree.stats();
    format!(
        "get_hits={} get_misses={} bloom_checks={} bloom_negatives={}",
        stats.get_hits, stats.get_misses, stats.bloom_checks, stats.bloom_negatives
    )
}

fn cmd_io(state: &AppState) -> String {
    let stats = state.tree.stats();
    stats
        .levels
        .iter()
        .map(|l| {
            format!(
                "level {}: io_count={} io_micros={} weighted_io_micros={}",
                l.level_num, l.io_count, l.io_micros, l.weighted_io_micros
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn cmd_bloom(state: &AppState) -> String {
    state
        .tree
        .bloom_summaries()
        .iter()
        .map(|(level_num, idx, bits, hashes, tp, fp)| {
            format!("level {level_num} run {idx}: bits={bits} hashes={hashes} true_positives={tp} false_positives={fp}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn cmd_monkey(state: &AppState, args: &[&str]) -> Result<String> {
    let bits: u64 = args
        .first()
        .map(|s| s.parse().context("monkey bit budget must be an integer"))
        .transpose()?
        .unwrap_or(DEFAULT_MONKEY_BIT_BUDGET);

    fatal_on_err(state.tree.autotune_filters(bits));
    Ok("<OK>".to_string())
}

const HELP_TEXT: &str = "\
p K V       put(K, V)
g K         get(K)
r L H       range(L, H), half-open
d K         del(K)
l \"path\"    bulk-load packed (K, V) records from a binary file
b \"path\"    replay a text workload file
s [N]       stats dump, optionally N records per level
i           summary info
bloom       per-run Bloom filter summaries
monkey [N]  reallocate the Bloom bit budget (default a large fixed budget)
misses      hit/miss counters
io          per-level I/O counters
q / qs      checkpoint and close the connection
help        this text";
