//! Pretty-print a corpus as comparison tables with a wins summary.

use crate::aggregate::throughput_by_threads;
use crate::record::{Corpus, RunRecord};
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use std::collections::BTreeMap;

// ────────────────────────────────────────────────────────────────────────────────
// Terminal output
// ────────────────────────────────────────────────────────────────────────────────

/// Print every run of one workload. Rows belonging to the map with the best
/// mean throughput at their thread count are starred.
pub fn print_workload_runs(workload: &str, runs: &[&RunRecord], best: &BTreeMap<u32, String>) {
    if runs.is_empty() {
        return;
    }

    println!("\n{}", format!("━━━ {} ━━━", workload).bold().cyan());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec![
        "Map",
        "Threads",
        "Repeat",
        "Ops",
        "Throughput",
        "Duration (ms)",
        "Mean (μs)",
        "p50 (μs)",
        "p95 (μs)",
        "p99 (μs)",
        "Commits",
        "Aborts",
        "Max retries",
    ]);

    for r in runs {
        let is_best = best.get(&r.threads).is_some_and(|m| *m == r.map);
        let (name_cell, tp_cell) = if is_best {
            (
                Cell::new(format!("★ {}", r.map)).fg(Color::Green),
                Cell::new(format_throughput(r.ops_per_sec)).fg(Color::Green),
            )
        } else {
            (Cell::new(&r.map), Cell::new(format_throughput(r.ops_per_sec)))
        };

        table.add_row(vec![
            name_cell,
            Cell::new(r.threads),
            Cell::new(r.repeat),
            Cell::new(format_count(r.operations)),
            tp_cell,
            Cell::new(r.duration_millis),
            Cell::new(format!("{:.1}", r.latency.mean_micros)),
            Cell::new(format!("{:.1}", r.latency.p50_micros)),
            Cell::new(format!("{:.1}", r.latency.p95_micros)),
            Cell::new(format!("{:.1}", r.latency.p99_micros)),
            Cell::new(r.metrics.stm_commits),
            Cell::new(r.metrics.stm_aborts),
            Cell::new(r.metrics.max_retries),
        ]);
    }

    println!("{table}");
}

/// Print the full corpus report: one table per workload, then wins by map.
pub fn print_corpus(corpus: &Corpus) {
    println!(
        "\n{}",
        "╔══════════════════════════════════════════════════════════════╗"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "║            Concurrent Map Benchmark Report                   ║"
            .bold()
            .blue()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════════════════════╝"
            .bold()
            .blue()
    );
    println!(
        "  Runs: {}  Maps: {}  Workloads: {}",
        corpus.len(),
        corpus.maps().len(),
        corpus.workloads().len()
    );

    for workload in corpus.workloads() {
        let runs: Vec<&RunRecord> = corpus.iter().filter(|r| r.workload == workload).collect();
        let best = best_by_threads(corpus, &workload);
        print_workload_runs(&workload, &runs, &best);
    }

    println!("\n{}", "── Summary: Wins by Map ──".bold().yellow());
    for (map, count) in wins_by_map(corpus) {
        println!("  {} {} wins", format!("{:>12}", map).bold(), count);
    }
}

/// Map with the highest mean throughput at each thread count of `workload`.
/// Ties go to the map that sorts first.
pub fn best_by_threads(corpus: &Corpus, workload: &str) -> BTreeMap<u32, String> {
    let mut best: BTreeMap<u32, (String, f64)> = BTreeMap::new();
    for row in throughput_by_threads(corpus, workload) {
        if row.mean_ops_per_sec <= 0.0 {
            continue;
        }
        match best.get(&row.threads) {
            Some((_, top)) if *top >= row.mean_ops_per_sec => {}
            _ => {
                best.insert(row.threads, (row.map, row.mean_ops_per_sec));
            }
        }
    }
    best.into_iter().map(|(t, (map, _))| (t, map)).collect()
}

/// Number of (workload, threads) groups each map wins, most wins first.
pub fn wins_by_map(corpus: &Corpus) -> Vec<(String, usize)> {
    let mut wins: BTreeMap<String, usize> = BTreeMap::new();
    for workload in corpus.workloads() {
        for (_, map) in best_by_threads(corpus, &workload) {
            *wins.entry(map).or_default() += 1;
        }
    }
    let mut win_list: Vec<_> = wins.into_iter().collect();
    win_list.sort_by(|a, b| b.1.cmp(&a.1));
    win_list
}

// ────────────────────────────────────────────────────────────────────────────────
// Formatting helpers
// ────────────────────────────────────────────────────────────────────────────────

pub(crate) fn format_throughput(t: f64) -> String {
    if t >= 1_000_000.0 {
        format!("{:.2}M", t / 1_000_000.0)
    } else if t >= 1_000.0 {
        format!("{:.1}K", t / 1_000.0)
    } else {
        format!("{:.0}", t)
    }
}

fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}
