//! Read-only summaries of a corpus for charting.
//!
//! All queries borrow the corpus immutably and build fresh rows on every
//! call, so they can run concurrently against a shared corpus.

use crate::record::Corpus;
use serde::Serialize;
use std::collections::BTreeMap;

/// Mean throughput of every repeat at one (map, threads) point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputRow {
    pub map: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload: Option<String>,
    pub threads: u32,
    pub mean_ops_per_sec: f64,
    /// Number of records averaged.
    pub samples: usize,
}

/// Mean p95 latency of a map across every workload and thread count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyRow {
    pub map: String,
    pub mean_p95_micros: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadSeries {
    pub workload: String,
    pub rows: Vec<ThroughputRow>,
}

/// Everything the chart renderer needs: one series per workload plus the
/// cross-workload latency ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSummary {
    pub series: Vec<WorkloadSeries>,
    pub latency: Vec<LatencyRow>,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Throughput per (map, threads) within `workload`, ordered by map then
/// ascending thread count.
pub fn throughput_by_threads(corpus: &Corpus, workload: &str) -> Vec<ThroughputRow> {
    let mut groups: BTreeMap<(&str, u32), Mean> = BTreeMap::new();
    for r in corpus.iter().filter(|r| r.workload == workload) {
        groups
            .entry((r.map.as_str(), r.threads))
            .or_default()
            .add(r.ops_per_sec);
    }

    groups
        .into_iter()
        .map(|((map, threads), mean)| ThroughputRow {
            map: map.to_string(),
            workload: Some(workload.to_string()),
            threads,
            mean_ops_per_sec: mean.value(),
            samples: mean.count,
        })
        .collect()
}

/// Mean p95 per map over the whole corpus, lowest latency first. Ties keep
/// map-name order.
pub fn p95_by_map(corpus: &Corpus) -> Vec<LatencyRow> {
    let mut groups: BTreeMap<&str, Mean> = BTreeMap::new();
    for r in corpus {
        groups.entry(r.map.as_str()).or_default().add(r.latency.p95_micros);
    }

    let mut rows: Vec<LatencyRow> = groups
        .into_iter()
        .map(|(map, mean)| LatencyRow {
            map: map.to_string(),
            mean_p95_micros: mean.value(),
            samples: mean.count,
        })
        .collect();
    rows.sort_by(|a, b| a.mean_p95_micros.total_cmp(&b.mean_p95_micros));
    rows
}

/// One throughput series per distinct workload (sorted) plus the latency
/// ranking.
pub fn summarize(corpus: &Corpus) -> ChartSummary {
    let series = corpus
        .workloads()
        .into_iter()
        .map(|workload| {
            let rows = throughput_by_threads(corpus, &workload);
            WorkloadSeries { workload, rows }
        })
        .collect();
    ChartSummary {
        series,
        latency: p95_by_map(corpus),
    }
}
