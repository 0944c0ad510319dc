//! Measurement records and the corpus that collects them.

use crate::{BenchError, BenchResult};
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ────────────────────────────────────────────────────────────────────────────────
// Latency summary
// ────────────────────────────────────────────────────────────────────────────────

/// Latency aggregates in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    pub mean_micros: f64,
    pub p50_micros: f64,
    pub p95_micros: f64,
    pub p99_micros: f64,
}

impl LatencySummary {
    /// Summary with only the tail percentile set, as the synthetic generator
    /// assigns it.
    pub fn with_p95(p95_micros: f64) -> Self {
        Self {
            p95_micros,
            ..Self::default()
        }
    }

    /// Summarise raw per-operation samples. This is the entry point for an
    /// external benchmark runner that measures real maps; the synthetic
    /// generator never produces samples.
    ///
    /// An empty sample set yields all zeros.
    pub fn from_micros(samples: &[u64]) -> BenchResult<Self> {
        if samples.is_empty() {
            return Ok(Self::default());
        }

        let mut hist = Histogram::<u64>::new(3)
            .map_err(|e| BenchError::config(format!("latency histogram: {e}")))?;
        let mut sum = 0u128;
        for &sample in samples {
            hist.record(sample)
                .map_err(|e| BenchError::config(format!("latency sample {sample}: {e}")))?;
            sum += u128::from(sample);
        }

        Ok(Self {
            mean_micros: sum as f64 / samples.len() as f64,
            p50_micros: hist.value_at_quantile(0.50) as f64,
            p95_micros: hist.value_at_quantile(0.95) as f64,
            p99_micros: hist.value_at_quantile(0.99) as f64,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Map metrics
// ────────────────────────────────────────────────────────────────────────────────

/// STM counters; all zero for maps without transactional machinery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMetrics {
    pub stm_commits: u64,
    pub stm_aborts: u64,
    pub max_retries: u64,
}

impl MapMetrics {
    /// Counters accumulated since `baseline` was snapshotted. A runner
    /// snapshots the map's counters before each run and records the diff.
    pub fn diff(&self, baseline: &MapMetrics) -> MapMetrics {
        MapMetrics {
            stm_commits: self.stm_commits.saturating_sub(baseline.stm_commits),
            stm_aborts: self.stm_aborts.saturating_sub(baseline.stm_aborts),
            max_retries: self.max_retries.max(baseline.max_retries),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Run record
// ────────────────────────────────────────────────────────────────────────────────

/// One measurement for a (map, workload, threads, repeat) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub map: String,
    pub workload: String,
    pub threads: u32,
    /// 1-based, scoped to its (map, workload, threads) combination.
    pub repeat: u32,
    pub operations: u64,
    pub ops_per_sec: f64,
    pub duration_millis: u64,
    pub latency: LatencySummary,
    #[serde(default)]
    pub metrics: MapMetrics,
}

impl RunRecord {
    /// `ops_per_sec * duration` reproduces `operations` to within one op.
    pub fn throughput_consistent(&self) -> bool {
        let derived = self.ops_per_sec * self.duration_millis as f64 / 1000.0;
        (derived - self.operations as f64).abs() < 1.0
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Corpus
// ────────────────────────────────────────────────────────────────────────────────

/// Ordered, append-only collection of run records.
///
/// Several records share a (map, workload, threads) key, one per repeat;
/// they are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    runs: Vec<RunRecord>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            runs: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: RunRecord) {
        self.runs.push(record);
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.runs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RunRecord> {
        self.runs.iter()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Distinct workload identifiers, sorted.
    pub fn workloads(&self) -> Vec<String> {
        self.runs
            .iter()
            .map(|r| r.workload.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Distinct map identifiers, sorted.
    pub fn maps(&self) -> Vec<String> {
        self.runs
            .iter()
            .map(|r| r.map.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

impl From<Vec<RunRecord>> for Corpus {
    fn from(runs: Vec<RunRecord>) -> Self {
        Self { runs }
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a RunRecord;
    type IntoIter = std::slice::Iter<'a, RunRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.iter()
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Structured document
// ────────────────────────────────────────────────────────────────────────────────

/// `{config, runs}` as persisted by the result store and served to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// Opaque to readers; generation writes its suite configuration here.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    pub runs: Corpus,
}

impl ResultDocument {
    pub fn new(config: serde_json::Map<String, serde_json::Value>, runs: Corpus) -> Self {
        Self { config, runs }
    }
}
