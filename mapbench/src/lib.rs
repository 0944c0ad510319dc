//! Synthetic benchmark corpora for concurrent ordered maps.
//!
//! The crate produces, stores, summarises and charts throughput/latency
//! measurements for a set of map implementations (global lock, sharded,
//! skip list, STM variants) across workloads and thread counts:
//!
//! - [`profiles`] holds the per-(map, workload) performance table.
//! - [`scaling`] turns a profile entry into one synthetic [`RunRecord`].
//! - [`stream`] enumerates the configured combination space and pushes
//!   progress events over a channel while it builds the [`Corpus`].
//! - [`store`] reads and writes corpora as CSV and JSON.
//! - [`aggregate`] groups a corpus into chart-ready series.
//! - [`chart`] renders those series as SVG artifacts.
//! - [`server`] exposes generation and results over HTTP.

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod profiles;
pub mod record;
pub mod report;
pub mod scaling;
pub mod server;
pub mod store;
pub mod stream;

pub use aggregate::{ChartSummary, LatencyRow, ThroughputRow, WorkloadSeries};
pub use chart::ChartRenderer;
pub use config::{Combination, SuiteConfig};
pub use profiles::{ContentionClass, MapProfile, ProfileEntry, ProfileRegistry};
pub use record::{Corpus, LatencySummary, MapMetrics, ResultDocument, RunRecord};
pub use scaling::ScalingModel;
pub use store::ResultStore;
pub use stream::{ProgressEvent, StreamingReporter};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;

// ────────────────────────────────────────────────────────────────────────────────
// Error type
// ────────────────────────────────────────────────────────────────────────────────

pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Unknown map/workload/thread-count combination or invalid generation parameter.
    #[error("config error: {0}")]
    Config(String),

    #[error("input file not found: {}", .0.display())]
    DataNotFound(PathBuf),

    /// Required tabular columns are absent; `missing` is sorted.
    #[error("missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        BenchError::Config(msg.into())
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Random source
// ────────────────────────────────────────────────────────────────────────────────

/// Deterministic generator when `seed` is set, entropy-seeded otherwise.
pub fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}
