//! Contention-aware synthetic performance generator.
//!
//! Each record is computed from its profile entry:
//!
//! ```text
//! operations = round(baseline × multiplier(threads) × duration_s × jitter)
//! ops_per_sec = operations / duration_s
//! ```
//!
//! `jitter` is drawn uniformly from `[1 − amplitude, 1 + amplitude]`. The raw
//! count is jittered first and throughput derived from it, so
//! `ops_per_sec × duration_s` always reproduces `operations`. Tail latency is
//! assigned from the map's contention class rather than sampled.

use crate::profiles::{ProfileEntry, REFERENCE_THREADS};
use crate::record::{LatencySummary, MapMetrics, RunRecord};
use crate::{BenchError, BenchResult};
use rand::Rng;
use rand_distr::Uniform;

/// ±5% run-to-run noise.
pub const DEFAULT_JITTER: f64 = 0.05;

/// Simulated measurement window.
pub const DEFAULT_DURATION_MS: u64 = 3_000;

#[derive(Debug, Clone)]
pub struct ScalingModel {
    jitter: Uniform<f64>,
    duration_ms: u64,
}

impl ScalingModel {
    /// `amplitude` must lie in `[0, 1)` so a jittered count can never go
    /// negative.
    pub fn new(amplitude: f64, duration_ms: u64) -> BenchResult<Self> {
        if !amplitude.is_finite() || !(0.0..1.0).contains(&amplitude) {
            return Err(BenchError::config(format!(
                "jitter amplitude must be in [0, 1), got {amplitude}"
            )));
        }
        if duration_ms == 0 {
            return Err(BenchError::config("run duration must be positive"));
        }
        Ok(Self {
            jitter: Uniform::new_inclusive(1.0 - amplitude, 1.0 + amplitude),
            duration_ms,
        })
    }

    /// Produce one synthetic record for `entry` at `threads`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        entry: &ProfileEntry<'_>,
        threads: u32,
        repeat: u32,
        rng: &mut R,
    ) -> BenchResult<RunRecord> {
        if repeat == 0 {
            return Err(BenchError::config("repeat index is 1-based"));
        }
        let multiplier = entry.multiplier(threads)?;
        let p95 = if threads == REFERENCE_THREADS {
            entry.contention.baseline_p95_micros()
        } else {
            entry.contention.contended_p95_micros()
        };

        let duration_secs = self.duration_ms as f64 / 1_000.0;
        let jitter = rng.sample(&self.jitter);
        let operations =
            (entry.baseline_ops_per_sec * multiplier * duration_secs * jitter).round().max(0.0) as u64;
        let ops_per_sec = operations as f64 / duration_secs;

        Ok(RunRecord {
            map: entry.map.to_string(),
            workload: entry.workload.to_string(),
            threads,
            repeat,
            operations,
            ops_per_sec,
            duration_millis: self.duration_ms,
            latency: LatencySummary::with_p95(p95),
            metrics: MapMetrics::default(),
        })
    }
}

impl Default for ScalingModel {
    fn default() -> Self {
        Self {
            jitter: Uniform::new_inclusive(1.0 - DEFAULT_JITTER, 1.0 + DEFAULT_JITTER),
            duration_ms: DEFAULT_DURATION_MS,
        }
    }
}
