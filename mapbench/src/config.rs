//! Generation suite configuration.
//!
//! Describes the combination space (maps × workloads × thread counts ×
//! repeats) and the generator parameters. Every field has a default, so a
//! TOML file only needs to name what it overrides:
//!
//! ```toml
//! maps = ["global", "skiplist"]
//! thread_counts = [1, 4]
//! repeats = 3
//! seed = 1337
//! ```

use crate::profiles::ProfileRegistry;
use crate::scaling::{ScalingModel, DEFAULT_DURATION_MS, DEFAULT_JITTER};
use crate::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    pub maps: Vec<String>,
    pub workloads: Vec<String>,
    pub thread_counts: Vec<u32>,
    pub repeats: u32,
    pub duration_ms: u64,
    /// Jitter amplitude, `[0, 1)`.
    pub jitter: f64,
    /// Fixed seed for reproducible corpora; entropy when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Per-record delay for streaming clients. Does not affect the corpus.
    pub pacing_ms: u64,
    pub results_dir: PathBuf,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            maps: ["global", "sharded", "skiplist", "tinystm", "stm"]
                .into_iter()
                .map(String::from)
                .collect(),
            workloads: vec!["read-heavy".to_string(), "mixed".to_string()],
            thread_counts: vec![1, 4],
            repeats: 2,
            duration_ms: DEFAULT_DURATION_MS,
            jitter: DEFAULT_JITTER,
            seed: None,
            pacing_ms: 100,
            results_dir: PathBuf::from("results"),
        }
    }
}

/// One point of the combination space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination {
    pub map: String,
    pub workload: String,
    pub threads: u32,
    pub repeat: u32,
}

impl SuiteConfig {
    pub fn from_toml_str(content: &str) -> BenchResult<Self> {
        toml::from_str(content)
            .map_err(|e| BenchError::config(format!("failed to parse suite TOML: {e}")))
    }

    /// Load suite configuration from a TOML file.
    pub fn load(path: &Path) -> BenchResult<Self> {
        if !path.exists() {
            return Err(BenchError::DataNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check the axes and generator parameters, without consulting profiles.
    pub fn validate(&self) -> BenchResult<()> {
        non_empty_unique("maps", &self.maps)?;
        non_empty_unique("workloads", &self.workloads)?;
        non_empty_unique("thread_counts", &self.thread_counts)?;
        if self.thread_counts.contains(&0) {
            return Err(BenchError::config("thread counts must be positive"));
        }
        if self.repeats == 0 {
            return Err(BenchError::config("repeats must be positive"));
        }
        self.scaling_model().map(|_| ())
    }

    /// Check every (map, workload, threads) triple against `registry`, so a
    /// bad combination is reported before anything is generated.
    pub fn validate_against(&self, registry: &ProfileRegistry) -> BenchResult<()> {
        self.validate()?;
        for map in &self.maps {
            for workload in &self.workloads {
                let entry = registry.lookup(map, workload)?;
                for &threads in &self.thread_counts {
                    entry.multiplier(threads)?;
                }
            }
        }
        Ok(())
    }

    pub fn scaling_model(&self) -> BenchResult<ScalingModel> {
        ScalingModel::new(self.jitter, self.duration_ms)
    }

    pub fn total_runs(&self) -> usize {
        self.maps.len() * self.workloads.len() * self.thread_counts.len() * self.repeats as usize
    }

    /// The full cross product: map outermost, then workload, thread count
    /// and repeat. Records and progress events follow this order.
    pub fn combinations(&self) -> impl Iterator<Item = Combination> + '_ {
        self.maps.iter().flat_map(move |map| {
            self.workloads.iter().flat_map(move |workload| {
                self.thread_counts.iter().flat_map(move |&threads| {
                    (1..=self.repeats).map(move |repeat| Combination {
                        map: map.clone(),
                        workload: workload.clone(),
                        threads,
                        repeat,
                    })
                })
            })
        })
    }

    /// JSON object embedded as the `config` block of result documents.
    pub fn to_document_config(&self) -> BenchResult<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(BenchError::config(format!(
                "suite config serialised to non-object: {other}"
            ))),
        }
    }

    /// Root of every persisted artifact.
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }
}

fn non_empty_unique<T: std::hash::Hash + Eq + std::fmt::Debug>(
    axis: &str,
    values: &[T],
) -> BenchResult<()> {
    if values.is_empty() {
        return Err(BenchError::config(format!("{axis} must not be empty")));
    }
    let mut seen = HashSet::with_capacity(values.len());
    for value in values {
        if !seen.insert(value) {
            return Err(BenchError::config(format!("duplicate {axis} entry {value:?}")));
        }
    }
    Ok(())
}
