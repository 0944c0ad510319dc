//! Static performance characteristics per (map, workload) pair.
//!
//! A [`ProfileRegistry`] is built once, either from the built-in table or
//! from a TOML file, validated, and read-only afterwards. Lookups never fall
//! back to a default: an unknown map, workload or thread count is a
//! [`BenchError::Config`].
//!
//! ```toml
//! [[maps]]
//! name = "sharded"
//! contention = "partitioned"
//!
//! [maps.workloads.read-heavy]
//! baseline_ops_per_sec = 5300000.0
//! scaling = [{ threads = 4, factor = 1.8 }]
//! ```

use crate::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Thread count whose multiplier is 1 by definition.
pub const REFERENCE_THREADS: u32 = 1;

// ────────────────────────────────────────────────────────────────────────────────
// Contention class
// ────────────────────────────────────────────────────────────────────────────────

/// How a map design behaves under contention; selects the tail latency the
/// generator assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentionClass {
    /// A single lock serialises every operation.
    LockBottlenecked,
    /// Striped/sharded locking.
    Partitioned,
    LockFree,
    /// STM designs that log and validate instead of blocking.
    LogStructured,
}

impl ContentionClass {
    /// p95 (µs) assigned at a non-reference thread count.
    pub fn contended_p95_micros(self) -> f64 {
        match self {
            Self::LockBottlenecked => 15.0,
            Self::Partitioned => 1.0,
            Self::LockFree | Self::LogStructured => 0.0,
        }
    }

    /// p95 (µs) assigned at the reference thread count.
    pub fn baseline_p95_micros(self) -> f64 {
        0.0
    }
}

impl std::fmt::Display for ContentionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LockBottlenecked => write!(f, "lock-bottlenecked"),
            Self::Partitioned => write!(f, "partitioned"),
            Self::LockFree => write!(f, "lock-free"),
            Self::LogStructured => write!(f, "log-structured"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Profile types
// ────────────────────────────────────────────────────────────────────────────────

/// Throughput multiplier relative to the single-thread baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingPoint {
    pub threads: u32,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadProfile {
    /// Ops/sec at the reference thread count.
    pub baseline_ops_per_sec: f64,
    #[serde(default)]
    pub scaling: Vec<ScalingPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapProfile {
    pub name: String,
    pub contention: ContentionClass,
    #[serde(default)]
    pub workloads: BTreeMap<String, WorkloadProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    maps: Vec<MapProfile>,
}

/// Borrowed lookup result for one (map, workload) pair.
#[derive(Debug, Clone, Copy)]
pub struct ProfileEntry<'a> {
    pub map: &'a str,
    pub workload: &'a str,
    pub contention: ContentionClass,
    pub baseline_ops_per_sec: f64,
    scaling: &'a [ScalingPoint],
}

impl ProfileEntry<'_> {
    /// Multiplier at `threads`; only the reference count and explicitly
    /// configured counts are defined.
    pub fn multiplier(&self, threads: u32) -> BenchResult<f64> {
        if threads == REFERENCE_THREADS {
            return Ok(1.0);
        }
        self.scaling
            .iter()
            .find(|p| p.threads == threads)
            .map(|p| p.factor)
            .ok_or_else(|| {
                let configured: Vec<String> =
                    self.thread_counts().iter().map(u32::to_string).collect();
                BenchError::config(format!(
                    "no scaling factor for map '{}' workload '{}' at {} threads (configured: {})",
                    self.map,
                    self.workload,
                    threads,
                    configured.join(", ")
                ))
            })
    }

    /// Thread counts with a defined multiplier, ascending.
    pub fn thread_counts(&self) -> Vec<u32> {
        let mut counts: Vec<u32> = std::iter::once(REFERENCE_THREADS)
            .chain(self.scaling.iter().map(|p| p.threads))
            .collect();
        counts.sort_unstable();
        counts.dedup();
        counts
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    maps: BTreeMap<String, MapProfile>,
}

impl ProfileRegistry {
    /// Validate and index `profiles`.
    pub fn from_profiles(profiles: Vec<MapProfile>) -> BenchResult<Self> {
        let mut maps = BTreeMap::new();
        for profile in profiles {
            validate_profile(&profile)?;
            if maps.contains_key(&profile.name) {
                return Err(BenchError::config(format!(
                    "duplicate map profile '{}'",
                    profile.name
                )));
            }
            maps.insert(profile.name.clone(), profile);
        }
        if maps.is_empty() {
            return Err(BenchError::config("profile registry is empty"));
        }
        Ok(Self { maps })
    }

    pub fn from_toml_str(content: &str) -> BenchResult<Self> {
        let file: RegistryFile = toml::from_str(content)
            .map_err(|e| BenchError::config(format!("failed to parse profile TOML: {e}")))?;
        Self::from_profiles(file.maps)
    }

    /// Load a registry from a TOML file.
    pub fn load(path: &Path) -> BenchResult<Self> {
        if !path.exists() {
            return Err(BenchError::DataNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The five reference maps measured under read-heavy and mixed workloads.
    pub fn builtin() -> Self {
        const TABLE: &[(&str, ContentionClass, &[(&str, f64, f64)])] = &[
            (
                "global",
                ContentionClass::LockBottlenecked,
                &[("read-heavy", 6_500_000.0, 0.35), ("mixed", 5_300_000.0, 0.30)],
            ),
            (
                "sharded",
                ContentionClass::Partitioned,
                &[("read-heavy", 5_300_000.0, 1.80), ("mixed", 5_400_000.0, 1.40)],
            ),
            (
                "skiplist",
                ContentionClass::LockFree,
                &[("read-heavy", 4_000_000.0, 2.75), ("mixed", 3_700_000.0, 2.80)],
            ),
            (
                "tinystm",
                ContentionClass::LogStructured,
                &[("read-heavy", 3_600_000.0, 2.60), ("mixed", 3_200_000.0, 2.70)],
            ),
            (
                "stm",
                ContentionClass::LogStructured,
                &[("read-heavy", 3_400_000.0, 2.80), ("mixed", 2_900_000.0, 3.20)],
            ),
        ];

        let maps = TABLE
            .iter()
            .map(|&(name, contention, workloads)| {
                let workloads = workloads
                    .iter()
                    .map(|&(workload, baseline, factor)| {
                        (
                            workload.to_string(),
                            WorkloadProfile {
                                baseline_ops_per_sec: baseline,
                                scaling: vec![ScalingPoint { threads: 4, factor }],
                            },
                        )
                    })
                    .collect();
                (
                    name.to_string(),
                    MapProfile {
                        name: name.to_string(),
                        contention,
                        workloads,
                    },
                )
            })
            .collect();
        Self { maps }
    }

    pub fn lookup<'a>(&'a self, map: &str, workload: &str) -> BenchResult<ProfileEntry<'a>> {
        let profile = self
            .maps
            .get(map)
            .ok_or_else(|| BenchError::config(format!("unknown map '{map}'")))?;
        let (workload, entry) = profile.workloads.get_key_value(workload).ok_or_else(|| {
            BenchError::config(format!("map '{map}' has no profile for workload '{workload}'"))
        })?;
        Ok(ProfileEntry {
            map: &profile.name,
            workload,
            contention: profile.contention,
            baseline_ops_per_sec: entry.baseline_ops_per_sec,
            scaling: &entry.scaling,
        })
    }

    /// Map identifiers, sorted.
    pub fn maps(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn validate_profile(profile: &MapProfile) -> BenchResult<()> {
    if profile.name.trim().is_empty() {
        return Err(BenchError::config("map profile with empty name"));
    }
    for (workload, entry) in &profile.workloads {
        let ctx = || format!("map '{}' workload '{}'", profile.name, workload);
        if !(entry.baseline_ops_per_sec.is_finite() && entry.baseline_ops_per_sec > 0.0) {
            return Err(BenchError::config(format!(
                "{}: baseline must be positive, got {}",
                ctx(),
                entry.baseline_ops_per_sec
            )));
        }
        let mut seen = Vec::with_capacity(entry.scaling.len());
        for point in &entry.scaling {
            if point.threads == 0 {
                return Err(BenchError::config(format!("{}: thread count 0", ctx())));
            }
            if !(point.factor.is_finite() && point.factor > 0.0) {
                return Err(BenchError::config(format!(
                    "{}: scaling factor at {} threads must be positive, got {}",
                    ctx(),
                    point.threads,
                    point.factor
                )));
            }
            if point.threads == REFERENCE_THREADS && point.factor != 1.0 {
                return Err(BenchError::config(format!(
                    "{}: factor at the reference thread count must be 1.0",
                    ctx()
                )));
            }
            if seen.contains(&point.threads) {
                return Err(BenchError::config(format!(
                    "{}: duplicate scaling entry for {} threads",
                    ctx(),
                    point.threads
                )));
            }
            seen.push(point.threads);
        }
    }
    Ok(())
}
