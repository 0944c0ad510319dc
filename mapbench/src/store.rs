//! Corpus persistence: CSV (one row per run) and the `{config, runs}` JSON
//! document.
//!
//! CSV header names are matched case-sensitively and exactly. The eight
//! [`REQUIRED_COLUMNS`] must all be present or loading fails with
//! [`BenchError::Schema`]; the [`OPTIONAL_COLUMNS`] default to zero so that
//! files from an external runner carrying only the required set still load.

use crate::record::{Corpus, LatencySummary, MapMetrics, ResultDocument, RunRecord};
use crate::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const REQUIRED_COLUMNS: [&str; 8] = [
    "map",
    "workload",
    "threads",
    "repeat",
    "operations",
    "ops_per_sec",
    "duration_ms",
    "p95_us",
];

pub const OPTIONAL_COLUMNS: [&str; 6] = [
    "avg_us",
    "p50_us",
    "p99_us",
    "stm_commits",
    "stm_aborts",
    "stm_max_retries",
];

/// Location of the structured document, relative to the results directory.
pub const DOCUMENT_PATH: &str = "benchmarks/all_maps_quick.json";

// ────────────────────────────────────────────────────────────────────────────────
// CSV row
// ────────────────────────────────────────────────────────────────────────────────

/// Column order on write: required columns first, then optional ones.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    map: String,
    workload: String,
    threads: u32,
    repeat: u32,
    operations: u64,
    ops_per_sec: f64,
    duration_ms: u64,
    p95_us: f64,
    #[serde(default)]
    avg_us: f64,
    #[serde(default)]
    p50_us: f64,
    #[serde(default)]
    p99_us: f64,
    #[serde(default)]
    stm_commits: u64,
    #[serde(default)]
    stm_aborts: u64,
    #[serde(default)]
    stm_max_retries: u64,
}

impl From<&RunRecord> for CsvRow {
    fn from(r: &RunRecord) -> Self {
        Self {
            map: r.map.clone(),
            workload: r.workload.clone(),
            threads: r.threads,
            repeat: r.repeat,
            operations: r.operations,
            ops_per_sec: r.ops_per_sec,
            duration_ms: r.duration_millis,
            p95_us: r.latency.p95_micros,
            avg_us: r.latency.mean_micros,
            p50_us: r.latency.p50_micros,
            p99_us: r.latency.p99_micros,
            stm_commits: r.metrics.stm_commits,
            stm_aborts: r.metrics.stm_aborts,
            stm_max_retries: r.metrics.max_retries,
        }
    }
}

impl From<CsvRow> for RunRecord {
    fn from(row: CsvRow) -> Self {
        Self {
            map: row.map,
            workload: row.workload,
            threads: row.threads,
            repeat: row.repeat,
            operations: row.operations,
            ops_per_sec: row.ops_per_sec,
            duration_millis: row.duration_ms,
            latency: LatencySummary {
                mean_micros: row.avg_us,
                p50_micros: row.p50_us,
                p95_micros: row.p95_us,
                p99_micros: row.p99_us,
            },
            metrics: MapMetrics {
                stm_commits: row.stm_commits,
                stm_aborts: row.stm_aborts,
                max_retries: row.stm_max_retries,
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// CSV
// ────────────────────────────────────────────────────────────────────────────────

pub fn write_csv_to<W: Write>(corpus: &Corpus, writer: W) -> BenchResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if corpus.is_empty() {
        // serialize() only emits the header alongside the first row.
        wtr.write_record(REQUIRED_COLUMNS.iter().chain(OPTIONAL_COLUMNS.iter()))?;
    }
    for record in corpus {
        wtr.serialize(CsvRow::from(record))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv(corpus: &Corpus, path: &Path) -> BenchResult<()> {
    ensure_parent(path)?;
    let file = fs::File::create(path)?;
    write_csv_to(corpus, file)?;
    tracing::debug!(path = %path.display(), runs = corpus.len(), "wrote CSV corpus");
    Ok(())
}

/// Parse a CSV corpus, refusing it outright if any required column is absent.
pub fn read_csv_from<R: Read>(reader: R) -> BenchResult<Corpus> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let present: BTreeSet<&str> = headers.iter().collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !present.contains(*c))
        .map(|c| c.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !missing.is_empty() {
        return Err(BenchError::Schema { missing });
    }

    let mut corpus = Corpus::new();
    for row in rdr.deserialize::<CsvRow>() {
        corpus.push(row?.into());
    }
    Ok(corpus)
}

pub fn read_csv(path: &Path) -> BenchResult<Corpus> {
    if !path.exists() {
        return Err(BenchError::DataNotFound(path.to_path_buf()));
    }
    let corpus = read_csv_from(fs::File::open(path)?)?;
    tracing::debug!(path = %path.display(), runs = corpus.len(), "loaded CSV corpus");
    Ok(corpus)
}

// ────────────────────────────────────────────────────────────────────────────────
// JSON
// ────────────────────────────────────────────────────────────────────────────────

/// Pretty-printed, written through a temporary sibling and renamed into place
/// so readers never observe a half-written document.
pub fn write_json(document: &ResultDocument, path: &Path) -> BenchResult<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(document)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    tracing::debug!(path = %path.display(), runs = document.runs.len(), "wrote JSON document");
    Ok(())
}

pub fn read_json(path: &Path) -> BenchResult<ResultDocument> {
    if !path.exists() {
        return Err(BenchError::DataNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn ensure_parent(path: &Path) -> BenchResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────────
// Result store
// ────────────────────────────────────────────────────────────────────────────────

/// Results directory handle; every path it touches lives under `root`.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self) -> PathBuf {
        self.root.join(DOCUMENT_PATH)
    }

    /// Persist `document` at [`DOCUMENT_PATH`], returning where it went.
    pub fn persist(&self, document: &ResultDocument) -> BenchResult<PathBuf> {
        let path = self.document_path();
        write_json(document, &path)?;
        tracing::info!(path = %path.display(), runs = document.runs.len(), "persisted results");
        Ok(path)
    }

    /// The persisted document, or `None` when nothing has been generated yet.
    pub fn load(&self) -> BenchResult<Option<ResultDocument>> {
        match read_json(&self.document_path()) {
            Ok(doc) => Ok(Some(doc)),
            Err(BenchError::DataNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::record;
    use tempfile::TempDir;

    fn sample_corpus() -> Corpus {
        let mut a = record("global", "read-heavy", 4, 1, 2_274_999.333_333_333_5);
        a.latency = LatencySummary {
            mean_micros: 3.25,
            p50_micros: 2.0,
            p95_micros: 15.0,
            p99_micros: 41.0,
        };
        let mut b = record("tinystm", "mixed", 1, 2, 3_200_123.0 / 3.0);
        b.metrics = MapMetrics { stm_commits: 9_600_369, stm_aborts: 1_204, max_retries: 7 };
        Corpus::from(vec![a, b, record("skiplist", "mixed", 4, 1, 0.1 + 0.2)])
    }

    #[test]
    fn test_csv_round_trip_preserves_every_field() {
        let corpus = sample_corpus();
        let mut buf = Vec::new();
        write_csv_to(&corpus, &mut buf).unwrap();
        let loaded = read_csv_from(buf.as_slice()).unwrap();
        assert_eq!(loaded, corpus);
    }

    #[test]
    fn test_csv_header_order() {
        let mut buf = Vec::new();
        write_csv_to(&sample_corpus(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let header = text.lines().next().unwrap();
        let expected: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .chain(OPTIONAL_COLUMNS.iter())
            .copied()
            .collect();
        assert_eq!(header, expected.join(","));
    }

    #[test]
    fn test_json_round_trip_preserves_every_field() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path());
        let mut config = serde_json::Map::new();
        config.insert("repeats".into(), serde_json::json!(2));
        let doc = ResultDocument::new(config, sample_corpus());

        let path = store.persist(&doc).unwrap();
        assert_eq!(path, tmp.path().join("benchmarks/all_maps_quick.json"));
        assert_eq!(store.load().unwrap(), Some(doc));
    }

    #[test]
    fn test_load_absent_document() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(ResultStore::new(tmp.path()).load().unwrap(), None);
    }

    #[test]
    fn test_missing_columns_reported_sorted() {
        let csv = "map,workload,threads,operations,ops_per_sec,duration_ms\n\
                   global,mixed,1,100,33.3,3000\n";
        match read_csv_from(csv.as_bytes()) {
            Err(BenchError::Schema { missing }) => assert_eq!(missing, vec!["p95_us", "repeat"]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_column_names_are_case_sensitive() {
        let csv = "MAP,workload,threads,repeat,operations,ops_per_sec,duration_ms,p95_us\n";
        match read_csv_from(csv.as_bytes()) {
            Err(BenchError::Schema { missing }) => assert_eq!(missing, vec!["map"]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_required_columns_only() {
        let csv = "map,workload,threads,repeat,operations,ops_per_sec,duration_ms,p95_us\n\
                   sharded,read-heavy,4,2,28620000,9540000,3000,1\n";
        let corpus = read_csv_from(csv.as_bytes()).unwrap();
        let r = &corpus.records()[0];
        assert_eq!(r.map, "sharded");
        assert_eq!(r.repeat, 2);
        assert_eq!(r.latency.p95_micros, 1.0);
        assert_eq!(r.latency.mean_micros, 0.0);
        assert_eq!(r.metrics, MapMetrics::default());
        assert!(r.throughput_consistent());
    }

    #[test]
    fn test_missing_file_is_data_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = read_csv(&tmp.path().join("full_matrix.csv")).unwrap_err();
        assert!(matches!(err, BenchError::DataNotFound(_)));
    }

    #[test]
    fn test_write_csv_creates_parent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/full_matrix.csv");
        write_csv(&sample_corpus(), &path).unwrap();
        assert_eq!(read_csv(&path).unwrap(), sample_corpus());
    }
}
