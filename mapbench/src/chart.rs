//! SVG chart artifacts for aggregated results.
//!
//! One throughput-vs-threads line chart per workload plus a single latency
//! bar chart. Drawing happens in a fixed coordinate space of 100 units per
//! inch; `dpi` only scales the rendered pixel size.

use crate::aggregate::{summarize, ChartSummary, LatencyRow, WorkloadSeries};
use crate::report::format_throughput;
use crate::store;
use crate::{BenchError, BenchResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DPI: u32 = 180;

pub const LATENCY_ARTIFACT: &str = "latency_p95_by_map.svg";

const UNITS_PER_INCH: f64 = 100.0;
const LINE_CHART_INCHES: (f64, f64) = (8.0, 4.5);
const BAR_CHART_INCHES: (f64, f64) = (7.0, 4.0);

const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 60.0;
const Y_TICKS: usize = 5;
const BAR_COLOR: &str = "#3182CE";

const PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
];

/// Read the tabular corpus at `input` and render every chart into `output`.
///
/// A missing file or missing required columns fail before anything is
/// written.
pub fn plot_csv(input: &Path, output: &Path, dpi: u32) -> BenchResult<Vec<PathBuf>> {
    let renderer = ChartRenderer::new(output, dpi)?;
    let corpus = store::read_csv(input)?;
    renderer.render(&summarize(&corpus))
}

/// Writes chart artifacts into a single output directory.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    output_dir: PathBuf,
    dpi: u32,
}

impl ChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, dpi: u32) -> BenchResult<Self> {
        if dpi == 0 {
            return Err(BenchError::config("dpi must be a positive integer"));
        }
        Ok(Self {
            output_dir: output_dir.into(),
            dpi,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render every chart for `summary`, returning the artifact paths in
    /// write order: one per workload, then the latency chart.
    pub fn render(&self, summary: &ChartSummary) -> BenchResult<Vec<PathBuf>> {
        let mut names = BTreeMap::new();
        for series in &summary.series {
            let name = throughput_artifact(&series.workload);
            if let Some(previous) = names.insert(name.clone(), series.workload.as_str()) {
                return Err(BenchError::config(format!(
                    "workloads {previous:?} and {:?} both map to artifact {name}",
                    series.workload
                )));
            }
        }

        fs::create_dir_all(&self.output_dir)?;
        let mut written = Vec::with_capacity(summary.series.len() + 1);
        for series in &summary.series {
            let path = self.output_dir.join(throughput_artifact(&series.workload));
            fs::write(&path, self.throughput_svg(series))?;
            written.push(path);
        }

        let path = self.output_dir.join(LATENCY_ARTIFACT);
        fs::write(&path, self.latency_svg(&summary.latency))?;
        written.push(path);

        tracing::info!(dir = %self.output_dir().display(), artifacts = written.len(), "rendered charts");
        Ok(written)
    }

    fn throughput_svg(&self, series: &WorkloadSeries) -> String {
        let (w, h) = view_box(LINE_CHART_INCHES);
        let plot_w = w - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = h - MARGIN_TOP - MARGIN_BOTTOM;

        let threads: BTreeSet<u32> = series.rows.iter().map(|r| r.threads).collect();
        let (t_min, t_max) = match (threads.first(), threads.last()) {
            (Some(&lo), Some(&hi)) => (lo as f64, hi as f64),
            _ => (0.0, 1.0),
        };
        let x_of = |t: u32| {
            if t_max > t_min {
                MARGIN_LEFT + (t as f64 - t_min) / (t_max - t_min) * plot_w
            } else {
                MARGIN_LEFT + plot_w / 2.0
            }
        };

        let y_max = nice_ceiling(series.rows.iter().map(|r| r.mean_ops_per_sec).fold(0.0, f64::max));
        let y_of = |v: f64| MARGIN_TOP + plot_h - v / y_max * plot_h;

        let mut svg = self.open_svg(LINE_CHART_INCHES);
        svg.push_str(&title(
            w,
            &format!("Throughput vs threads ({})", xml_escape(&series.workload)),
        ));
        svg.push_str(&y_grid(w, y_max, &y_of));

        for &t in &threads {
            let x = x_of(t);
            svg.push_str(&format!(
                "<line x1=\"{x:.1}\" y1=\"{MARGIN_TOP}\" x2=\"{x:.1}\" y2=\"{:.1}\" stroke=\"#dddddd\" stroke-dasharray=\"4 4\"/>",
                MARGIN_TOP + plot_h
            ));
            svg.push_str(&format!(
                "<text x=\"{x:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"12\">{t}</text>",
                MARGIN_TOP + plot_h + 18.0
            ));
        }
        svg.push_str(&axes(w, h));
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"13\">threads</text>",
            MARGIN_LEFT + plot_w / 2.0,
            h - 15.0
        ));
        svg.push_str(&y_label(h, "ops/sec"));

        let mut by_map: BTreeMap<&str, Vec<(u32, f64)>> = BTreeMap::new();
        for row in &series.rows {
            by_map
                .entry(row.map.as_str())
                .or_default()
                .push((row.threads, row.mean_ops_per_sec));
        }

        for (idx, (map, points)) in by_map.iter().enumerate() {
            let color = PALETTE[idx % PALETTE.len()];
            let coords: Vec<String> = points
                .iter()
                .map(|&(t, v)| format!("{:.1},{:.1}", x_of(t), y_of(v)))
                .collect();
            svg.push_str(&format!(
                "<polyline points=\"{}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"2\"/>",
                coords.join(" ")
            ));
            for &(t, v) in points {
                svg.push_str(&format!(
                    "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3.5\" fill=\"{color}\"/>",
                    x_of(t),
                    y_of(v)
                ));
            }

            // Legend
            let ly = MARGIN_TOP + 14.0 + idx as f64 * 18.0;
            let lx = MARGIN_LEFT + 12.0;
            svg.push_str(&format!(
                "<line x1=\"{lx:.1}\" y1=\"{ly:.1}\" x2=\"{:.1}\" y2=\"{ly:.1}\" stroke=\"{color}\" stroke-width=\"2\"/>",
                lx + 20.0
            ));
            svg.push_str(&format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"sans-serif\" font-size=\"12\">{}</text>",
                lx + 26.0,
                ly + 4.0,
                xml_escape(map)
            ));
        }

        svg.push_str("</svg>\n");
        svg
    }

    /// Bars follow `rows` order, which the aggregator sorts ascending.
    fn latency_svg(&self, rows: &[LatencyRow]) -> String {
        let (w, h) = view_box(BAR_CHART_INCHES);
        let plot_w = w - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = h - MARGIN_TOP - MARGIN_BOTTOM;

        let y_max = nice_ceiling(rows.iter().map(|r| r.mean_p95_micros).fold(0.0, f64::max));
        let y_of = |v: f64| MARGIN_TOP + plot_h - v / y_max * plot_h;

        let mut svg = self.open_svg(BAR_CHART_INCHES);
        svg.push_str(&title(w, "Mean p95 latency by map"));
        svg.push_str(&y_grid(w, y_max, &y_of));

        let slot = if rows.is_empty() {
            plot_w
        } else {
            plot_w / rows.len() as f64
        };
        for (idx, row) in rows.iter().enumerate() {
            let x = MARGIN_LEFT + idx as f64 * slot + slot * 0.15;
            let y = y_of(row.mean_p95_micros);
            svg.push_str(&format!(
                "<rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{BAR_COLOR}\"/>",
                slot * 0.7,
                MARGIN_TOP + plot_h - y
            ));
            svg.push_str(&format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"12\">{}</text>",
                x + slot * 0.35,
                MARGIN_TOP + plot_h + 18.0,
                xml_escape(&row.map)
            ));
        }
        svg.push_str(&axes(w, h));
        svg.push_str(&y_label(h, "p95 (us)"));
        svg.push_str("</svg>\n");
        svg
    }

    fn open_svg(&self, inches: (f64, f64)) -> String {
        let (vw, vh) = view_box(inches);
        let px_w = (inches.0 * self.dpi as f64).round() as u64;
        let px_h = (inches.1 * self.dpi as f64).round() as u64;
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{px_w}\" height=\"{px_h}\" viewBox=\"0 0 {vw} {vh}\">\
             <rect width=\"{vw}\" height=\"{vh}\" fill=\"#ffffff\"/>"
        )
    }
}

/// Artifact file name for a workload's throughput chart.
pub fn throughput_artifact(workload: &str) -> String {
    let safe: String = workload
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("ops_per_sec_{safe}.svg")
}

fn view_box(inches: (f64, f64)) -> (f64, f64) {
    (inches.0 * UNITS_PER_INCH, inches.1 * UNITS_PER_INCH)
}

/// Axis ceiling: the next 1/2/5 × 10^k step above `max`, never zero.
fn nice_ceiling(max: f64) -> f64 {
    if !(max.is_finite() && max > 0.0) {
        return 1.0;
    }
    let magnitude = 10f64.powi(max.log10().floor() as i32);
    for step in [1.0, 2.0, 5.0, 10.0] {
        if step * magnitude >= max {
            return step * magnitude;
        }
    }
    10.0 * magnitude
}

fn title(width: f64, text: &str) -> String {
    format!(
        "<text x=\"{:.1}\" y=\"28\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"16\" font-weight=\"bold\">{text}</text>",
        width / 2.0
    )
}

fn y_grid(width: f64, y_max: f64, y_of: &dyn Fn(f64) -> f64) -> String {
    let mut out = String::new();
    for i in 0..=Y_TICKS {
        let value = y_max * i as f64 / Y_TICKS as f64;
        let y = y_of(value);
        out.push_str(&format!(
            "<line x1=\"{MARGIN_LEFT}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"#dddddd\" stroke-dasharray=\"4 4\"/>",
            width - MARGIN_RIGHT
        ));
        out.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-family=\"sans-serif\" font-size=\"11\">{}</text>",
            MARGIN_LEFT - 6.0,
            y + 4.0,
            format_throughput(value)
        ));
    }
    out
}

fn axes(width: f64, height: f64) -> String {
    let bottom = height - MARGIN_BOTTOM;
    format!(
        "<line x1=\"{MARGIN_LEFT}\" y1=\"{MARGIN_TOP}\" x2=\"{MARGIN_LEFT}\" y2=\"{bottom:.1}\" stroke=\"#333333\"/>\
         <line x1=\"{MARGIN_LEFT}\" y1=\"{bottom:.1}\" x2=\"{:.1}\" y2=\"{bottom:.1}\" stroke=\"#333333\"/>",
        width - MARGIN_RIGHT
    )
}

fn y_label(height: f64, text: &str) -> String {
    let cy = MARGIN_TOP + (height - MARGIN_TOP - MARGIN_BOTTOM) / 2.0;
    format!(
        "<text x=\"18\" y=\"{cy:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"13\" transform=\"rotate(-90 18 {cy:.1})\">{text}</text>"
    )
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::summarize;
    use crate::record::tests::record;
    use crate::record::Corpus;
    use tempfile::TempDir;

    fn two_workload_corpus() -> Corpus {
        let mut runs = Vec::new();
        for map in ["global", "skiplist"] {
            for workload in ["mixed", "read-heavy"] {
                for threads in [1, 4] {
                    runs.push(record(map, workload, threads, 1, 1_000_000.0 * threads as f64));
                }
            }
        }
        Corpus::from(runs)
    }

    #[test]
    fn test_renders_one_chart_per_workload_plus_latency() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("graphs");
        let renderer = ChartRenderer::new(&out, DEFAULT_DPI).unwrap();

        let written = renderer.render(&summarize(&two_workload_corpus())).unwrap();
        assert_eq!(
            written,
            vec![
                out.join("ops_per_sec_mixed.svg"),
                out.join("ops_per_sec_read-heavy.svg"),
                out.join(LATENCY_ARTIFACT),
            ]
        );
        assert_eq!(fs::read_dir(&out).unwrap().count(), 3);
        for path in &written {
            let svg = fs::read_to_string(path).unwrap();
            assert!(svg.starts_with("<svg"));
            assert!(svg.trim_end().ends_with("</svg>"));
        }
    }

    #[test]
    fn test_empty_summary_still_writes_latency_chart() {
        let tmp = TempDir::new().unwrap();
        let renderer = ChartRenderer::new(tmp.path(), 72).unwrap();
        let written = renderer.render(&ChartSummary::default()).unwrap();
        assert_eq!(written, vec![tmp.path().join(LATENCY_ARTIFACT)]);
    }

    #[test]
    fn test_dpi_scales_pixel_size_only() {
        let tmp = TempDir::new().unwrap();
        let summary = summarize(&two_workload_corpus());
        ChartRenderer::new(tmp.path().join("a"), 100).unwrap().render(&summary).unwrap();
        ChartRenderer::new(tmp.path().join("b"), 200).unwrap().render(&summary).unwrap();

        let a = fs::read_to_string(tmp.path().join("a/ops_per_sec_mixed.svg")).unwrap();
        let b = fs::read_to_string(tmp.path().join("b/ops_per_sec_mixed.svg")).unwrap();
        assert!(a.contains("width=\"800\" height=\"450\""));
        assert!(b.contains("width=\"1600\" height=\"900\""));
        assert!(a.contains("viewBox=\"0 0 800 450\""));
        assert!(b.contains("viewBox=\"0 0 800 450\""));

        assert!(matches!(ChartRenderer::new(tmp.path(), 0), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_latency_bars_follow_ascending_order() {
        let tmp = TempDir::new().unwrap();
        let mut runs = vec![
            record("global", "mixed", 4, 1, 1.0),
            record("sharded", "mixed", 4, 1, 1.0),
            record("skiplist", "mixed", 4, 1, 1.0),
        ];
        runs[1].latency.p95_micros = 1.0;
        runs[2].latency.p95_micros = 0.0;
        let renderer = ChartRenderer::new(tmp.path(), DEFAULT_DPI).unwrap();
        renderer.render(&summarize(&Corpus::from(runs))).unwrap();

        let svg = fs::read_to_string(tmp.path().join(LATENCY_ARTIFACT)).unwrap();
        let pos = |name: &str| svg.find(&format!(">{name}</text>")).unwrap();
        assert!(pos("skiplist") < pos("sharded"));
        assert!(pos("sharded") < pos("global"));
        assert_eq!(svg.matches(BAR_COLOR).count(), 3);
    }

    #[test]
    fn test_artifact_name_collision_rejected() {
        let tmp = TempDir::new().unwrap();
        let corpus = Corpus::from(vec![
            record("global", "read heavy", 1, 1, 1.0),
            record("global", "read_heavy", 1, 1, 1.0),
        ]);
        let renderer = ChartRenderer::new(tmp.path().join("out"), DEFAULT_DPI).unwrap();
        assert!(matches!(
            renderer.render(&summarize(&corpus)),
            Err(BenchError::Config(_))
        ));
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn test_labels_are_escaped() {
        let tmp = TempDir::new().unwrap();
        let corpus = Corpus::from(vec![record("a<b>&c", "mixed", 1, 1, 10.0)]);
        let renderer = ChartRenderer::new(tmp.path(), DEFAULT_DPI).unwrap();
        renderer.render(&summarize(&corpus)).unwrap();
        let svg = fs::read_to_string(tmp.path().join("ops_per_sec_mixed.svg")).unwrap();
        assert!(svg.contains("a&lt;b&gt;&amp;c"));
        assert!(!svg.contains("a<b>"));
    }

    #[test]
    fn test_plot_csv_writes_each_artifact() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("full_matrix.csv");
        crate::store::write_csv(&two_workload_corpus(), &input).unwrap();
        let out = tmp.path().join("graphs");

        let paths = plot_csv(&input, &out, DEFAULT_DPI).unwrap();
        assert_eq!(
            paths,
            vec![
                out.join("ops_per_sec_mixed.svg"),
                out.join("ops_per_sec_read-heavy.svg"),
                out.join(LATENCY_ARTIFACT),
            ]
        );
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_plot_csv_missing_input() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("graphs");
        let err = plot_csv(&tmp.path().join("absent.csv"), &out, DEFAULT_DPI).unwrap_err();
        assert!(matches!(err, BenchError::DataNotFound(_)));
        assert!(err.to_string().starts_with("input file not found"));
        assert!(!out.exists());
    }

    #[test]
    fn test_plot_csv_missing_columns() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("partial.csv");
        std::fs::write(
            &input,
            "map,workload,threads,operations,ops_per_sec,duration_ms\nglobal,mixed,1,10,1.0,10000\n",
        )
        .unwrap();
        let out = tmp.path().join("graphs");

        let err = plot_csv(&input, &out, DEFAULT_DPI).unwrap_err();
        match &err {
            BenchError::Schema { missing } => assert_eq!(missing, &["p95_us", "repeat"]),
            other => panic!("expected schema error, got {other:?}"),
        }
        assert_eq!(err.to_string(), "missing required columns: p95_us, repeat");
        assert!(!out.exists());
    }

    #[test]
    fn test_nice_ceiling() {
        assert_eq!(nice_ceiling(0.0), 1.0);
        assert_eq!(nice_ceiling(15.0), 20.0);
        assert_eq!(nice_ceiling(7.5), 10.0);
        assert_eq!(nice_ceiling(4_200_000.0), 5_000_000.0);
    }
}
