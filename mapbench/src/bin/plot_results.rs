//! Render charts from a CSV corpus.
//!
//! Usage:
//!   plot_results                                   # results/full_matrix.csv -> results/graphs
//!   plot_results -i runs.csv -o charts --dpi 300

use clap::Parser;
use mapbench::chart::{plot_csv, DEFAULT_DPI};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "plot_results", about = "Render benchmark charts from a CSV corpus")]
struct Cli {
    /// Tabular corpus to read.
    #[arg(short, long, default_value = "results/full_matrix.csv")]
    input: PathBuf,

    /// Directory for chart artifacts.
    #[arg(short, long, default_value = "results/graphs")]
    output: PathBuf,

    /// Output resolution.
    #[arg(long, default_value_t = DEFAULT_DPI, value_parser = clap::value_parser!(u32).range(1..))]
    dpi: u32,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match plot_csv(&cli.input, &cli.output, cli.dpi) {
        Ok(paths) => {
            for path in paths {
                println!("wrote {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
