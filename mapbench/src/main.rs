//! Concurrent map benchmark generator and results server.
//!
//! Usage:
//!   mapbench serve --port 5000                 # HTTP stream + results API
//!   mapbench generate                          # generate, print, write CSV
//!   mapbench generate --config suite.toml --seed 42 --csv out/full_matrix.csv

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use mapbench::store::{self, DOCUMENT_PATH};
use mapbench::stream::ProgressEvent;
use mapbench::{
    report, seeded_rng, server, BenchError, BenchResult, ProfileRegistry, ResultStore,
    StreamingReporter, SuiteConfig,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mapbench", about = "Concurrent map benchmark generator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the streaming generator and stored results over HTTP.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, default_value = "5000")]
        port: u16,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate a corpus without an HTTP client and print a summary.
    Generate {
        /// Override the suite seed.
        #[arg(long)]
        seed: Option<u64>,

        /// CSV output (default: <results_dir>/full_matrix.csv).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Extra copy of the JSON document.
        #[arg(long)]
        json: Option<PathBuf>,

        /// Suppress progress lines and the summary tables.
        #[arg(short, long)]
        quiet: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Suite configuration TOML.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Map profile TOML (default: built-in table).
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,
}

impl CommonArgs {
    fn load(&self) -> BenchResult<(SuiteConfig, ProfileRegistry)> {
        let suite = match &self.config {
            Some(path) => SuiteConfig::load(path)?,
            None => SuiteConfig::default(),
        };
        let registry = match &self.profiles {
            Some(path) => ProfileRegistry::load(path)?,
            None => ProfileRegistry::builtin(),
        };
        Ok((suite, registry))
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve { host, port, common } => {
            init_tracing(common.debug);
            serve(host, port, &common).await
        }
        Command::Generate {
            seed,
            csv,
            json,
            quiet,
            common,
        } => {
            init_tracing(common.debug);
            generate(seed, csv, json, quiet, &common).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn serve(host: String, port: u16, common: &CommonArgs) -> BenchResult<()> {
    let (suite, registry) = common.load()?;
    suite.validate()?;
    let addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .map_err(|e| BenchError::Config(format!("invalid address {host}:{port}: {e}")))?;

    println!("{}", "▶ Concurrent map benchmark server".bold().blue());
    println!("  Listening on http://{addr}");
    println!("  Results dir: {}", suite.results_dir().display());

    server::serve(addr, server::AppState::new(suite, registry)).await
}

async fn generate(
    seed: Option<u64>,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
    quiet: bool,
    common: &CommonArgs,
) -> BenchResult<()> {
    let (mut suite, registry) = common.load()?;
    if seed.is_some() {
        suite.seed = seed;
    }
    let results = ResultStore::new(suite.results_dir());
    let csv_path = csv.unwrap_or_else(|| suite.results_dir().join("full_matrix.csv"));

    let rng = seeded_rng(suite.seed);
    let reporter = StreamingReporter::new(suite, Arc::new(registry), results.clone(), rng)
        .with_pacing(Duration::ZERO);
    let (mut rx, handle) = reporter.spawn();

    while let Some(event) = rx.recv().await {
        match event {
            ProgressEvent::Line(line) if !quiet => println!("{line}"),
            ProgressEvent::Line(_) | ProgressEvent::Done => {}
            // Surfaced through the task result below.
            ProgressEvent::Error(_) => {}
        }
    }
    let corpus = handle
        .await
        .map_err(|e| BenchError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

    store::write_csv(&corpus, &csv_path)?;
    println!("wrote {}", csv_path.display());
    println!("wrote {}", results.root().join(DOCUMENT_PATH).display());

    if let Some(path) = json {
        let document = results
            .load()?
            .ok_or_else(|| BenchError::DataNotFound(results.document_path()))?;
        store::write_json(&document, &path)?;
        println!("wrote {}", path.display());
    }

    if !quiet {
        report::print_corpus(&corpus);
    }
    Ok(())
}
