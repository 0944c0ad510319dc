//! Streaming corpus generation.
//!
//! [`StreamingReporter`] walks the configured combination space in its fixed
//! nested order, generates one record per combination and pushes a progress
//! line for each over an mpsc channel. Once the corpus is complete it is
//! persisted through the [`ResultStore`] and the stream is closed with
//! either [`ProgressEvent::Done`] or [`ProgressEvent::Error`].
//!
//! The producer never waits on a departed consumer: failed sends are
//! dropped and generation continues to persistence.

use crate::config::SuiteConfig;
use crate::profiles::ProfileRegistry;
use crate::record::{Corpus, ResultDocument, RunRecord};
use crate::store::ResultStore;
use crate::{BenchError, BenchResult};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Bound on queued progress events between producer and consumer.
pub const CHANNEL_CAPACITY: usize = 16;

/// Literal payload of the completion event.
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// One line of progress text.
    Line(String),
    /// Terminal failure.
    Error(String),
    /// Terminal success.
    Done,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Error(_) | ProgressEvent::Done)
    }

    /// Text carried in the event's `data` field.
    pub fn data(&self) -> &str {
        match self {
            ProgressEvent::Line(text) | ProgressEvent::Error(text) => text,
            ProgressEvent::Done => DONE_MARKER,
        }
    }
}

/// Column titles aligned with [`format_record`].
pub fn header_line() -> String {
    format!(
        "{:<10} {:<12} {:<7} {:<7} {:<12} {:<12} {:<12} {:<9}",
        "Map", "Workload", "Threads", "Repeat", "Operations", "Ops/sec", "Duration(ms)", "P95(us)"
    )
}

pub fn format_record(r: &RunRecord) -> String {
    format!(
        "{:<10} {:<12} {:<7} {:<7} {:<12} {:<12.2} {:<12} {:<9}",
        r.map,
        r.workload,
        r.threads,
        r.repeat,
        r.operations,
        r.ops_per_sec,
        r.duration_millis,
        r.latency.p95_micros
    )
}

/// Single producer of a corpus. Consumed by [`run`](Self::run).
pub struct StreamingReporter<R> {
    suite: SuiteConfig,
    registry: Arc<ProfileRegistry>,
    store: ResultStore,
    rng: R,
    pacing: Duration,
}

impl<R: Rng + Send + 'static> StreamingReporter<R> {
    /// Pacing defaults to the suite's `pacing_ms`.
    pub fn new(suite: SuiteConfig, registry: Arc<ProfileRegistry>, store: ResultStore, rng: R) -> Self {
        let pacing = Duration::from_millis(suite.pacing_ms);
        Self {
            suite,
            registry,
            store,
            rng,
            pacing,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Generate, stream and persist the whole corpus.
    ///
    /// The full plan is validated against the registry before the first
    /// record, so an invalid combination yields an error event and an empty
    /// result rather than a partial corpus.
    pub async fn run(self, tx: mpsc::Sender<ProgressEvent>) -> BenchResult<Corpus> {
        let StreamingReporter {
            suite,
            registry,
            store,
            mut rng,
            pacing,
        } = self;

        let total = suite.total_runs();
        emit(
            &tx,
            ProgressEvent::Line(format!("▶ Starting benchmark generation ({total} runs)...")),
        )
        .await;

        let plan = suite
            .validate_against(&registry)
            .and_then(|()| suite.scaling_model());
        let model = match plan {
            Ok(model) => model,
            Err(e) => return fail(&tx, "rejected generation plan", e).await,
        };
        tracing::info!(runs = total, seed = ?suite.seed, "generation started");

        emit(&tx, ProgressEvent::Line(header_line())).await;

        let mut corpus = Corpus::with_capacity(total);
        for combo in suite.combinations() {
            if !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            let generated = registry
                .lookup(&combo.map, &combo.workload)
                .and_then(|entry| model.generate(&entry, combo.threads, combo.repeat, &mut rng));
            let record = match generated {
                Ok(record) => record,
                Err(e) => return fail(&tx, "record generation failed", e).await,
            };
            emit(&tx, ProgressEvent::Line(format_record(&record))).await;
            corpus.push(record);
        }
        emit(&tx, ProgressEvent::Line(String::new())).await;

        let persisted = suite
            .to_document_config()
            .and_then(|config| store.persist(&ResultDocument::new(config, corpus.clone())));
        match persisted {
            Ok(path) => {
                emit(
                    &tx,
                    ProgressEvent::Line(format!(
                        "▶ Generation complete. Results written to {}",
                        path.display()
                    )),
                )
                .await;
                emit(&tx, ProgressEvent::Done).await;
                tracing::info!(runs = corpus.len(), "generation finished");
                Ok(corpus)
            }
            Err(e) => fail(&tx, "failed to persist results", e).await,
        }
    }

    /// Run on the tokio runtime, handing back the consumer end.
    pub fn spawn(self) -> (mpsc::Receiver<ProgressEvent>, JoinHandle<BenchResult<Corpus>>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }
}

async fn emit(tx: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
    if tx.send(event).await.is_err() {
        tracing::trace!("progress consumer gone; event dropped");
    }
}

/// Close the stream with an error event and hand the error back to the caller.
async fn fail<T>(tx: &mpsc::Sender<ProgressEvent>, context: &str, e: BenchError) -> BenchResult<T> {
    tracing::error!(error = %e, "{context}");
    emit(tx, ProgressEvent::Error(format!("{context}: {e}"))).await;
    Err(e)
}
