//! HTTP surface: streamed generation, the persisted document and the files
//! under the results directory.

use crate::config::SuiteConfig;
use crate::profiles::ProfileRegistry;
use crate::seeded_rng;
use crate::store::ResultStore;
use crate::stream::{ProgressEvent, StreamingReporter, CHANNEL_CAPACITY};
use crate::BenchResult;
use axum::{
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

pub const NO_RESULTS: &str = "No results found. Run the benchmark first.";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

/// Shared handler state. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    suite: Arc<SuiteConfig>,
    registry: Arc<ProfileRegistry>,
    store: ResultStore,
    /// Held by the generation task for as long as it runs.
    generation: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(suite: SuiteConfig, registry: ProfileRegistry) -> Self {
        let store = ResultStore::new(suite.results_dir());
        Self {
            suite: Arc::new(suite),
            registry: Arc::new(registry),
            store,
            generation: Arc::new(Mutex::new(())),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/run_benchmark", get(run_benchmark_handler))
        .route("/api/results", get(results_handler))
        .route("/results/*path", get(result_file_handler))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> BenchResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, results_dir = %state.store.root().display(), "listening");
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Stream one full generation run as server-sent events. Only one run may
/// be in flight; it keeps going to persistence even if the client leaves.
async fn run_benchmark_handler(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let guard = Arc::clone(&state.generation)
        .try_lock_owned()
        .map_err(|_| api_error(StatusCode::CONFLICT, "A benchmark run is already in progress."))?;

    let suite = (*state.suite).clone();
    let rng = seeded_rng(suite.seed);
    let reporter = StreamingReporter::new(suite, Arc::clone(&state.registry), state.store.clone(), rng);

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let _guard = guard;
        if let Err(e) = reporter.run(tx).await {
            tracing::warn!(error = %e, "streamed generation failed");
        }
    });

    let mut events = ReceiverStream::new(rx);
    let stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            let terminal = event.is_terminal();
            yield Ok::<_, Infallible>(sse_event(&event));
            if terminal {
                break;
            }
        }
    };
    Ok(Sse::new(stream))
}

fn sse_event(event: &ProgressEvent) -> Event {
    match event {
        ProgressEvent::Error(message) => Event::default().event("error").data(message),
        other => Event::default().data(other.data()),
    }
}

async fn results_handler(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    let loaded = tokio::task::spawn_blocking(move || store.load())
        .await
        .unwrap_or_else(|e| Err(std::io::Error::new(std::io::ErrorKind::Other, e).into()));
    match loaded {
        Ok(Some(document)) => Json(document).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, NO_RESULTS).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load results");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn result_file_handler(
    State(state): State<AppState>,
    UrlPath(requested): UrlPath<String>,
) -> Response {
    let Some(path) = resolve_within(state.store.root(), &requested) else {
        return api_error(StatusCode::BAD_REQUEST, "Invalid path").into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            api_error(StatusCode::NOT_FOUND, format!("{requested} not found")).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "failed to read result file");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Join `requested` onto `root`, refusing anything that could leave it:
/// parent, root and prefix components, or a path naming no file at all.
pub fn resolve_within(root: &Path, requested: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0;
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (depth > 0).then_some(resolved)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn state(results_dir: &Path) -> AppState {
        let suite = SuiteConfig {
            maps: vec!["global".into(), "stm".into()],
            workloads: vec!["mixed".into()],
            thread_counts: vec![1, 4],
            repeats: 2,
            seed: Some(11),
            pacing_ms: 0,
            results_dir: results_dir.to_path_buf(),
            ..SuiteConfig::default()
        };
        AppState::new(suite, ProfileRegistry::builtin())
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, content_type, body)
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = TempDir::new().unwrap();
        let (status, _, body) = fetch(create_router(state(tmp.path())), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_results_absent_is_404() {
        let tmp = TempDir::new().unwrap();
        let (status, _, body) = fetch(create_router(state(tmp.path())), "/api/results").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, NO_RESULTS);
    }

    #[tokio::test]
    async fn test_run_benchmark_streams_then_results_available() {
        let tmp = TempDir::new().unwrap();
        let app = create_router(state(tmp.path()));

        let (status, content_type, body) = fetch(app.clone(), "/run_benchmark").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/event-stream"));

        let text = String::from_utf8(body).unwrap();
        let frames: Vec<&str> = text.split_terminator("\n\n").collect();
        // banner, header, 8 records, blank, completion, done
        assert_eq!(frames.len(), 13);
        assert!(frames.iter().all(|f| f.starts_with("data: ")));
        assert!(frames[1].starts_with("data: Map"));
        assert_eq!(frames[10], "data: ");
        assert_eq!(frames[12], "data: [DONE]");

        let (status, _, body) = fetch(app, "/api/results").await;
        assert_eq!(status, StatusCode::OK);
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(doc["runs"].as_array().unwrap().len(), 8);
        assert_eq!(doc["runs"][0]["map"], "global");
        assert!(doc["runs"][0]["opsPerSec"].is_number());
        assert_eq!(doc["config"]["seed"], 11);
    }

    #[tokio::test]
    async fn test_unreadable_results_is_500() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("benchmarks")).unwrap();
        std::fs::write(tmp.path().join("benchmarks/all_maps_quick.json"), "{not json").unwrap();

        let (status, _, body) = fetch(create_router(state(tmp.path())), "/api/results").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(error.error.starts_with("JSON error"));
    }

    #[tokio::test]
    async fn test_invalid_plan_streams_error_event() {
        let tmp = TempDir::new().unwrap();
        let mut state = state(tmp.path());
        state.suite = Arc::new(SuiteConfig {
            workloads: vec!["range-heavy".into()],
            ..(*state.suite).clone()
        });

        let (status, _, body) = fetch(create_router(state), "/run_benchmark").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("event: error\ndata: rejected generation plan: config error"));
        assert!(!text.contains("[DONE]"));
    }

    #[tokio::test]
    async fn test_concurrent_run_rejected() {
        let tmp = TempDir::new().unwrap();
        let state = state(tmp.path());
        let _running = state.generation.try_lock().unwrap();

        let (status, _, body) = fetch(create_router(state.clone()), "/run_benchmark").await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(error.error.contains("already in progress"));
    }

    #[tokio::test]
    async fn test_serves_result_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("graphs")).unwrap();
        std::fs::write(tmp.path().join("graphs/latency_p95_by_map.svg"), "<svg></svg>").unwrap();
        let app = create_router(state(tmp.path()));

        let (status, content_type, body) =
            fetch(app.clone(), "/results/graphs/latency_p95_by_map.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("image/svg+xml"));
        assert_eq!(body, b"<svg></svg>");

        let (status, _, _) = fetch(app, "/results/graphs/missing.svg").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_resolve_within_rejects_escapes() {
        let root = Path::new("/srv/results");
        assert_eq!(
            resolve_within(root, "graphs/a.svg"),
            Some(PathBuf::from("/srv/results/graphs/a.svg"))
        );
        assert_eq!(
            resolve_within(root, "./full_matrix.csv"),
            Some(PathBuf::from("/srv/results/full_matrix.csv"))
        );
        assert_eq!(resolve_within(root, "../etc/passwd"), None);
        assert_eq!(resolve_within(root, "graphs/../../x"), None);
        assert_eq!(resolve_within(root, "/etc/passwd"), None);
        assert_eq!(resolve_within(root, ""), None);
        assert_eq!(resolve_within(root, "."), None);
    }
}
