//! HTTP Server for the Datalens API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                               |
//! |--------|-------------------|-------------------------------------------|
//! | GET    | `/health`         | Health check                              |
//! | POST   | `/api/analyze`    | Analyze a `{headers, sampleData}` payload |
//! | POST   | `/api/upload`     | Upload a CSV file for analysis            |
//! | POST   | `/api/check`      | Compliance check of an output object      |
//! | POST   | `/api/format`     | Strict or robust output formatting        |
//! | GET    | `/api/logs`       | SSE stream for real-time logs             |
//!
//! Analyses run on the blocking thread pool.

use axum::{
    extract::{rejection::JsonRejection, Multipart, Query, State},
    http::{header, Method},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_info, log_stage, LogLevel, LOG_BROADCASTER};
use super::types::{AnalyzeResponse, FormatResponse};
use crate::analysis::{analyze_csv_bytes, analyze_detailed};
use crate::config::AnalysisOptions;
use crate::error::{ServerError, ServerResult};
use crate::parser::DEFAULT_SAMPLE_ROWS;
use crate::validation::{check_compliance, format_output, ComplianceReport, FormatMode};

/// Shared across handlers; options are read from the environment once.
#[derive(Clone)]
pub struct AppState {
    options: Arc<AnalysisOptions>,
}

impl AppState {
    pub fn new(options: AnalysisOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }
}

/// Router with options taken from the environment.
pub fn router() -> Router {
    router_with(AppState::new(AnalysisOptions::from_env()))
}

pub fn router_with(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/analyze", post(analyze_json))
        .route("/api/upload", post(upload_csv))
        .route("/api/check", post(check_output))
        .route("/api/format", post(reformat))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> ServerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let state = AppState::new(AnalysisOptions::from_env());
    log_info(format!("Datalens server running on http://localhost:{}", port));
    log_info("POST /api/analyze, /api/upload, /api/check, /api/format; GET /api/logs, /health");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router_with(state)).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "datalens",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "analyze": "POST /api/analyze",
            "upload": "POST /api/upload",
            "check": "POST /api/check",
            "format": "POST /api/format?mode=strict|robust",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Run a CPU-bound job off the async workers.
async fn run_blocking<T, F>(job: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
}

fn rejected_body(rejection: JsonRejection) -> ServerError {
    ServerError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
}

/// Analyze a JSON input payload
async fn analyze_json(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ServerResult<Json<AnalyzeResponse>> {
    let Json(raw) = payload.map_err(rejected_body)?;
    let options = Arc::clone(&state.options);
    let response = run_blocking(move || {
        let rows = raw
            .get("sampleData")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let analysis = analyze_detailed(&raw, &options)?;
        Ok(AnalyzeResponse::new(analysis, rows, None))
    })
    .await?;

    Ok(Json(response))
}

/// Upload CSV endpoint
async fn upload_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<Json<AnalyzeResponse>> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?
                    .to_vec(),
            );
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    log_stage(
        LogLevel::Info,
        "upload",
        format!(
            "New upload: {} ({} bytes)",
            file_name.as_deref().unwrap_or("unknown"),
            bytes.len()
        ),
    );

    let options = Arc::clone(&state.options);
    let response = run_blocking(move || {
        let result = analyze_csv_bytes(&bytes, &options, DEFAULT_SAMPLE_ROWS)?;
        Ok(AnalyzeResponse::from(result))
    })
    .await?;

    Ok(Json(response))
}

/// Compliance check of an output object
async fn check_output(
    payload: Result<Json<Value>, JsonRejection>,
) -> ServerResult<Json<ComplianceReport>> {
    let Json(output) = payload.map_err(rejected_body)?;
    Ok(Json(check_compliance(&output)))
}

#[derive(Debug, Deserialize)]
struct FormatQuery {
    #[serde(default)]
    mode: FormatMode,
}

/// Strict or robust formatting of an output object
async fn reformat(
    Query(query): Query<FormatQuery>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ServerResult<Json<FormatResponse>> {
    let Json(output) = payload.map_err(rejected_body)?;
    let formatted = format_output(&output, query.mode)?;
    let status = if formatted.warnings.is_empty() { "ready" } else { "warning" };

    Ok(Json(FormatResponse {
        job_id: Uuid::new_v4().to_string(),
        status: status.to_string(),
        output: formatted.output,
        warnings: formatted.warnings,
    }))
}
