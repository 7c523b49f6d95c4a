use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use exo_dataset::{AppendOutcome, PipelineError};
use exo_trainer::{TrainingResult, TuneRequest, TuningResult};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::context::ServiceContext;
use crate::predictor::PredictionResult;

const CSV_EXTENSION: &str = ".csv";
const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ServiceContext>,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
    pub cors_allowed_origins: Vec<String>,
    pub cors_any_origin: bool,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(context: Arc<ServiceContext>, config: &ServiceConfig) -> Self {
        Self {
            context,
            start_time: Instant::now(),
            req_count: Arc::new(AtomicUsize::new(0)),
            cors_allowed_origins: config.cors_allowed_origins.clone(),
            cors_any_origin: config.allows_any_origin(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Run a context operation on the blocking pool.
    async fn run_blocking<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&ServiceContext) -> exo_dataset::Result<T> + Send + 'static,
    {
        let context = Arc::clone(&self.context);
        tokio::task::spawn_blocking(move || op(&context))
            .await
            .map_err(|err| ApiError::internal(format!("worker task failed: {err}")))?
            .map_err(ApiError::from)
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HomeResponse {
    message: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    req_total: u64,
    model_loaded: bool,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    status: &'static str,
    n_rows_added: usize,
    n_rows_total: usize,
    n_columns: usize,
}

impl From<AppendOutcome> for UploadResponse {
    fn from(outcome: AppendOutcome) -> Self {
        Self {
            status: "ok",
            n_rows_added: outcome.rows_added,
            n_rows_total: outcome.total_rows,
            n_columns: outcome.total_columns,
        }
    }
}

#[derive(Debug, Serialize)]
struct RetrainResponse {
    status: &'static str,
    result: TrainingResult,
}

#[derive(Debug, Serialize)]
struct TuneResponse {
    status: &'static str,
    #[serde(flatten)]
    result: TuningResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Format(_)
            | PipelineError::Validation(_)
            | PipelineError::ModelUnavailable => Self::bad_request(err.to_string()),
            PipelineError::Storage(_) => {
                warn!("storage failure: {err}");
                Self::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            detail: self.message,
        });
        (self.status, payload).into_response()
    }
}

/// Serve until `shutdown` resolves.
pub async fn start_server<F>(state: AppState, addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(Arc::new(state));
    let listener = bind_listener(addr).await?;
    info!("HTTP server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))
    }
}

pub fn build_router(state: SharedState) -> Router {
    let cors = if state.cors_any_origin {
        CorsLayer::permissive()
    } else {
        cors_layer(&state.cors_allowed_origins)
    };
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(handle_home))
        .route("/health", get(handle_health))
        .route("/upload-file", post(handle_upload_file))
        .route("/upload-row", post(handle_upload_row))
        .route("/download", get(handle_download))
        .route("/retrain", post(handle_retrain))
        .route("/tune", post(handle_tune))
        .route("/predict", get(handle_predict))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn handle_home(State(state): State<SharedState>) -> Json<HomeResponse> {
    state.record_request();
    Json(HomeResponse {
        message: "Exoplanet candidate classifier service is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let req_total = state.record_request();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime_seconds(),
        req_total,
        model_loaded: state.context.model_loaded(),
    })
}

async fn handle_upload_file(
    State(state): State<SharedState>,
    request: Request,
) -> Result<Json<UploadResponse>, ApiError> {
    state.record_request();

    let content_type = content_type(request.headers());
    let bytes = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|err| ApiError::bad_request(format!("invalid multipart body: {err}")))?;
        read_csv_field(multipart).await?
    } else if is_raw_csv_type(&content_type) {
        Bytes::from_request(request, &state)
            .await
            .map_err(|err| ApiError::bad_request(format!("failed to read body: {err}")))?
    } else {
        return Err(ApiError::bad_request(format!(
            "unsupported content type {content_type:?}; upload a CSV file"
        )));
    };

    let outcome = state
        .run_blocking(move |ctx| ctx.upload_csv(&bytes))
        .await?;
    Ok(Json(outcome.into()))
}

async fn handle_upload_row(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    state.record_request();

    let row: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON row: {err}")))?;
    let outcome = state.run_blocking(move |ctx| ctx.upload_row(&row)).await?;
    Ok(Json(outcome.into()))
}

async fn handle_download(State(state): State<SharedState>) -> Result<Response, ApiError> {
    state.record_request();

    let csv = state
        .run_blocking(|ctx| ctx.download())
        .await?
        .ok_or_else(|| ApiError::not_found("dataset is empty"))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (header::CONTENT_DISPOSITION, "attachment; filename=main.csv"),
        ],
        csv,
    )
        .into_response())
}

async fn handle_retrain(
    State(state): State<SharedState>,
) -> Result<Json<RetrainResponse>, ApiError> {
    state.record_request();

    let result = state.run_blocking(|ctx| ctx.retrain()).await?;
    Ok(Json(RetrainResponse {
        status: "ok",
        result,
    }))
}

async fn handle_tune(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<TuneResponse>, ApiError> {
    state.record_request();

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        TuneRequest::default()
    } else {
        serde_json::from_slice::<TuneRequest>(&body)
            .map_err(|err| ApiError::bad_request(format!("invalid tune request: {err}")))?
    };

    let result = state.run_blocking(move |ctx| ctx.tune(&request)).await?;
    Ok(Json(TuneResponse {
        status: "ok",
        result,
    }))
}

async fn handle_predict(
    State(state): State<SharedState>,
) -> Result<Json<PredictionResult>, ApiError> {
    state.record_request();

    let result = state.run_blocking(|ctx| ctx.predict()).await?;
    Ok(Json(result))
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// CSV may arrive as a raw body with one of these types (or none).
fn is_raw_csv_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    matches!(
        essence,
        "" | "text/csv" | "text/plain" | "application/csv" | "application/octet-stream"
    )
}

/// Bytes of the `file` field. A filename, when given, must end in `.csv`.
async fn read_csv_field(mut multipart: Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart body: {err}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        if let Some(file_name) = field.file_name() {
            if !file_name.to_ascii_lowercase().ends_with(CSV_EXTENSION) {
                return Err(ApiError::bad_request(format!(
                    "only CSV files are supported, got {file_name:?}"
                )));
            }
        }
        return field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(format!("failed to read upload: {err}")));
    }

    Err(ApiError::bad_request(format!(
        "multipart body has no '{UPLOAD_FIELD}' field"
    )))
}
