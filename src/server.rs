//! HTTP transport: a thin axum layer over the orchestrators.
//!
//! The transport owns the uploaded file's on-disk representation: the
//! multipart body is spooled into a [`tempfile::NamedTempFile`] whose guard
//! lives on the handler's stack, so the temp file is unlinked on every exit
//! path, success or error, independent of the pipeline's control flow.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::gateway::ArchiveGateway;
use crate::ingest::{IngestError, ingest_file};
use crate::retrieve::{DEFAULT_LIMIT, retrieve};
use crate::split::SplitConfig;
use crate::types::ArchiveError;

/// Per-process state handed to every handler.
pub struct AppState {
    pub gateway: ArchiveGateway,
    pub split: SplitConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/ingest", post(ingest_document))
        .route("/search", post(search_knowledge_base))
        .with_state(state)
}

/// Binds and serves until the process is stopped.
pub async fn serve(state: Arc<AppState>, port: u16) -> Result<(), ArchiveError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("serving archivist on http://{addr}");
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "archivist knowledge base",
        "archive_ready": state.gateway.is_ready(),
    }))
}

async fn ingest_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let upload = read_upload(&mut multipart).await?;
    let written = ingest_file(
        &state.gateway,
        &state.split,
        upload.file.path(),
        &upload.filename,
    )
    .await?;
    info!(file = %upload.filename, chunks = written, "ingested document");
    Ok(Json(json!({
        "filename": upload.filename,
        "status": "success",
        "chunks_added": written,
    })))
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT as i64
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<String>,
}

async fn search_knowledge_base(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let results = retrieve(&state.gateway, &request.query, request.limit).await?;
    Ok(Json(SearchResponse { results }))
}

struct Upload {
    file: tempfile::NamedTempFile,
    filename: String,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.txt").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
        let mut file = tempfile::NamedTempFile::new().map_err(ApiError::internal)?;
        file.write_all(&bytes).map_err(ApiError::internal)?;
        file.flush().map_err(ApiError::internal)?;
        return Ok(Upload { file, filename });
    }
    Err(ApiError::new(
        StatusCode::BAD_REQUEST,
        "multipart field 'file' is required".to_string(),
    ))
}

/// Transport error response: a JSON `{detail}` body with a mapped status.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: String) -> Self {
        Self { status, detail }
    }

    fn internal(err: impl ToString) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, detail = %self.detail, "request failed");
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

fn status_for(err: &ArchiveError) -> StatusCode {
    match err {
        ArchiveError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ArchiveError::Extraction { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ArchiveError> for ApiError {
    fn from(err: ArchiveError) -> Self {
        Self::new(status_for(&err), err.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        Self::new(status_for(&err.source), err.to_string())
    }
}
