//! File queue handlers: upload, list, remove and artifact download.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::debug;
use transmute_core::{CandidateFile, DropOutcome, FileId, FileView, OrchestratorError};

use super::error::ApiError;
use super::handlers::orchestrator_for;
use crate::state::AppState;

/// Multipart field carrying an uploaded file.
const FILE_FIELD: &str = "file";

/// Response for clearing a queue.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// Accept one or more `file` parts and hand them to the orchestrator.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<DropOutcome>, ApiError> {
    let orchestrator = orchestrator_for(&state, &kind)?;

    let mut candidates = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        let name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("file part has no file name".to_string()))?;
        let payload = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read {}: {}", name, e)))?;

        candidates.push(CandidateFile::new(name, payload));
    }

    if candidates.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "expected at least one '{}' part",
            FILE_FIELD
        )));
    }

    Ok(Json(orchestrator.on_files_dropped(candidates).await))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<FileView>>, ApiError> {
    let orchestrator = orchestrator_for(&state, &kind)?;
    Ok(Json(orchestrator.files().await))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<FileView>, ApiError> {
    let orchestrator = orchestrator_for(&state, &kind)?;
    let id = parse_file_id(&id)?;

    orchestrator
        .file(id)
        .await
        .map(Json)
        .ok_or_else(|| OrchestratorError::NotFound(id).into())
}

pub async fn remove_file(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let orchestrator = orchestrator_for(&state, &kind)?;
    let id = parse_file_id(&id)?;

    orchestrator.remove_file(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove every file with no job in flight.
pub async fn clear_files(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<ClearResponse>, ApiError> {
    let orchestrator = orchestrator_for(&state, &kind)?;
    let removed = orchestrator.clear().await;
    Ok(Json(ClearResponse { removed }))
}

/// Stream a completed file's converted artifact back to the client.
pub async fn get_artifact(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let orchestrator = orchestrator_for(&state, &kind)?;
    let id = parse_file_id(&id)?;

    let artifact = orchestrator.fetch_artifact(id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe_file_name(&artifact.file_name)
    );

    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    ))
}

fn parse_file_id(raw: &str) -> Result<FileId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidFileId(raw.to_string()))
}

/// Keep the name printable ASCII without quotes or backslashes.
fn header_safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
