use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use transmute_core::{ConversionParams, FileId};
use uuid::Uuid;

use super::error::ApiError;
use super::handlers::orchestrator_for;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BatchStartedResponse {
    pub batch_id: Uuid,
    /// Files claimed by this batch, in processing order.
    pub pending: Vec<FileId>,
}

/// Claim every pending file and convert them in the background.
///
/// Progress is reported over the WebSocket stream and by polling the file list.
pub async fn start_batch(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(params): Json<ConversionParams>,
) -> Result<(StatusCode, Json<BatchStartedResponse>), ApiError> {
    let orchestrator = orchestrator_for(&state, &kind)?;

    let batch = orchestrator.claim_batch().await;
    let response = BatchStartedResponse {
        batch_id: batch.batch_id,
        pending: batch.file_ids.clone(),
    };

    if batch.is_empty() {
        info!(kind = %orchestrator.kind(), "Batch requested with no pending files");
    } else {
        info!(
            kind = %orchestrator.kind(),
            batch_id = %batch.batch_id,
            files = batch.file_ids.len(),
            "Starting batch"
        );
        tokio::spawn(async move {
            orchestrator.run_claimed(batch, params).await;
        });
    }

    Ok((StatusCode::ACCEPTED, Json(response)))
}
