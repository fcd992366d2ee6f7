use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use transmute_core::{ConverterKind, RetryPolicy, SanitizedConfig, ValidationRules};

use super::error::ApiError;
use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::{AppState, Orchestrator};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// An enabled converter kind and its effective settings.
#[derive(Debug, Serialize)]
pub struct ConverterInfo {
    pub kind: ConverterKind,
    pub rules: ValidationRules,
    pub policy: RetryPolicy,
    pub pending: usize,
}

pub async fn list_converters(State(state): State<Arc<AppState>>) -> Json<Vec<ConverterInfo>> {
    let config = state.config();
    let mut converters = Vec::new();
    for orchestrator in state.orchestrators() {
        let kind = orchestrator.kind();
        converters.push(ConverterInfo {
            kind,
            rules: orchestrator.rules().clone(),
            policy: config.converters.policy(kind),
            pending: orchestrator.queue().pending_count().await,
        });
    }
    Json(converters)
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

/// Look up the orchestrator for a `{kind}` path segment.
pub(crate) fn orchestrator_for(
    state: &AppState,
    kind: &str,
) -> Result<Arc<Orchestrator>, ApiError> {
    let kind: ConverterKind = kind
        .parse()
        .map_err(|_| ApiError::UnknownKind(kind.to_string()))?;

    state
        .orchestrator(kind)
        .cloned()
        .ok_or(ApiError::KindDisabled(kind))
}
