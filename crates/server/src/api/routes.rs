use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{batches, files, handlers, middleware::metrics_middleware, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.upload_limit_bytes();

    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/converters", get(handlers::list_converters))
        // File queues
        .route(
            "/converters/{kind}/files",
            post(files::upload_files)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(files::list_files)
                .delete(files::clear_files),
        )
        .route(
            "/converters/{kind}/files/{id}",
            get(files::get_file).delete(files::remove_file),
        )
        .route(
            "/converters/{kind}/files/{id}/artifact",
            get(files::get_artifact),
        )
        // Batches
        .route("/converters/{kind}/batches", post(batches::start_batch))
        // Live updates and observability
        .route("/ws", get(ws::ws_handler))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
