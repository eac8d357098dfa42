use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, runs};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Aggregated pipeline metrics
        .route("/metrics", get(handlers::pipeline_metrics))
        // Runs
        .route("/runs", post(runs::create_run).get(runs::list_runs))
        .route("/runs/{id}", get(runs::get_run))
        .route(
            "/runs/{id}/status",
            get(runs::get_status).delete(runs::cleanup_status),
        )
        .route("/runs/{id}/pause", post(runs::pause_run))
        .route("/runs/{id}/resume", post(runs::resume_run))
        .route("/runs/{id}/artifacts", get(runs::list_artifacts));

    Router::new()
        .nest("/api/v1", api_routes)
        // Prometheus scrape endpoint
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
