/// Health and metrics endpoints
use crate::{context::AppContext, metrics};
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

/// Build health routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
}

/// Health check handler
async fn health(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": ctx.config.service.version,
    }))
}

/// Prometheus text-format metrics
async fn render_metrics() -> impl IntoResponse {
    metrics::render()
}
