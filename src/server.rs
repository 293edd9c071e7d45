/// HTTP server setup and routing
use crate::{context::AppContext, error::MediaResult};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::Json,
    Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    // leave headroom for multipart framing around the upload limit
    let body_limit = ctx.config.service.upload_limit + 64 * 1024;

    Router::new()
        .merge(crate::api::routes())
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> MediaResult<()> {
    let addr = format!(
        "{}:{}",
        ctx.config.service.hostname, ctx.config.service.port
    );
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
