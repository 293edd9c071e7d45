/// Admin batch operations: variant backfill and garbage collection
use crate::{
    context::AppContext,
    error::MediaResult,
    jobs::tasks,
    variants::TracingReport,
};
use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::AtomicBool;

/// Build admin routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/variants/generate", post(generate_all_variants))
        .route("/admin/gc", post(collect_garbage))
}

/// Complete the variant matrix for every current image asset.
///
/// Bad items are logged and skipped; the response carries the summary
/// counts.
async fn generate_all_variants(State(ctx): State<AppContext>) -> MediaResult<Json<Value>> {
    let mut report = TracingReport::default();
    let cancel = AtomicBool::new(false);

    let summary = ctx
        .variants
        .ensure_all_variants(&mut report, &cancel)
        .await?;

    Ok(Json(json!({
        "skipped": summary.skipped,
        "generated": summary.generated,
        "missing": summary.missing,
    })))
}

/// Sweep stored blobs no record references
async fn collect_garbage(State(ctx): State<AppContext>) -> MediaResult<Json<Value>> {
    let summary = tasks::collect_garbage(&ctx).await?;
    Ok(Json(json!({
        "live": summary.live,
        "swept": summary.swept,
    })))
}
