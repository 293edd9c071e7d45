/// HTTP API surface
///
/// Thin glue over the core services: upload, serving, editing, rendering,
/// directory management, and admin batch operations.

pub mod admin;
pub mod directory;
pub mod health;
pub mod media;

use crate::context::AppContext;
use axum::Router;

/// Build all API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(media::routes())
        .merge(directory::routes())
        .merge(admin::routes())
        .merge(health::routes())
}
