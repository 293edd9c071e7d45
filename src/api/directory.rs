/// Directory tree endpoints
use crate::{
    context::AppContext,
    directory::{models::slugify, MediaDirectory},
    error::{MediaError, MediaResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Build directory routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/directories", get(list).post(create))
        .route("/directories/:id", patch(update).delete(remove))
}

async fn directory_json(ctx: &AppContext, directory: &MediaDirectory) -> MediaResult<Value> {
    Ok(json!({
        "id": directory.id,
        "name": directory.display_name(),
        "slug": directory.slug,
        "parentId": directory.parent_id,
        "fullPath": ctx.directories.full_path(directory).await?,
    }))
}

/// List every directory, with the implicit root as a final entry
async fn list(State(ctx): State<AppContext>) -> MediaResult<Json<Value>> {
    let mut items = Vec::new();
    for directory in ctx.directories.all().await? {
        items.push(directory_json(&ctx, &directory).await?);
    }

    items.push(json!({
        "id": null,
        "name": "",
        "slug": "/",
        "parentId": null,
        "fullPath": "/",
    }));

    Ok(Json(json!({ "items": items })))
}

#[derive(Deserialize)]
struct CreateRequest {
    name: Option<String>,
    slug: Option<String>,
    parent_id: Option<i64>,
}

async fn create(
    State(ctx): State<AppContext>,
    Json(request): Json<CreateRequest>,
) -> MediaResult<impl IntoResponse> {
    let slug = match (&request.slug, &request.name) {
        (Some(slug), _) => slug.clone(),
        (None, Some(name)) => slugify(name),
        (None, None) => {
            return Err(MediaError::Validation(
                "A name or slug is required".to_string(),
            ))
        }
    };

    let directory = ctx
        .directories
        .create(request.name.as_deref(), &slug, request.parent_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(directory_json(&ctx, &directory).await?),
    ))
}

#[derive(Deserialize)]
struct UpdateRequest {
    name: Option<String>,
    slug: Option<String>,
    /// Missing = leave in place, null = move to root, id = move beneath it
    #[serde(default, with = "double_option")]
    parent_id: Option<Option<i64>>,
}

/// Rename and/or move a directory. Moves run the cycle check.
async fn update(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateRequest>,
) -> MediaResult<Json<Value>> {
    if request.name.is_some() || request.slug.is_some() {
        ctx.directories
            .rename(id, request.name.as_deref(), request.slug.as_deref())
            .await?;
    }

    if let Some(new_parent) = request.parent_id {
        ctx.directories.set_parent(id, new_parent).await?;
    }

    let directory = ctx.directories.get(id).await?;
    Ok(Json(directory_json(&ctx, &directory).await?))
}

async fn remove(State(ctx): State<AppContext>, Path(id): Path<i64>) -> MediaResult<Json<Value>> {
    ctx.directories.delete(id).await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Distinguishes a missing JSON field from an explicit null
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<i64>::deserialize(deserializer).map(Some)
    }
}
