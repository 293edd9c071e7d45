/// Asset endpoints: upload, metadata, raw serving, editing, rendering
use crate::{
    context::AppContext,
    directory::PathTarget,
    error::{MediaError, MediaResult},
    media::{models::mime_for_extension, MediaAsset},
    presenter::PresentStyle,
    upload::UploadOptions,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Build media routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/media", post(upload).get(list))
        .route("/media/resolve", get(resolve))
        .route("/media/:id", get(show).delete(remove))
        .route("/media/:id/raw", get(raw))
        .route("/media/:id/edit", post(edit))
        .route("/media/:id/variants", post(generate_variants))
        .route("/media/:id/render", get(render))
        .route("/files/:filename", get(serve_file))
}

fn asset_json(asset: &MediaAsset) -> Value {
    json!({
        "id": asset.id,
        "name": asset.name,
        "slug": asset.slug,
        "filename": asset.filename,
        "kind": asset.kind,
        "author": asset.author,
        "caption": asset.caption,
        "description": asset.description,
        "variants": asset.variants(),
        "directoryId": asset.directory_id,
        "headVersion": asset.head_version,
        "createdAt": asset.created_at,
        "updatedAt": asset.updated_at,
        "deletedAt": asset.deleted_at,
    })
}

/// Accept one or more uploaded files (multipart form)
///
/// Form fields: `file` (repeatable), `name`, `slug`, `directory_id`,
/// `head_version`
async fn upload(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> MediaResult<impl IntoResponse> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    let mut options = UploadOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MediaError::Validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let original = field
                    .file_name()
                    .ok_or_else(|| {
                        MediaError::Validation("File field is missing a filename".to_string())
                    })?
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| MediaError::Validation(format!("Malformed upload: {e}")))?;
                files.push((original, bytes.to_vec()));
            }
            "name" => options.name = non_empty(field_text(field).await?),
            "slug" => options.slug = non_empty(field_text(field).await?),
            "directory_id" => {
                options.directory_id = parse_id("directory_id", field_text(field).await?)?
            }
            "head_version" => {
                options.head_version = parse_id("head_version", field_text(field).await?)?
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(MediaError::Validation("No files were uploaded".to_string()));
    }

    let mut created = Vec::new();
    for (original, bytes) in files {
        let asset = ctx.uploads.upload(&original, bytes, options.clone()).await?;
        created.push(asset_json(&asset));
    }

    Ok((StatusCode::CREATED, Json(json!({ "items": created }))))
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> MediaResult<String> {
    field
        .text()
        .await
        .map_err(|e| MediaError::Validation(format!("Malformed upload: {e}")))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_id(field: &str, value: String) -> MediaResult<Option<i64>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| MediaError::Validation(format!("Invalid {field}: \"{value}\"")))
}

/// List all current assets
async fn list(State(ctx): State<AppContext>) -> MediaResult<Json<Value>> {
    let items = ctx
        .media
        .all_current()
        .await?
        .iter()
        .map(asset_json)
        .collect::<Vec<_>>();
    Ok(Json(json!({ "items": items })))
}

#[derive(Deserialize)]
struct ResolveQuery {
    path: String,
}

/// Resolve a slash-separated path to a directory or an asset
async fn resolve(
    State(ctx): State<AppContext>,
    Query(query): Query<ResolveQuery>,
) -> MediaResult<Json<Value>> {
    let target = ctx.directories.resolve_path(&query.path, &ctx.media).await?;

    let body = match target {
        PathTarget::Asset(asset) => json!({
            "type": "media",
            "item": asset_json(&asset),
            "fullPath": ctx.media.full_path(&asset).await?,
        }),
        PathTarget::Directory(directory) => json!({
            "type": "directory",
            "item": {
                "id": directory.id,
                "name": directory.display_name(),
                "slug": directory.slug,
                "parentId": directory.parent_id,
            },
            "fullPath": ctx.directories.full_path(&directory).await?,
        }),
    };
    Ok(Json(body))
}

/// Asset metadata, including its full path and historical versions
async fn show(State(ctx): State<AppContext>, Path(id): Path<i64>) -> MediaResult<Json<Value>> {
    let asset = ctx.media.get(id).await?;
    let versions = ctx
        .media
        .versions_of(id)
        .await?
        .iter()
        .map(asset_json)
        .collect::<Vec<_>>();

    let mut body = asset_json(&asset);
    body["fullPath"] = json!(ctx.media.full_path(&asset).await?);
    body["versions"] = json!(versions);
    Ok(Json(body))
}

#[derive(Deserialize)]
struct RemoveQuery {
    #[serde(default)]
    purge: bool,
}

/// Soft-delete an asset; `?purge=true` removes it permanently together with
/// any blobs nothing else references
async fn remove(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    Query(query): Query<RemoveQuery>,
) -> MediaResult<Json<Value>> {
    if query.purge {
        ctx.uploads.purge(id).await?;
    } else {
        ctx.media.soft_delete(id).await?;
    }
    Ok(Json(json!({ "status": "ok" })))
}

/// Serve the asset's original file
async fn raw(State(ctx): State<AppContext>, Path(id): Path<i64>) -> MediaResult<Response> {
    let asset = ctx.media.get(id).await?;
    let bytes = ctx.store.read_required(&asset.filename).await?;
    let mime = asset.mime_type().unwrap_or("application/octet-stream");

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime)],
        bytes,
    )
        .into_response())
}

#[derive(Deserialize)]
struct EditRequest {
    #[serde(rename = "macro")]
    macro_entries: Vec<(String, Value)>,
    #[serde(default)]
    save: bool,
}

/// Apply an edit macro to an image asset and return the edited image.
///
/// With `save: true` the result is stored and the asset becomes a new
/// version; without it the edit is a preview only.
async fn edit(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    Json(request): Json<EditRequest>,
) -> MediaResult<Response> {
    let outcome = ctx
        .uploads
        .apply_macro(id, &request.macro_entries, request.save)
        .await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, outcome.mime)],
        outcome.bytes,
    )
        .into_response())
}

/// Complete the variant matrix for one asset
async fn generate_variants(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
) -> MediaResult<Json<Value>> {
    let mut asset = ctx.media.get(id).await?;
    let generated = ctx.variants.ensure_variants(&mut asset).await?;
    Ok(Json(json!({
        "generated": generated,
        "variants": asset.variants(),
    })))
}

#[derive(Deserialize)]
struct RenderQuery {
    #[serde(default)]
    style: Option<String>,
    #[serde(default)]
    external: bool,
}

/// Render an asset to markup
async fn render(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    Query(query): Query<RenderQuery>,
) -> MediaResult<Json<Value>> {
    let asset = ctx.media.get(id).await?;
    let style = match query.style.as_deref() {
        None | Some("web") => PresentStyle::Web,
        Some("email") => PresentStyle::Email,
        Some(other) => {
            return Err(MediaError::Validation(format!(
                "Unknown render style: \"{other}\""
            )))
        }
    };

    let markup = ctx.presenter.render(&asset, style, query.external)?;
    Ok(Json(json!({ "markup": markup })))
}

/// Serve a stored blob by its content-addressed filename.
///
/// Content-addressed names never change contents, so responses are
/// aggressively cacheable and the ETag is the filename itself.
async fn serve_file(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> MediaResult<Response> {
    if filename.contains('/') || filename.contains("..") {
        return Err(MediaError::Validation("Invalid filename".to_string()));
    }

    let etag = format!("\"{}\"", filename);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH) {
        if if_none_match.to_str().ok() == Some(etag.as_str()) {
            return Ok((
                StatusCode::NOT_MODIFIED,
                [
                    (header::ETAG, etag),
                    (
                        header::CACHE_CONTROL,
                        "public, max-age=31536000, immutable".to_string(),
                    ),
                ],
            )
                .into_response());
        }
    }

    let bytes = ctx
        .store
        .read(&filename)
        .await?
        .ok_or_else(|| MediaError::NotFound(format!("File {filename}")))?;

    let extension = filename.rsplit('.').next().unwrap_or("");
    let mime = mime_for_extension(extension).unwrap_or("application/octet-stream");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::ETAG, etag),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        bytes,
    )
        .into_response())
}
