/// Background task implementations
use crate::{context::AppContext, error::MediaResult, metrics};
use serde::Serialize;

/// Counts reported by a garbage-collection sweep
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GcSummary {
    /// Files referenced by at least one record
    pub live: usize,
    /// Unreferenced files deleted from the store
    pub swept: usize,
}

/// Delete stored blobs no longer referenced by any record.
///
/// The live set is every filename mentioned by any asset row — including
/// soft-deleted assets and historical versions — as its original or one of
/// its variants. Only files outside that set are removed; a tombstoned
/// asset keeps its bytes until it is purged.
pub async fn collect_garbage(ctx: &AppContext) -> MediaResult<GcSummary> {
    let referenced = ctx.media.referenced_filenames().await?;
    let stored = ctx.store.list().await?;

    let mut summary = GcSummary {
        live: referenced.len(),
        swept: 0,
    };

    for filename in stored {
        if referenced.contains(&filename) {
            continue;
        }
        match ctx.store.delete(&filename).await {
            Ok(()) => {
                tracing::info!("Swept orphaned blob {}", filename);
                summary.swept += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to sweep orphaned blob {}: {}", filename, e);
            }
        }
    }

    if summary.swept > 0 {
        metrics::GC_SWEPT_TOTAL.inc_by(summary.swept as u64);
    }

    Ok(summary)
}

/// Health check - verify the metadata database and blob store are reachable
pub async fn health_check(ctx: &AppContext) -> MediaResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    ctx.store.list().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AppContext;
    use crate::upload::UploadOptions;
    use tempfile::tempdir;

    async fn test_context() -> (AppContext, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ctx = AppContext::for_tests(dir.path()).await;
        (ctx, dir)
    }

    #[tokio::test]
    async fn sweep_removes_only_unreferenced_files() {
        let (ctx, _dir) = test_context().await;

        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            8,
            8,
            image::Rgba([1, 2, 3, 255]),
        ));
        let bytes = crate::codec::encode(&img, crate::codec::ImageEncoding::Png).unwrap();

        let asset = ctx
            .uploads
            .upload("kept.png", bytes, UploadOptions::default())
            .await
            .unwrap();

        // a file nothing references
        ctx.store.store(b"orphaned bytes", "jpg").await.unwrap();

        let summary = collect_garbage(&ctx).await.unwrap();
        assert_eq!(summary.swept, 1);
        assert!(ctx.store.exists(&asset.filename).await.unwrap());
    }

    #[tokio::test]
    async fn soft_deleted_assets_keep_their_blobs() {
        let (ctx, _dir) = test_context().await;

        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            8,
            8,
            image::Rgba([9, 8, 7, 255]),
        ));
        let bytes = crate::codec::encode(&img, crate::codec::ImageEncoding::Png).unwrap();

        let asset = ctx
            .uploads
            .upload("trashed.png", bytes, UploadOptions::default())
            .await
            .unwrap();
        ctx.media.soft_delete(asset.id).await.unwrap();

        let summary = collect_garbage(&ctx).await.unwrap();
        assert_eq!(summary.swept, 0);
        assert!(ctx.store.exists(&asset.filename).await.unwrap());
    }
}
