/// The variant generation engine
use crate::{
    blob_store::MediaStore,
    codec::{self, ImageEncoding},
    error::{MediaError, MediaResult},
    media::{MediaAsset, MediaKind, MediaRepository},
    metrics,
    variants::report::VariantReport,
};
use image::DynamicImage;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// MIME types every browser can render; one of these must exist per width
pub const FALLBACK_MIMES: &[&str] = &["image/jpeg", "image/png"];

/// Format generated when a width tier has no broadly-compatible variant
const PRIMARY_FALLBACK: ImageEncoding = ImageEncoding::Jpeg;

/// One column of the variant matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantFormat {
    /// Re-encode in the asset's own format
    Original,
    /// A specific target encoding
    Format(ImageEncoding),
    /// Ensure at least one broadly-compatible encoding exists at this width
    Fallback,
}

/// The (width x format) matrix a complete asset must carry
#[derive(Debug, Clone)]
pub struct VariantMatrix {
    /// Target widths; None means original size
    pub widths: Vec<Option<u32>>,
    /// Format entries, applied per width in order
    pub formats: Vec<VariantFormat>,
}

impl VariantMatrix {
    /// Matrix with the standard format list over the given widths
    pub fn new(widths: Vec<Option<u32>>) -> Self {
        Self {
            widths,
            formats: vec![
                VariantFormat::Original,
                VariantFormat::Format(ImageEncoding::Webp),
                VariantFormat::Fallback,
            ],
        }
    }
}

impl Default for VariantMatrix {
    fn default() -> Self {
        Self::new(vec![Some(320), Some(640), Some(960), Some(1280), None])
    }
}

/// Counts reported by a batch run
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct VariantRunSummary {
    /// Items that were not images
    pub skipped: usize,
    /// Variants generated across all items
    pub generated: usize,
    /// Items whose original blob was absent from the store
    pub missing: usize,
}

/// Generates missing variants for image assets
pub struct VariantGenerator {
    store: MediaStore,
    repository: MediaRepository,
    matrix: VariantMatrix,
    /// Per-asset locks: two concurrent runs for the same id would race the
    /// has-variant checks and write duplicates
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl VariantGenerator {
    pub fn new(store: MediaStore, repository: MediaRepository, matrix: VariantMatrix) -> Self {
        Self {
            store,
            repository,
            matrix,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn matrix(&self) -> &VariantMatrix {
        &self.matrix
    }

    async fn lock_for(&self, asset_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(asset_id).or_default().clone()
    }

    /// Ensure the full variant matrix exists for one asset.
    ///
    /// Idempotent: widths and formats that already have a variant are left
    /// alone, and the asset is persisted once at the end only when something
    /// was generated. Returns the number of variants generated.
    pub async fn ensure_variants(&self, asset: &mut MediaAsset) -> MediaResult<usize> {
        if asset.kind != MediaKind::Image {
            return Err(MediaError::WrongMediaType(format!(
                "Media item \"{}\" is {}, not an image",
                asset.slug,
                asset.kind.as_str()
            )));
        }

        let lock = self.lock_for(asset.id).await;
        let _guard = lock.lock().await;

        let mut original: Option<Arc<DynamicImage>> = None;
        let mut generated = 0;

        for &width in &self.matrix.widths {
            for &format in &self.matrix.formats {
                let encoding = match format {
                    VariantFormat::Original => {
                        if asset.has_variant(width, None) {
                            continue;
                        }
                        self.encoding_for(asset)?
                    }
                    VariantFormat::Format(encoding) => {
                        if asset.has_variant(width, Some(encoding.mime())) {
                            continue;
                        }
                        encoding
                    }
                    VariantFormat::Fallback => {
                        let has_fallback = FALLBACK_MIMES
                            .iter()
                            .any(|&mime| asset.has_variant(width, Some(mime)));
                        if has_fallback {
                            continue;
                        }
                        PRIMARY_FALLBACK
                    }
                };

                let image = match &original {
                    Some(image) => Arc::clone(image),
                    None => {
                        let image = self.load_original(asset).await?;
                        original = Some(Arc::clone(&image));
                        image
                    }
                };

                self.generate_variant(asset, image, width, encoding).await?;
                generated += 1;
            }
        }

        if generated > 0 {
            self.repository.persist(asset, false).await?;
            metrics::VARIANTS_GENERATED_TOTAL.inc_by(generated as u64);
        }

        Ok(generated)
    }

    /// Complete the matrix for every current image asset.
    ///
    /// Partial-failure semantics: a bad item is reported and skipped, never
    /// aborting the run. Checks the cancel flag between assets so a stopped
    /// run leaves every processed asset fully persisted.
    pub async fn ensure_all_variants(
        &self,
        report: &mut dyn VariantReport,
        cancel: &AtomicBool,
    ) -> MediaResult<VariantRunSummary> {
        let mut summary = VariantRunSummary::default();
        let all = self.repository.all_current().await?;

        report.set_progress_total(all.len());
        for mut asset in all {
            if cancel.load(Ordering::Relaxed) {
                report.line("Cancelled");
                break;
            }
            report.advance_progress();

            let path = self.repository.full_path(&asset).await?;

            if asset.kind != MediaKind::Image {
                report.line(&format!(
                    "Skipping {} - type={}",
                    path,
                    asset.kind.as_str()
                ));
                summary.skipped += 1;
                continue;
            }

            if !self.store.exists(&asset.filename).await? {
                report.line(&format!("Error {} - original does not exist", path));
                summary.missing += 1;
                continue;
            }

            match self.ensure_variants(&mut asset).await {
                Ok(generated) => {
                    report.line(&format!("Generated {} variants for {}", generated, path));
                    summary.generated += generated;
                }
                Err(e) => {
                    report.line(&format!("Error {} - {}", path, e));
                    summary.skipped += 1;
                }
            }
        }

        report.line(&format!(
            "Summary: skipped items: {}, generated variants: {}, missing files: {}",
            summary.skipped, summary.generated, summary.missing
        ));

        Ok(summary)
    }

    fn encoding_for(&self, asset: &MediaAsset) -> MediaResult<ImageEncoding> {
        ImageEncoding::from_extension(asset.extension()).ok_or_else(|| {
            MediaError::WrongMediaType(format!(
                "No image encoding for extension \"{}\"",
                asset.extension()
            ))
        })
    }

    async fn load_original(&self, asset: &MediaAsset) -> MediaResult<Arc<DynamicImage>> {
        let bytes = self.store.read_required(&asset.filename).await?;
        let image = tokio::task::spawn_blocking(move || codec::decode(&bytes))
            .await
            .map_err(|e| MediaError::Internal(format!("Decode task failed: {e}")))??;
        Ok(Arc::new(image))
    }

    /// Resize (never upscaling), re-encode, store, and record one variant.
    ///
    /// The recorded width is the requested matrix width even when the source
    /// was too small to reach it.
    async fn generate_variant(
        &self,
        asset: &mut MediaAsset,
        image: Arc<DynamicImage>,
        width: Option<u32>,
        encoding: ImageEncoding,
    ) -> MediaResult<()> {
        let bytes = tokio::task::spawn_blocking(move || {
            let resized = match width {
                Some(w) => codec::scale_to_width(&image, w),
                None => (*image).clone(),
            };
            codec::encode(&resized, encoding)
        })
        .await
        .map_err(|e| MediaError::Internal(format!("Encode task failed: {e}")))??;

        let filename = self.store.store(&bytes, encoding.extension()).await?;
        asset.add_variant(filename, width, encoding.mime().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::BlobStorageConfig;
    use crate::db;
    use crate::media::repository::NewMediaAsset;
    use crate::variants::report::CollectingReport;
    use tempfile::tempdir;

    struct Fixture {
        generator: VariantGenerator,
        store: MediaStore,
        repository: MediaRepository,
        _dir: tempfile::TempDir,
    }

    async fn fixture(matrix: VariantMatrix) -> Fixture {
        let dir = tempdir().unwrap();
        let store = MediaStore::new(BlobStorageConfig {
            root: dir.path().join("files"),
            tmp_dir: dir.path().join("tmp"),
        });
        let repository = MediaRepository::new(db::create_test_pool().await);
        let generator = VariantGenerator::new(store.clone(), repository.clone(), matrix);
        Fixture {
            generator,
            store,
            repository,
            _dir: dir,
        }
    }

    fn test_matrix() -> VariantMatrix {
        VariantMatrix {
            widths: vec![Some(320), Some(640)],
            formats: vec![
                VariantFormat::Format(ImageEncoding::Webp),
                VariantFormat::Fallback,
            ],
        }
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            w,
            h,
            image::Rgba([10, 200, 30, 255]),
        ));
        codec::encode(&img, ImageEncoding::Png).unwrap()
    }

    async fn upload_image(fx: &Fixture, slug: &str, w: u32, h: u32) -> MediaAsset {
        let filename = fx.store.store(&png_bytes(w, h), "png").await.unwrap();
        fx.repository
            .create(NewMediaAsset {
                name: slug.to_string(),
                slug: slug.to_string(),
                filename,
                kind: MediaKind::Image,
                author: None,
                caption: None,
                description: None,
                directory_id: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn completes_the_matrix() {
        let fx = fixture(test_matrix()).await;
        let mut asset = upload_image(&fx, "photo", 1000, 500).await;

        let generated = fx.generator.ensure_variants(&mut asset).await.unwrap();
        // 2 widths x (webp + jpeg fallback)
        assert_eq!(generated, 4);
        assert_eq!(asset.stored_variants.len(), 4);

        for width in [320u32, 640] {
            assert!(asset.has_variant(Some(width), Some("image/webp")));
            assert!(asset.has_variant(Some(width), Some("image/jpeg")));
        }

        // every generated file actually exists in the store
        for variant in &asset.stored_variants {
            assert!(fx.store.exists(&variant.filename).await.unwrap());
        }
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let fx = fixture(test_matrix()).await;
        let mut asset = upload_image(&fx, "photo", 1000, 500).await;

        let first = fx.generator.ensure_variants(&mut asset).await.unwrap();
        assert!(first > 0);

        let second = fx.generator.ensure_variants(&mut asset).await.unwrap();
        assert_eq!(second, 0);

        // the persisted copy agrees
        let reloaded = fx.repository.get(asset.id).await.unwrap();
        assert_eq!(reloaded.stored_variants.len(), first);
    }

    #[tokio::test]
    async fn png_original_satisfies_fallback() {
        // a PNG original at original size already provides a
        // broadly-compatible entry at width None
        let fx = fixture(VariantMatrix {
            widths: vec![None],
            formats: vec![VariantFormat::Fallback],
        })
        .await;
        let mut asset = upload_image(&fx, "photo", 100, 100).await;

        let generated = fx.generator.ensure_variants(&mut asset).await.unwrap();
        assert_eq!(generated, 0);
    }

    #[tokio::test]
    async fn rejects_non_images() {
        let fx = fixture(test_matrix()).await;
        let filename = fx.store.store(b"%PDF-1.4 not an image", "pdf").await.unwrap();
        let mut asset = fx
            .repository
            .create(NewMediaAsset {
                name: "Paper".to_string(),
                slug: "paper".to_string(),
                filename,
                kind: MediaKind::Document,
                author: None,
                caption: None,
                description: None,
                directory_id: None,
            })
            .await
            .unwrap();

        let err = fx.generator.ensure_variants(&mut asset).await.unwrap_err();
        assert!(matches!(err, MediaError::WrongMediaType(_)));
    }

    #[tokio::test]
    async fn never_upscales_but_records_requested_width() {
        let fx = fixture(VariantMatrix {
            widths: vec![Some(640)],
            formats: vec![VariantFormat::Format(ImageEncoding::Webp)],
        })
        .await;
        // original is only 300 wide
        let mut asset = upload_image(&fx, "small", 300, 200).await;

        fx.generator.ensure_variants(&mut asset).await.unwrap();

        let variant = &asset.stored_variants[0];
        assert_eq!(variant.width, Some(640));

        let bytes = fx.store.read(&variant.filename).await.unwrap().unwrap();
        let decoded = codec::decode(&bytes).unwrap();
        assert_eq!(image::GenericImageView::dimensions(&decoded), (300, 200));
    }

    #[tokio::test]
    async fn batch_reports_and_continues() {
        let fx = fixture(test_matrix()).await;

        // a healthy image, a document, and an image whose blob is gone
        upload_image(&fx, "good", 800, 400).await;

        let doc_filename = fx.store.store(b"a document", "pdf").await.unwrap();
        fx.repository
            .create(NewMediaAsset {
                name: "Doc".to_string(),
                slug: "doc".to_string(),
                filename: doc_filename,
                kind: MediaKind::Document,
                author: None,
                caption: None,
                description: None,
                directory_id: None,
            })
            .await
            .unwrap();

        let orphan = upload_image(&fx, "orphan", 500, 500).await;
        fx.store.delete(&orphan.filename).await.unwrap();

        let mut report = CollectingReport::default();
        let cancel = AtomicBool::new(false);
        let summary = fx
            .generator
            .ensure_all_variants(&mut report, &cancel)
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.generated, 4);
        assert_eq!(report.total, 3);
        assert_eq!(report.advanced, 3);
        assert!(report.lines.iter().any(|l| l.contains("original does not exist")));
    }

    #[tokio::test]
    async fn batch_cancellation_stops_between_assets() {
        let fx = fixture(test_matrix()).await;
        upload_image(&fx, "one", 400, 400).await;
        upload_image(&fx, "two", 400, 400).await;

        let mut report = CollectingReport::default();
        let cancel = AtomicBool::new(true);
        let summary = fx
            .generator
            .ensure_all_variants(&mut report, &cancel)
            .await
            .unwrap();

        assert_eq!(summary.generated, 0);
        assert!(report.lines.iter().any(|l| l == "Cancelled"));
    }
}
