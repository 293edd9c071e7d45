/// Upload and edit pipeline
///
/// Everything between "bytes arrived" and "asset exists": validation,
/// name/slug derivation, content-addressed storage, version-on-edit.
use crate::{
    blob_store::MediaStore,
    codec::{self, ImageEncoding},
    error::{MediaError, MediaResult},
    macros::MacroProcessor,
    media::{repository::NewMediaAsset, MediaAsset, MediaKind, MediaRepository},
    metrics,
};
use serde_json::Value;

/// Optional overrides accepted alongside an upload
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub directory_id: Option<i64>,
    /// Attach the upload as the new head of an existing version chain
    pub head_version: Option<i64>,
}

/// Outcome of applying an edit macro
#[derive(Debug)]
pub struct EditOutcome {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    /// Present when the edit was saved as a new version
    pub asset: Option<MediaAsset>,
}

/// Orchestrates uploads and saved edits
#[derive(Clone)]
pub struct UploadService {
    store: MediaStore,
    repository: MediaRepository,
    upload_limit: usize,
}

impl UploadService {
    pub fn new(store: MediaStore, repository: MediaRepository, upload_limit: usize) -> Self {
        Self {
            store,
            repository,
            upload_limit,
        }
    }

    /// Accept one uploaded file.
    ///
    /// The extension decides the media kind and must be on the allow-list.
    /// Name defaults to a title-cased filename stem, slug to the slugified
    /// name. With `head_version` set, the upload replaces the file of an
    /// existing asset, preserving the previous state as a historical version.
    pub async fn upload(
        &self,
        original_filename: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> MediaResult<MediaAsset> {
        if bytes.is_empty() {
            return Err(MediaError::Validation("Upload is empty".to_string()));
        }
        if bytes.len() > self.upload_limit {
            return Err(MediaError::Validation(format!(
                "Upload of {} bytes exceeds the limit of {} bytes",
                bytes.len(),
                self.upload_limit
            )));
        }

        let extension = original_filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        // jpeg collapses to jpg so identical bytes share one stored name
        let extension = if extension == "jpeg" { "jpg".to_string() } else { extension };

        let kind = MediaKind::from_extension(&extension).ok_or_else(|| {
            MediaError::Validation(format!(
                "Files of type \"{}\" are not accepted",
                extension
            ))
        })?;

        let name = options
            .name
            .unwrap_or_else(|| derive_name(original_filename));
        let slug = options
            .slug
            .unwrap_or_else(|| crate::directory::models::slugify(&name));
        if slug.is_empty() {
            return Err(MediaError::Validation("Slug cannot be empty".to_string()));
        }

        let size = bytes.len();
        let filename = self.store.store(&bytes, &extension).await?;

        let asset = match options.head_version {
            Some(head_id) => self.replace_head(head_id, filename, kind).await?,
            None => {
                self.repository
                    .create(NewMediaAsset {
                        name,
                        slug,
                        filename,
                        kind,
                        author: None,
                        caption: None,
                        description: None,
                        directory_id: options.directory_id,
                    })
                    .await?
            }
        };

        metrics::UPLOADS_TOTAL.with_label_values(&[kind.as_str()]).inc();
        metrics::UPLOAD_BYTES_TOTAL.inc_by(size as u64);
        tracing::info!("Accepted upload {} as \"{}\"", asset.filename, asset.slug);

        Ok(asset)
    }

    /// Swap a new file into an existing head record, keeping the old state
    /// as a historical version
    async fn replace_head(
        &self,
        head_id: i64,
        filename: String,
        kind: MediaKind,
    ) -> MediaResult<MediaAsset> {
        let mut head = self.repository.get(head_id).await?;
        if !head.is_head() {
            return Err(MediaError::Validation(format!(
                "Media item {head_id} is a historical version, not a head"
            )));
        }

        head.filename = filename;
        head.kind = kind;
        head.clear_variants();
        self.repository.persist(&mut head, true).await?;
        Ok(head)
    }

    /// Apply an edit macro to an image asset.
    ///
    /// The pipeline is validated before any decoding happens. Without `save`
    /// the edited bytes are only returned; with `save` they are stored and
    /// the asset becomes a new version pointing at the fresh file, with its
    /// variants cleared for regeneration.
    pub async fn apply_macro(
        &self,
        asset_id: i64,
        macro_entries: &[(String, Value)],
        save: bool,
    ) -> MediaResult<EditOutcome> {
        let mut asset = self.repository.get(asset_id).await?;
        if asset.kind != MediaKind::Image {
            return Err(MediaError::WrongMediaType(format!(
                "Media item \"{}\" is {}, not an image",
                asset.slug,
                asset.kind.as_str()
            )));
        }

        let processor = MacroProcessor::parse(macro_entries)?;
        let encoding = ImageEncoding::from_extension(asset.extension()).ok_or_else(|| {
            MediaError::WrongMediaType(format!(
                "No image encoding for extension \"{}\"",
                asset.extension()
            ))
        })?;

        let original = self.store.read_required(&asset.filename).await?;
        let bytes = tokio::task::spawn_blocking(move || -> MediaResult<Vec<u8>> {
            let image = codec::decode(&original)?;
            codec::encode(&processor.process(image), encoding)
        })
        .await
        .map_err(|e| MediaError::Internal(format!("Edit task failed: {e}")))??;

        metrics::MACROS_APPLIED_TOTAL.inc();

        if !save {
            return Ok(EditOutcome {
                bytes,
                mime: encoding.mime(),
                asset: None,
            });
        }

        let filename = self.store.store(&bytes, encoding.extension()).await?;
        asset.filename = filename;
        asset.clear_variants();
        self.repository.persist(&mut asset, true).await?;

        Ok(EditOutcome {
            bytes,
            mime: encoding.mime(),
            asset: Some(asset),
        })
    }

    /// Hard-delete an asset, removing its blobs when nothing else references
    /// them
    pub async fn purge(&self, asset_id: i64) -> MediaResult<()> {
        let asset = self.repository.remove(asset_id).await?;

        let mut filenames: Vec<String> = vec![asset.filename.clone()];
        filenames.extend(asset.stored_variants.iter().map(|v| v.filename.clone()));

        for filename in filenames {
            if !self.repository.is_filename_referenced(&filename).await? {
                self.store.delete(&filename).await?;
                tracing::info!("Deleted unreferenced blob {}", filename);
            }
        }

        Ok(())
    }
}

/// `holiday_photo.jpg` -> `Holiday Photo`
fn derive_name(original_filename: &str) -> String {
    let stem = original_filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(original_filename);

    stem.split(['-', '_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::BlobStorageConfig;
    use crate::db;
    use serde_json::json;
    use tempfile::tempdir;

    struct Fixture {
        service: UploadService,
        store: MediaStore,
        repository: MediaRepository,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let store = MediaStore::new(BlobStorageConfig {
            root: dir.path().join("files"),
            tmp_dir: dir.path().join("tmp"),
        });
        let repository = MediaRepository::new(db::create_test_pool().await);
        let service = UploadService::new(store.clone(), repository.clone(), 1024 * 1024);
        Fixture {
            service,
            store,
            repository,
            _dir: dir,
        }
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            w,
            h,
            image::Rgba([50, 60, 70, 255]),
        ));
        codec::encode(&img, ImageEncoding::Png).unwrap()
    }

    #[tokio::test]
    async fn upload_derives_name_and_slug() {
        let fx = fixture().await;

        let asset = fx
            .service
            .upload("holiday_photo.png", png_bytes(10, 10), UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(asset.name, "Holiday Photo");
        assert_eq!(asset.slug, "holiday-photo");
        assert_eq!(asset.kind, MediaKind::Image);
        assert!(fx.store.exists(&asset.filename).await.unwrap());
    }

    #[tokio::test]
    async fn upload_rejects_unknown_extensions() {
        let fx = fixture().await;

        let err = fx
            .service
            .upload("script.exe", vec![1, 2, 3], UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Validation(_)));
    }

    #[tokio::test]
    async fn upload_rejects_oversized_files() {
        let fx = fixture().await;
        let service = UploadService::new(fx.store.clone(), fx.repository.clone(), 16);

        let err = service
            .upload("big.png", vec![0; 64], UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Validation(_)));
    }

    #[tokio::test]
    async fn upload_as_new_head_keeps_history() {
        let fx = fixture().await;

        let first = fx
            .service
            .upload("photo.png", png_bytes(10, 10), UploadOptions::default())
            .await
            .unwrap();

        let replaced = fx
            .service
            .upload(
                "photo.png",
                png_bytes(20, 20),
                UploadOptions {
                    head_version: Some(first.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(replaced.id, first.id);
        assert_ne!(replaced.filename, first.filename);

        let versions = fx.repository.versions_of(first.id).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].filename, first.filename);
    }

    #[tokio::test]
    async fn macro_edit_without_save_leaves_asset_untouched() {
        let fx = fixture().await;

        let asset = fx
            .service
            .upload("photo.png", png_bytes(100, 100), UploadOptions::default())
            .await
            .unwrap();

        let outcome = fx
            .service
            .apply_macro(
                asset.id,
                &[("crop".to_string(), json!({"width": 50, "height": 40}))],
                false,
            )
            .await
            .unwrap();

        assert!(outcome.asset.is_none());
        let edited = codec::decode(&outcome.bytes).unwrap();
        assert_eq!(image::GenericImageView::dimensions(&edited), (50, 40));

        let reloaded = fx.repository.get(asset.id).await.unwrap();
        assert_eq!(reloaded.filename, asset.filename);
    }

    #[tokio::test]
    async fn macro_edit_with_save_creates_a_version() {
        let fx = fixture().await;

        let asset = fx
            .service
            .upload("photo.png", png_bytes(100, 100), UploadOptions::default())
            .await
            .unwrap();

        let outcome = fx
            .service
            .apply_macro(
                asset.id,
                &[("flip".to_string(), json!("horizontal"))],
                true,
            )
            .await
            .unwrap();

        let saved = outcome.asset.unwrap();
        assert_ne!(saved.filename, asset.filename);
        assert!(fx.store.exists(&saved.filename).await.unwrap());

        let versions = fx.repository.versions_of(asset.id).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].filename, asset.filename);
    }

    #[tokio::test]
    async fn invalid_macro_fails_before_any_work() {
        let fx = fixture().await;

        let asset = fx
            .service
            .upload("photo.png", png_bytes(10, 10), UploadOptions::default())
            .await
            .unwrap();

        let err = fx
            .service
            .apply_macro(asset.id, &[("frobnicate".to_string(), json!({}))], true)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedFilter(_)));

        // nothing changed
        let reloaded = fx.repository.get(asset.id).await.unwrap();
        assert_eq!(reloaded.filename, asset.filename);
        assert!(fx.repository.versions_of(asset.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_removes_unreferenced_blobs() {
        let fx = fixture().await;

        let asset = fx
            .service
            .upload("photo.png", png_bytes(10, 10), UploadOptions::default())
            .await
            .unwrap();

        fx.service.purge(asset.id).await.unwrap();
        assert!(!fx.store.exists(&asset.filename).await.unwrap());
        assert!(fx.repository.find(asset.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_keeps_blobs_with_other_references() {
        let fx = fixture().await;

        let bytes = png_bytes(10, 10);
        let first = fx
            .service
            .upload("one.png", bytes.clone(), UploadOptions::default())
            .await
            .unwrap();
        let second = fx
            .service
            .upload(
                "two.png",
                bytes,
                UploadOptions {
                    slug: Some("two".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(first.filename, second.filename);

        fx.service.purge(first.id).await.unwrap();
        assert!(fx.store.exists(&second.filename).await.unwrap());
    }
}
