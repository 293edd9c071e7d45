/// Application context and dependency injection
use crate::{
    blob_store::{BlobStorageConfig, MediaStore},
    config::ServerConfig,
    db,
    directory::DirectoryRepository,
    error::MediaResult,
    media::MediaRepository,
    presenter::MediaPresenter,
    upload::UploadService,
    variants::{VariantGenerator, VariantMatrix},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub store: MediaStore,
    pub media: MediaRepository,
    pub directories: DirectoryRepository,
    pub uploads: UploadService,
    pub variants: Arc<VariantGenerator>,
    pub presenter: MediaPresenter,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> MediaResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.media_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let store = MediaStore::new(BlobStorageConfig {
            root: config.storage.blob_directory.clone(),
            tmp_dir: config.storage.tmp_directory.clone(),
        });

        let media = MediaRepository::new(pool.clone());
        let directories = DirectoryRepository::new(pool.clone());
        let uploads = UploadService::new(
            store.clone(),
            media.clone(),
            config.service.upload_limit,
        );
        let variants = Arc::new(VariantGenerator::new(
            store.clone(),
            media.clone(),
            VariantMatrix::new(config.variants.widths.clone()),
        ));
        let presenter = MediaPresenter::new(config.presenter.clone());

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            store,
            media,
            directories,
            uploads,
            variants,
            presenter,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> MediaResult<()> {
        let dirs = [
            &config.storage.data_directory,
            &config.storage.blob_directory,
            &config.storage.tmp_directory,
        ];

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        Ok(())
    }

    /// Base URL the service is reachable at
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }

    /// Context over a temp directory and an in-memory database, for tests
    #[cfg(test)]
    pub async fn for_tests(base: &std::path::Path) -> Self {
        let pool = db::create_test_pool().await;

        let store = MediaStore::new(BlobStorageConfig {
            root: base.join("files"),
            tmp_dir: base.join("tmp"),
        });

        let mut config = ServerConfig::from_env().expect("test config");
        config.storage.data_directory = base.to_path_buf();
        config.storage.blob_directory = base.join("files");
        config.storage.tmp_directory = base.join("tmp");

        let media = MediaRepository::new(pool.clone());
        let directories = DirectoryRepository::new(pool.clone());
        let uploads = UploadService::new(store.clone(), media.clone(), 10 * 1024 * 1024);
        let variants = Arc::new(VariantGenerator::new(
            store.clone(),
            media.clone(),
            VariantMatrix::new(vec![Some(320), Some(640)]),
        ));
        let presenter = MediaPresenter::new(config.presenter.clone());

        Self {
            config: Arc::new(config),
            db: pool,
            store,
            media,
            directories,
            uploads,
            variants,
            presenter,
        }
    }
}
