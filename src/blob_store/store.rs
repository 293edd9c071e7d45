/// Content-addressed store manager
///
/// Wraps a storage backend with the hashing and deduplication rules: a blob's
/// filename is always the lowercase hex SHA-256 of its contents plus the
/// original extension, so identical uploads collapse to one stored file.
use crate::{
    blob_store::{disk::DiskBackend, BlobStorageConfig, StorageBackend},
    error::{MediaError, MediaResult},
};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;

/// Compute the content-addressed filename for a byte buffer
pub fn content_filename(data: &[u8], extension: &str) -> String {
    let hash = Sha256::digest(data);
    format!("{}.{}", hex::encode(hash), extension)
}

/// Main content-addressed store
#[derive(Clone)]
pub struct MediaStore {
    backend: Arc<dyn StorageBackend>,
    tmp_dir: PathBuf,
}

impl MediaStore {
    /// Create a store backed by the local disk
    pub fn new(config: BlobStorageConfig) -> Self {
        Self {
            backend: Arc::new(DiskBackend::new(config.root)),
            tmp_dir: config.tmp_dir,
        }
    }

    /// Create a store over an arbitrary backend
    pub fn with_backend(backend: Arc<dyn StorageBackend>, tmp_dir: PathBuf) -> Self {
        Self { backend, tmp_dir }
    }

    /// Hash the contents and store them under the content-addressed name.
    ///
    /// Idempotent: if a blob with the same name already exists the write is
    /// skipped, since identical names imply identical contents. Returns the
    /// stored filename.
    pub async fn store(&self, data: &[u8], extension: &str) -> MediaResult<String> {
        let filename = content_filename(data, extension);

        if !self.backend.exists(&filename).await? {
            self.backend.write(&filename, data).await?;
            tracing::debug!("Stored blob {}", filename);
        }

        Ok(filename)
    }

    /// Read a stored blob
    pub async fn read(&self, filename: &str) -> MediaResult<Option<Vec<u8>>> {
        self.backend.read(filename).await
    }

    /// Read a stored blob, erroring when the metadata says it should exist
    pub async fn read_required(&self, filename: &str) -> MediaResult<Vec<u8>> {
        self.read(filename)
            .await?
            .ok_or_else(|| MediaError::MissingOriginalFile(filename.to_string()))
    }

    /// Check whether a blob is present
    pub async fn exists(&self, filename: &str) -> MediaResult<bool> {
        self.backend.exists(filename).await
    }

    /// Delete the underlying blob.
    ///
    /// The caller must guarantee no remaining references; see the
    /// garbage-collection sweep and the repository's reference counting.
    pub async fn delete(&self, filename: &str) -> MediaResult<()> {
        self.backend.delete(filename).await
    }

    /// List every stored filename (used by the garbage-collection sweep)
    pub async fn list(&self) -> MediaResult<Vec<String>> {
        self.backend.list().await
    }

    /// Filesystem path for a stored filename
    pub fn resolve(&self, filename: &str) -> PathBuf {
        self.backend.path_for(filename)
    }

    /// Scratch directory for in-flight files
    pub fn tmp_dir(&self) -> &PathBuf {
        &self.tmp_dir
    }
}
