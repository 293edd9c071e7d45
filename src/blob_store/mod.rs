/// Content-addressed blob storage
///
/// Stores uploaded originals and generated variants under deterministic,
/// deduplicated names derived from the SHA-256 of their contents.

pub mod disk;
pub mod store;

pub use store::{content_filename, MediaStore};

use crate::error::MediaResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// Blob storage backend trait
///
/// Implementations handle the actual storage and retrieval of blob data.
/// Filenames are always content-addressed (`<sha256-hex>.<extension>`), so a
/// write to an existing name may be skipped: the contents are identical.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a blob under its content-addressed filename
    async fn write(&self, filename: &str, data: &[u8]) -> MediaResult<()>;

    /// Retrieve a blob by filename
    async fn read(&self, filename: &str) -> MediaResult<Option<Vec<u8>>>;

    /// Delete a blob by filename
    async fn delete(&self, filename: &str) -> MediaResult<()>;

    /// Check if a blob exists
    async fn exists(&self, filename: &str) -> MediaResult<bool>;

    /// List every stored filename
    async fn list(&self) -> MediaResult<Vec<String>>;

    /// Filesystem path for a stored filename
    fn path_for(&self, filename: &str) -> PathBuf;
}

/// Configuration for blob storage
#[derive(Debug, Clone)]
pub struct BlobStorageConfig {
    /// Root directory for stored blobs
    pub root: PathBuf,
    /// Scratch directory for in-flight files
    pub tmp_dir: PathBuf,
}
