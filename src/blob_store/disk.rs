/// Disk-based blob storage backend
use crate::{
    blob_store::StorageBackend,
    error::{MediaError, MediaResult},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Stores blobs as flat files under a single root directory. The flat layout
/// is part of the external file-naming contract: other tooling locates files
/// as `<root>/<sha256-hex>.<extension>`.
#[derive(Clone)]
pub struct DiskBackend {
    root: PathBuf,
}

impl DiskBackend {
    /// Create a new disk storage backend
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    async fn ensure_root(&self) -> MediaResult<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            MediaError::Storage(format!("Failed to create blob directory: {}", e))
        })
    }
}

#[async_trait]
impl StorageBackend for DiskBackend {
    async fn write(&self, filename: &str, data: &[u8]) -> MediaResult<()> {
        self.ensure_root().await?;
        let path = self.path_for(filename);

        fs::write(&path, data)
            .await
            .map_err(|e| MediaError::Storage(format!("Failed to write blob {}: {}", filename, e)))?;

        Ok(())
    }

    async fn read(&self, filename: &str) -> MediaResult<Option<Vec<u8>>> {
        let path = self.path_for(filename);

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MediaError::Storage(format!(
                "Failed to read blob {}: {}",
                filename, e
            ))),
        }
    }

    async fn delete(&self, filename: &str) -> MediaResult<()> {
        let path = self.path_for(filename);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MediaError::Storage(format!(
                "Failed to delete blob {}: {}",
                filename, e
            ))),
        }
    }

    async fn exists(&self, filename: &str) -> MediaResult<bool> {
        Ok(self.path_for(filename).exists())
    }

    async fn list(&self) -> MediaResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => {
                return Err(MediaError::Storage(format!(
                    "Failed to list blob directory: {}",
                    e
                )))
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MediaError::Storage(format!("Failed to list blob directory: {}", e)))?
        {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }

        Ok(names)
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }
}
