/// Directory tree repository
///
/// Path resolution is read-only and runs concurrently; structural mutation
/// (`set_parent`) takes a single tree-wide async lock so the ancestor-chain
/// cycle check cannot race with a concurrent move.
use crate::{
    directory::models::MediaDirectory,
    error::{MediaError, MediaResult},
    media::{repository::MediaRepository, MediaAsset},
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::Mutex;

const DIRECTORY_COLUMNS: &str = "id, name, slug, parent_id, created_at, updated_at, deleted_at";

/// Outcome of resolving a path: either node kind can sit at the end
#[derive(Debug, Clone)]
pub enum PathTarget {
    Directory(MediaDirectory),
    Asset(MediaAsset),
}

/// SQLite-backed directory repository
#[derive(Clone)]
pub struct DirectoryRepository {
    db: SqlitePool,
    tree_lock: Arc<Mutex<()>>,
}

impl DirectoryRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            tree_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Find a directory by id
    pub async fn find(&self, id: i64) -> MediaResult<Option<MediaDirectory>> {
        let row = sqlx::query(&format!(
            "SELECT {DIRECTORY_COLUMNS} FROM media_directory WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(row_to_directory).transpose()
    }

    /// Find a directory by id, erroring when absent
    pub async fn get(&self, id: i64) -> MediaResult<MediaDirectory> {
        self.find(id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Directory {id}")))
    }

    /// Create a directory under the given parent
    pub async fn create(
        &self,
        name: Option<&str>,
        slug: &str,
        parent_id: Option<i64>,
    ) -> MediaResult<MediaDirectory> {
        if slug.is_empty() || slug.contains('/') {
            return Err(MediaError::Validation(format!("Invalid slug: \"{slug}\"")));
        }
        if let Some(parent) = parent_id {
            self.get(parent).await?;
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO media_directory (name, slug, parent_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(name)
        .bind(slug)
        .bind(parent_id)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, slug))?;

        self.get(result.last_insert_rowid()).await
    }

    /// Rename a directory (display name and/or slug)
    pub async fn rename(
        &self,
        id: i64,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> MediaResult<MediaDirectory> {
        let directory = self.get(id).await?;
        let new_slug = slug.unwrap_or(&directory.slug);
        if new_slug.is_empty() || new_slug.contains('/') {
            return Err(MediaError::Validation(format!("Invalid slug: \"{new_slug}\"")));
        }

        sqlx::query(
            "UPDATE media_directory SET name = ?1, slug = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(name.or(directory.name.as_deref()))
        .bind(new_slug)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, new_slug))?;

        self.get(id).await
    }

    /// Move a directory under a new parent (None = root).
    ///
    /// Rejected with InvalidHierarchy when the directory would become its own
    /// ancestor. The whole operation holds the tree lock, keeping the cycle
    /// check and the update atomic with respect to other moves.
    pub async fn set_parent(&self, id: i64, new_parent: Option<i64>) -> MediaResult<()> {
        let _guard = self.tree_lock.lock().await;

        let directory = self.get(id).await?;

        if let Some(parent_id) = new_parent {
            if parent_id == id {
                return Err(MediaError::InvalidHierarchy(format!(
                    "Directory \"{}\" cannot be its own parent",
                    directory.slug
                )));
            }

            let ancestors = self.ancestor_chain(parent_id).await?;
            if ancestors.contains(&id) {
                return Err(MediaError::InvalidHierarchy(format!(
                    "Directory \"{}\" cannot be moved beneath its own descendant",
                    directory.slug
                )));
            }
        }

        sqlx::query("UPDATE media_directory SET parent_id = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(new_parent)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, &directory.slug))?;

        Ok(())
    }

    /// Delete a directory. Refuses when it still has children: nothing is
    /// cascade-deleted implicitly.
    pub async fn delete(&self, id: i64) -> MediaResult<()> {
        let _guard = self.tree_lock.lock().await;
        let directory = self.get(id).await?;

        let children: i64 = sqlx::query(
            "SELECT count(id) AS n FROM media_directory WHERE parent_id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?
        .try_get("n")?;

        let files: i64 = sqlx::query("SELECT count(id) AS n FROM media WHERE directory_id = ?1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_one(&self.db)
            .await?
            .try_get("n")?;

        if children > 0 || files > 0 {
            return Err(MediaError::Conflict(format!(
                "Directory \"{}\" is not empty",
                directory.slug
            )));
        }

        sqlx::query("UPDATE media_directory SET deleted_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Child directories, ordered by name
    pub async fn children(&self, parent_id: Option<i64>) -> MediaResult<Vec<MediaDirectory>> {
        let rows = match parent_id {
            Some(id) => {
                sqlx::query(&format!(
                    "SELECT {DIRECTORY_COLUMNS} FROM media_directory \
                     WHERE parent_id = ?1 AND deleted_at IS NULL ORDER BY slug"
                ))
                .bind(id)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {DIRECTORY_COLUMNS} FROM media_directory \
                     WHERE parent_id IS NULL AND deleted_at IS NULL ORDER BY slug"
                ))
                .fetch_all(&self.db)
                .await?
            }
        };

        rows.into_iter().map(row_to_directory).collect()
    }

    /// All directories that are not soft-deleted
    pub async fn all(&self) -> MediaResult<Vec<MediaDirectory>> {
        let rows = sqlx::query(&format!(
            "SELECT {DIRECTORY_COLUMNS} FROM media_directory WHERE deleted_at IS NULL ORDER BY slug"
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(row_to_directory).collect()
    }

    /// Full path of a directory: ancestor slugs joined with `/`, no leading
    /// slash for root-level directories
    pub async fn full_path(&self, directory: &MediaDirectory) -> MediaResult<String> {
        let mut segments = vec![directory.slug.clone()];
        let mut parent = directory.parent_id;

        while let Some(id) = parent {
            let ancestor = self.get(id).await?;
            segments.push(ancestor.slug);
            parent = ancestor.parent_id;
        }

        segments.reverse();
        Ok(segments.join("/"))
    }

    /// Resolve a slash-separated path to a directory or an asset.
    ///
    /// Directories win ties against extension-less asset slugs only when
    /// exactly one of the two exists; one directory and one asset with the
    /// same resolvable name is ambiguous.
    pub async fn resolve_path(
        &self,
        path: &str,
        media: &MediaRepository,
    ) -> MediaResult<PathTarget> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(MediaError::NotFound(path.to_string()));
        }

        let directory = self.find_directory_by_path(trimmed).await;
        let asset = media.find_by_path(trimmed).await;

        match (directory, asset) {
            (Ok(dir), Err(MediaError::NotFound(_))) => Ok(PathTarget::Directory(dir)),
            (Err(MediaError::NotFound(_)), Ok(asset)) => Ok(PathTarget::Asset(asset)),
            (Ok(_), Ok(_)) => Err(MediaError::AmbiguousPath(path.to_string())),
            (Err(MediaError::NotFound(_)), Err(MediaError::NotFound(_))) => {
                Err(MediaError::NotFound(path.to_string()))
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    }

    /// Find a directory by its full path
    pub async fn find_directory_by_path(&self, path: &str) -> MediaResult<MediaDirectory> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(MediaError::NotFound(path.to_string()));
        }

        let mut parts: Vec<&str> = trimmed.split('/').collect();
        let Some(last) = parts.pop() else {
            return Err(MediaError::NotFound(path.to_string()));
        };

        let rows = sqlx::query(&format!(
            "SELECT {DIRECTORY_COLUMNS} FROM media_directory \
             WHERE slug = ?1 AND deleted_at IS NULL"
        ))
        .bind(last)
        .fetch_all(&self.db)
        .await?;

        let mut matches = Vec::new();
        for row in rows {
            let directory = row_to_directory(row)?;
            if self.chain_matches(directory.parent_id, &parts).await? {
                matches.push(directory);
            }
        }

        match matches.len() {
            0 => Err(MediaError::NotFound(path.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(MediaError::AmbiguousPath(path.to_string())),
        }
    }

    /// Ids of every ancestor of a directory, nearest first
    async fn ancestor_chain(&self, id: i64) -> MediaResult<Vec<i64>> {
        let mut chain = vec![id];
        let mut current = self.get(id).await?.parent_id;

        while let Some(ancestor_id) = current {
            if chain.contains(&ancestor_id) {
                // pre-existing corruption; stop rather than loop forever
                return Err(MediaError::InvalidHierarchy(format!(
                    "Directory {ancestor_id} is already part of a cycle"
                )));
            }
            chain.push(ancestor_id);
            current = self.get(ancestor_id).await?.parent_id;
        }

        Ok(chain)
    }

    async fn chain_matches(
        &self,
        mut parent: Option<i64>,
        ancestors: &[&str],
    ) -> MediaResult<bool> {
        for expected in ancestors.iter().rev() {
            let Some(id) = parent else { return Ok(false) };
            let directory = match self.find(id).await? {
                Some(d) if d.deleted_at.is_none() => d,
                _ => return Ok(false),
            };
            if directory.slug != *expected {
                return Ok(false);
            }
            parent = directory.parent_id;
        }

        Ok(parent.is_none())
    }
}

fn row_to_directory(row: SqliteRow) -> MediaResult<MediaDirectory> {
    Ok(MediaDirectory {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        parent_id: row.try_get("parent_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn map_unique_violation(e: sqlx::Error, slug: &str) -> MediaError {
    let is_unique = e
        .as_database_error()
        .map(|d| d.is_unique_violation())
        .unwrap_or(false);
    if is_unique {
        MediaError::Conflict(format!("Slug \"{slug}\" is already in use amongst its siblings"))
    } else {
        MediaError::Database(e)
    }
}
