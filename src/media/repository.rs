/// Media asset repository
///
/// All metadata persistence for assets: lookup, path resolution, version
/// chains, soft deletion, and the filename reference counts the blob
/// lifecycle depends on.
use crate::{
    error::{MediaError, MediaResult},
    media::models::{MediaAsset, MediaKind, Variant},
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::HashSet;

const ASSET_COLUMNS: &str = "id, name, slug, filename, kind, author, caption, description, \
                             variants, directory_id, head_version, created_at, updated_at, deleted_at";

/// Fields for a new asset record
#[derive(Debug, Clone)]
pub struct NewMediaAsset {
    pub name: String,
    pub slug: String,
    pub filename: String,
    pub kind: MediaKind,
    pub author: Option<String>,
    pub caption: Option<String>,
    pub description: Option<String>,
    pub directory_id: Option<i64>,
}

/// SQLite-backed asset repository
#[derive(Clone)]
pub struct MediaRepository {
    db: SqlitePool,
}

impl MediaRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Find an asset by id
    pub async fn find(&self, id: i64) -> MediaResult<Option<MediaAsset>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSET_COLUMNS} FROM media WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(row_to_asset).transpose()
    }

    /// Find an asset by id, erroring when absent
    pub async fn get(&self, id: i64) -> MediaResult<MediaAsset> {
        self.find(id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Media item {id}")))
    }

    /// Insert a new head record
    pub async fn create(&self, new: NewMediaAsset) -> MediaResult<MediaAsset> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO media (name, slug, filename, kind, author, caption, description,
                               variants, directory_id, head_version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '[]', ?8, NULL, ?9, ?9)
            "#,
        )
        .bind(&new.name)
        .bind(&new.slug)
        .bind(&new.filename)
        .bind(new.kind.as_i64())
        .bind(&new.author)
        .bind(&new.caption)
        .bind(&new.description)
        .bind(new.directory_id)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, &new.slug))?;

        self.get(result.last_insert_rowid()).await
    }

    /// Persist changes to an asset.
    ///
    /// With `create_new_version` the record currently in the database is
    /// first cloned as a historical version pointing at this head, so the
    /// state before the edit stays retrievable.
    pub async fn persist(&self, asset: &mut MediaAsset, create_new_version: bool) -> MediaResult<()> {
        let now = Utc::now();

        if create_new_version {
            sqlx::query(
                r#"
                INSERT INTO media (name, slug, filename, kind, author, caption, description,
                                   variants, directory_id, head_version, created_at, updated_at, deleted_at)
                SELECT name, slug, filename, kind, author, caption, description,
                       variants, directory_id, ?1, created_at, ?2, deleted_at
                FROM media WHERE id = ?1
                "#,
            )
            .bind(asset.id)
            .bind(now)
            .execute(&self.db)
            .await?;
        }

        let variants = serde_json::to_string(&asset.stored_variants)
            .map_err(|e| MediaError::Internal(format!("Failed to serialize variants: {e}")))?;

        sqlx::query(
            r#"
            UPDATE media
            SET name = ?1, slug = ?2, filename = ?3, kind = ?4, author = ?5, caption = ?6,
                description = ?7, variants = ?8, directory_id = ?9, head_version = ?10,
                updated_at = ?11, deleted_at = ?12
            WHERE id = ?13
            "#,
        )
        .bind(&asset.name)
        .bind(&asset.slug)
        .bind(&asset.filename)
        .bind(asset.kind.as_i64())
        .bind(&asset.author)
        .bind(&asset.caption)
        .bind(&asset.description)
        .bind(&variants)
        .bind(asset.directory_id)
        .bind(asset.head_version)
        .bind(now)
        .bind(asset.deleted_at)
        .bind(asset.id)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, &asset.slug))?;

        asset.updated_at = now;
        Ok(())
    }

    /// All current assets: head records that are not soft-deleted
    pub async fn all_current(&self) -> MediaResult<Vec<MediaAsset>> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSET_COLUMNS} FROM media \
             WHERE head_version IS NULL AND deleted_at IS NULL ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(row_to_asset).collect()
    }

    /// Historical versions of a head record, newest first
    pub async fn versions_of(&self, head_id: i64) -> MediaResult<Vec<MediaAsset>> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSET_COLUMNS} FROM media \
             WHERE head_version = ?1 ORDER BY updated_at DESC, id DESC"
        ))
        .bind(head_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(row_to_asset).collect()
    }

    /// Resolve `foo/bar/baz.png` to an asset.
    ///
    /// The final segment matches the asset slug (and extension, when the
    /// segment carries one); the preceding segments must match the ancestor
    /// directory chain exactly, deepest first up to the root.
    pub async fn find_by_path(&self, path: &str) -> MediaResult<MediaAsset> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(MediaError::NotFound(path.to_string()));
        }

        let mut parts: Vec<&str> = trimmed.split('/').collect();
        let Some(last) = parts.pop() else {
            return Err(MediaError::NotFound(path.to_string()));
        };
        let (slug, extension) = match last.rsplit_once('.') {
            Some((s, e)) if !s.is_empty() => (s, Some(e)),
            _ => (last, None),
        };

        let rows = sqlx::query(&format!(
            "SELECT {ASSET_COLUMNS} FROM media \
             WHERE slug = ?1 AND head_version IS NULL AND deleted_at IS NULL"
        ))
        .bind(slug)
        .fetch_all(&self.db)
        .await?;

        let mut matches = Vec::new();
        for row in rows {
            let asset = row_to_asset(row)?;
            if let Some(ext) = extension {
                if !asset.extension().eq_ignore_ascii_case(ext) {
                    continue;
                }
            }
            if self.directory_chain_matches(asset.directory_id, &parts).await? {
                matches.push(asset);
            }
        }

        match matches.len() {
            0 => Err(MediaError::NotFound(path.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(MediaError::AmbiguousPath(path.to_string())),
        }
    }

    /// Full path of an asset: ancestor directory slugs joined with `/`,
    /// then `slug.extension`
    pub async fn full_path(&self, asset: &MediaAsset) -> MediaResult<String> {
        let mut segments = vec![format!("{}.{}", asset.slug, asset.extension())];
        let mut dir_id = asset.directory_id;

        while let Some(id) = dir_id {
            let row = sqlx::query("SELECT slug, parent_id FROM media_directory WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| MediaError::NotFound(format!("Directory {id}")))?;
            segments.push(row.try_get::<String, _>("slug")?);
            dir_id = row.try_get("parent_id")?;
        }

        segments.reverse();
        Ok(segments.join("/"))
    }

    /// Soft-delete: tombstone the record, keep the blob
    pub async fn soft_delete(&self, id: i64) -> MediaResult<()> {
        let result = sqlx::query("UPDATE media SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MediaError::NotFound(format!("Media item {id}")));
        }
        Ok(())
    }

    /// Remove the record permanently and return it.
    ///
    /// The caller decides blob cleanup with `is_filename_referenced`.
    pub async fn remove(&self, id: i64) -> MediaResult<MediaAsset> {
        let asset = self.get(id).await?;

        sqlx::query("DELETE FROM media WHERE id = ?1 OR head_version = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(asset)
    }

    /// Whether any remaining record references this stored filename, either
    /// as its original or inside its variant list
    pub async fn is_filename_referenced(&self, filename: &str) -> MediaResult<bool> {
        let row = sqlx::query(
            "SELECT count(id) AS refs FROM media \
             WHERE filename = ?1 OR variants LIKE '%' || ?1 || '%'",
        )
        .bind(filename)
        .fetch_one(&self.db)
        .await?;

        Ok(row.try_get::<i64, _>("refs")? > 0)
    }

    /// Every filename any record references, including soft-deleted assets
    /// and historical versions. This is the live set for the GC sweep.
    pub async fn referenced_filenames(&self) -> MediaResult<HashSet<String>> {
        let rows = sqlx::query("SELECT filename, variants FROM media")
            .fetch_all(&self.db)
            .await?;

        let mut filenames = HashSet::new();
        for row in rows {
            filenames.insert(row.try_get::<String, _>("filename")?);
            let variants: Vec<Variant> = parse_variants(row.try_get("variants")?)?;
            for variant in variants {
                filenames.insert(variant.filename);
            }
        }

        Ok(filenames)
    }
}

fn parse_variants(raw: String) -> MediaResult<Vec<Variant>> {
    serde_json::from_str(&raw)
        .map_err(|e| MediaError::Internal(format!("Corrupt variant record: {e}")))
}

fn row_to_asset(row: SqliteRow) -> MediaResult<MediaAsset> {
    let kind_value: i64 = row.try_get("kind")?;
    let kind = MediaKind::from_i64(kind_value)
        .ok_or_else(|| MediaError::Internal(format!("Unknown media kind {kind_value}")))?;

    Ok(MediaAsset {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        filename: row.try_get("filename")?,
        kind,
        author: row.try_get("author")?,
        caption: row.try_get("caption")?,
        description: row.try_get("description")?,
        stored_variants: parse_variants(row.try_get("variants")?)?,
        directory_id: row.try_get("directory_id")?,
        head_version: row.try_get("head_version")?,
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

impl MediaRepository {
    async fn directory_chain_matches(
        &self,
        mut dir_id: Option<i64>,
        ancestors: &[&str],
    ) -> MediaResult<bool> {
        for expected in ancestors.iter().rev() {
            let Some(id) = dir_id else { return Ok(false) };
            let row = sqlx::query(
                "SELECT slug, parent_id FROM media_directory WHERE id = ?1 AND deleted_at IS NULL",
            )
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

            let Some(row) = row else { return Ok(false) };
            if row.try_get::<String, _>("slug")? != *expected {
                return Ok(false);
            }
            dir_id = row.try_get("parent_id")?;
        }

        // chain must terminate at the root
        Ok(dir_id.is_none())
    }
}
