//! Photo repository trait and SQLite implementation

use async_trait::async_trait;
use core_auth::ProviderKind;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

use crate::error::{LibraryError, Result};
use crate::models::{ContentHandle, Photo, PhotoId, SyncState};
use crate::source::PhotoSource;

/// Catalogue operations used by the capture side of the app.
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Insert a newly captured photo and return it as stored.
    ///
    /// The stored `file_name` is the photo's remote name. It differs from the
    /// captured one when another photo in the same album/folder already holds
    /// that name.
    ///
    /// # Errors
    /// Returns [`LibraryError::InvalidInput`] when the photo fails validation.
    async fn insert(&self, photo: &Photo) -> Result<Photo>;

    /// Find a photo, including its sync status map.
    async fn find_by_id(&self, id: &PhotoId) -> Result<Option<Photo>>;

    /// Number of photos not yet synced to `provider`.
    async fn count_pending(&self, provider: ProviderKind) -> Result<i64>;
}

/// SQLite implementation of [`PhotoRepository`] and [`PhotoSource`].
#[derive(Clone)]
pub struct SqlitePhotoRepository {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct PhotoRow {
    id: String,
    file_name: String,
    mime_type: String,
    content_path: String,
    captured_at: i64,
    album: String,
    folder: String,
}

#[derive(Debug, FromRow)]
struct StatusRow {
    photo_id: String,
    provider: String,
    state: String,
    reason: Option<String>,
}

impl TryFrom<PhotoRow> for Photo {
    type Error = LibraryError;

    fn try_from(row: PhotoRow) -> Result<Self> {
        let id = PhotoId::from_string(&row.id).map_err(|e| LibraryError::InvalidInput {
            field: "id".to_string(),
            message: e.to_string(),
        })?;

        Ok(Photo {
            id,
            file_name: row.file_name,
            mime_type: row.mime_type,
            content: ContentHandle::new(row.content_path),
            captured_at: row.captured_at,
            album: row.album,
            folder: row.folder,
            sync_status: BTreeMap::new(),
        })
    }
}

const STATUS_BATCH_SIZE: usize = 500;

const PENDING_FILTER: &str = r#"
    FROM photos p
    LEFT JOIN photo_sync_status s ON s.photo_id = p.id AND s.provider = ?
    WHERE s.state IS NULL OR s.state != 'synced'
"#;

impl SqlitePhotoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Attach status rows to the given photos.
    ///
    /// Ids are bound in batches to stay under SQLite's bound-variable limit.
    async fn attach_statuses(&self, photos: &mut [Photo]) -> Result<()> {
        if photos.is_empty() {
            return Ok(());
        }

        let mut rows: Vec<StatusRow> = Vec::new();
        for batch in photos.chunks(STATUS_BATCH_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT photo_id, provider, state, reason FROM photo_sync_status WHERE photo_id IN (",
            );
            let mut separated = builder.separated(", ");
            for photo in batch {
                separated.push_bind(photo.id.to_string());
            }
            separated.push_unseparated(")");

            rows.extend(
                builder
                    .build_query_as::<StatusRow>()
                    .fetch_all(&self.pool)
                    .await?,
            );
        }

        let index: HashMap<String, usize> = photos
            .iter()
            .enumerate()
            .map(|(i, photo)| (photo.id.to_string(), i))
            .collect();

        for row in rows {
            let Some(provider) = ProviderKind::parse(&row.provider) else {
                debug!(provider = %row.provider, "Ignoring status row for unknown provider");
                continue;
            };
            if let Some(&i) = index.get(&row.photo_id) {
                let state = SyncState::from_parts(&row.state, row.reason)?;
                photos[i].sync_status.insert(provider, state);
            }
        }

        Ok(())
    }

    /// First free name for `photo` inside its album/folder.
    ///
    /// Remote copies are matched by name, so two photos in the same folder
    /// must never share one. Taken names get a ` (2)`, ` (3)`, ... suffix
    /// before the extension. Comparison ignores case like the providers do.
    async fn available_file_name(conn: &mut SqliteConnection, photo: &Photo) -> Result<String> {
        let (stem, extension) = match photo.file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{}", ext)),
            _ => (photo.file_name.as_str(), String::new()),
        };

        let mut candidate = photo.file_name.clone();
        let mut suffix = 1u32;
        loop {
            let taken: Option<(String,)> = sqlx::query_as(
                "SELECT id FROM photos WHERE album = ? AND folder = ? AND file_name = ? COLLATE NOCASE LIMIT 1",
            )
            .bind(&photo.album)
            .bind(&photo.folder)
            .bind(&candidate)
            .fetch_optional(&mut *conn)
            .await?;

            if taken.is_none() {
                return Ok(candidate);
            }

            suffix += 1;
            candidate = format!("{} ({}){}", stem, suffix, extension);
        }
    }

    /// Write a non-synced state unless the cell is already synced.
    async fn write_unsynced_state(
        &self,
        photo: &PhotoId,
        provider: ProviderKind,
        state: &SyncState,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO photo_sync_status (photo_id, provider, state, reason, remote_id, updated_at)
            VALUES (?, ?, ?, ?, NULL, ?)
            ON CONFLICT (photo_id, provider) DO UPDATE SET
                state = excluded.state,
                reason = excluded.reason,
                updated_at = excluded.updated_at
            WHERE photo_sync_status.state != 'synced'
            "#,
        )
        .bind(photo.to_string())
        .bind(provider.as_str())
        .bind(state.as_str())
        .bind(state.reason())
        .bind(Self::now_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PhotoRepository for SqlitePhotoRepository {
    async fn insert(&self, photo: &Photo) -> Result<Photo> {
        photo
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "photo".to_string(),
                message,
            })?;

        let mut tx = self.pool.begin().await?;

        let file_name = Self::available_file_name(&mut *tx, photo).await?;
        if file_name != photo.file_name {
            debug!(photo_id = %photo.id, from = %photo.file_name, to = %file_name, "Renamed to keep remote names unique");
        }

        sqlx::query(
            r#"
            INSERT INTO photos (id, file_name, mime_type, content_path, captured_at, album, folder, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(photo.id.to_string())
        .bind(&file_name)
        .bind(&photo.mime_type)
        .bind(photo.content.path().to_string_lossy().into_owned())
        .bind(photo.captured_at)
        .bind(&photo.album)
        .bind(&photo.folder)
        .bind(Self::now_millis())
        .execute(&mut *tx)
        .await?;

        for (provider, state) in &photo.sync_status {
            sqlx::query(
                r#"
                INSERT INTO photo_sync_status (photo_id, provider, state, reason, remote_id, updated_at)
                VALUES (?, ?, ?, ?, NULL, ?)
                "#,
            )
            .bind(photo.id.to_string())
            .bind(provider.as_str())
            .bind(state.as_str())
            .bind(state.reason())
            .bind(Self::now_millis())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(photo_id = %photo.id, file = %file_name, "Photo inserted");
        Ok(Photo {
            file_name,
            ..photo.clone()
        })
    }

    async fn find_by_id(&self, id: &PhotoId) -> Result<Option<Photo>> {
        let row: Option<PhotoRow> = sqlx::query_as(
            "SELECT id, file_name, mime_type, content_path, captured_at, album, folder FROM photos WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut photos = vec![Photo::try_from(row)?];
        self.attach_statuses(&mut photos).await?;
        Ok(photos.pop())
    }

    async fn count_pending(&self, provider: ProviderKind) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) {}", PENDING_FILTER))
            .bind(provider.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl PhotoSource for SqlitePhotoRepository {
    #[instrument(skip(self), fields(provider = provider.as_str()))]
    async fn list_pending(&self, provider: ProviderKind) -> Result<Vec<Photo>> {
        let sql = format!(
            "SELECT p.id, p.file_name, p.mime_type, p.content_path, p.captured_at, p.album, p.folder {} \
             ORDER BY p.captured_at ASC, p.id ASC",
            PENDING_FILTER
        );

        let rows: Vec<PhotoRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut photos = rows
            .into_iter()
            .map(Photo::try_from)
            .collect::<Result<Vec<_>>>()?;
        self.attach_statuses(&mut photos).await?;

        debug!(count = photos.len(), "Listed pending photos");
        Ok(photos)
    }

    async fn mark_uploading(&self, photo: &PhotoId, provider: ProviderKind) -> Result<()> {
        self.write_unsynced_state(photo, provider, &SyncState::Uploading)
            .await
    }

    async fn mark_synced(
        &self,
        photo: &PhotoId,
        provider: ProviderKind,
        remote_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO photo_sync_status (photo_id, provider, state, reason, remote_id, updated_at)
            VALUES (?, ?, 'synced', NULL, ?, ?)
            ON CONFLICT (photo_id, provider) DO UPDATE SET
                state = 'synced',
                reason = NULL,
                remote_id = COALESCE(excluded.remote_id, photo_sync_status.remote_id),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(photo.to_string())
        .bind(provider.as_str())
        .bind(remote_id)
        .bind(Self::now_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        photo: &PhotoId,
        provider: ProviderKind,
        reason: &str,
    ) -> Result<()> {
        self.write_unsynced_state(photo, provider, &SyncState::Failed(reason.to_string()))
            .await
    }

    async fn mark_pending(&self, photo: &PhotoId, provider: ProviderKind) -> Result<()> {
        self.write_unsynced_state(photo, provider, &SyncState::Pending)
            .await
    }
}
