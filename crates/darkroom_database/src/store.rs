//! PostgreSQL-backed content store.

use crate::models::{BlobRecordRow, NewBlobRow};
use crate::schema::media_blobs;
use crate::{DatabaseResult, MIGRATIONS};
use async_trait::async_trait;
use bytes::Bytes;
use darkroom_core::{BlobUpload, Photo, PhotoId};
use darkroom_error::{DarkroomResult, DatabaseError, DatabaseErrorKind};
use darkroom_interface::{ByteStream, ContentStore, Download};
use darkroom_storage::{DEFAULT_CHUNK_SIZE, StoredRecord};
use diesel::dsl::sql;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sql_types::{Bool, Text};
use diesel_migrations::MigrationHarness;

type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Content store keeping blob bytes in `bytea` and the metadata document in
/// `jsonb`.
///
/// Metadata keys are set with `jsonb_set` in a single `UPDATE`, so concurrent
/// updates of different keys on the same blob never overwrite each other.
/// Every diesel call runs on a blocking thread with a pooled connection.
#[derive(Clone)]
pub struct PostgresContentStore {
    pool: PgPool,
    chunk_size: usize,
}

impl PostgresContentStore {
    /// Wrap an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Build a pool for `database_url` and apply pending migrations.
    #[tracing::instrument(skip(database_url))]
    pub async fn connect(database_url: &str, pool_size: u32) -> DarkroomResult<Self> {
        let database_url = database_url.to_string();

        let pool = tokio::task::spawn_blocking(move || -> DatabaseResult<PgPool> {
            let pool = Pool::builder()
                .max_size(pool_size.max(1))
                .build(ConnectionManager::<PgConnection>::new(database_url))
                .map_err(|e| DatabaseError::new(DatabaseErrorKind::Connection(e.to_string())))?;

            let mut conn = pool
                .get()
                .map_err(|e| DatabaseError::new(DatabaseErrorKind::Connection(e.to_string())))?;
            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| DatabaseError::new(DatabaseErrorKind::Migration(e.to_string())))?;
            tracing::info!(applied = applied.len(), "Database migrations applied");

            Ok(pool)
        })
        .await
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Connection(e.to_string())))??;

        Ok(Self::new(pool))
    }

    /// Override the streaming chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Run `f` with a pooled connection on a blocking thread.
    async fn with_conn<T, F>(&self, f: F) -> DarkroomResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PooledConnection<ConnectionManager<PgConnection>>) -> DarkroomResult<T>
            + Send
            + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DatabaseError::new(DatabaseErrorKind::Connection(e.to_string())))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DatabaseError::new(DatabaseErrorKind::Query(e.to_string())))?
    }
}

#[async_trait]
impl ContentStore for PostgresContentStore {
    #[tracing::instrument(skip(self), fields(photo_id = %id))]
    async fn open_download(&self, id: &PhotoId) -> DarkroomResult<Download> {
        let key = *id.as_uuid();
        let (row, data) = self
            .with_conn(move |conn| {
                let found = media_blobs::table
                    .filter(media_blobs::id.eq(key))
                    .select((BlobRecordRow::as_select(), media_blobs::data))
                    .first::<(BlobRecordRow, Vec<u8>)>(conn)
                    .map_err(DatabaseError::from)?;
                Ok(found)
            })
            .await?;

        let photo = row.into_record()?.to_photo()?;
        let data = Bytes::from(data);
        let chunks: Vec<DarkroomResult<Bytes>> = (0..data.len())
            .step_by(self.chunk_size)
            .map(|start| Ok(data.slice(start..(start + self.chunk_size).min(data.len()))))
            .collect();
        let stream: ByteStream = Box::pin(futures_util::stream::iter(chunks));

        Ok(Download::new(photo, stream))
    }

    #[tracing::instrument(skip(self, upload, data), fields(filename = %upload.filename, size = data.len()))]
    async fn upload(&self, upload: BlobUpload, data: Bytes) -> DarkroomResult<PhotoId> {
        let id = PhotoId::new();
        let row = NewBlobRow::new(StoredRecord::new(id, &upload, &data)?, data.to_vec());

        self.with_conn(move |conn| {
            diesel::insert_into(media_blobs::table)
                .values(&row)
                .execute(conn)
                .map_err(DatabaseError::from)?;
            Ok(())
        })
        .await?;

        tracing::info!(photo_id = %id, "Stored blob in database");
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(photo_id = %id))]
    async fn find(&self, id: &PhotoId) -> DarkroomResult<Option<Photo>> {
        let key = *id.as_uuid();
        let row = self
            .with_conn(move |conn| {
                let row = media_blobs::table
                    .filter(media_blobs::id.eq(key))
                    .select(BlobRecordRow::as_select())
                    .first(conn)
                    .optional()
                    .map_err(DatabaseError::from)?;
                Ok(row)
            })
            .await?;

        row.map(|row| row.into_record()?.to_photo()).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_owner(&self, business_id: &str) -> DarkroomResult<Vec<Photo>> {
        let business_id = business_id.to_string();
        let rows = self
            .with_conn(move |conn| {
                let rows = media_blobs::table
                    .filter(
                        sql::<Bool>("metadata->>'businessId' = ").bind::<Text, _>(business_id),
                    )
                    .order(media_blobs::uploaded_at.asc())
                    .select(BlobRecordRow::as_select())
                    .load(conn)
                    .map_err(DatabaseError::from)?;
                Ok(rows)
            })
            .await?;

        let photos = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                match row.into_record().and_then(|record| record.to_photo()) {
                    Ok(photo) => Some(photo),
                    Err(e) => {
                        tracing::warn!(photo_id = %id, error = %e, "Skipping unparsable row");
                        None
                    }
                }
            })
            .collect();
        Ok(photos)
    }

    #[tracing::instrument(skip(self, value), fields(photo_id = %id))]
    async fn set_metadata_field(
        &self,
        id: &PhotoId,
        key: &str,
        value: &str,
    ) -> DarkroomResult<bool> {
        let uuid = *id.as_uuid();
        let key = key.to_string();
        let value = value.to_string();

        let updated = self
            .with_conn(move |conn| {
                let updated = diesel::sql_query(
                    "UPDATE media_blobs \
                     SET metadata = jsonb_set(metadata, ARRAY[$1]::text[], to_jsonb($2::text), true) \
                     WHERE id = $3",
                )
                .bind::<Text, _>(key)
                .bind::<Text, _>(value)
                .bind::<diesel::sql_types::Uuid, _>(uuid)
                .execute(conn)
                .map_err(DatabaseError::from)?;
                Ok(updated)
            })
            .await?;

        Ok(updated > 0)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
