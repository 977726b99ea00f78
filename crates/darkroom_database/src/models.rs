//! Row types for the `media_blobs` table.

use crate::schema::media_blobs;
use chrono::{DateTime, Utc};
use darkroom_core::PhotoId;
use darkroom_error::{DarkroomResult, StorageError, StorageErrorKind};
use darkroom_storage::StoredRecord;
use diesel::prelude::*;
use uuid::Uuid;

/// A blob row without its content.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = media_blobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BlobRecordRow {
    pub id: Uuid,
    pub filename: String,
    pub length: i64,
    pub content_hash: String,
    pub metadata: serde_json::Value,
    pub uploaded_at: DateTime<Utc>,
}

impl BlobRecordRow {
    /// Convert to the store-neutral record.
    pub fn into_record(self) -> DarkroomResult<StoredRecord> {
        let metadata = match self.metadata {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(StorageError::new(StorageErrorKind::Metadata(format!(
                    "{}: expected an object, got {}",
                    self.id, other
                )))
                .into());
            }
        };

        Ok(StoredRecord {
            id: PhotoId::from(self.id),
            filename: self.filename,
            length: u64::try_from(self.length).unwrap_or_default(),
            uploaded_at: self.uploaded_at,
            content_hash: self.content_hash,
            metadata,
        })
    }
}

/// New blob row for insertion.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = media_blobs)]
pub struct NewBlobRow {
    pub id: Uuid,
    pub filename: String,
    pub length: i64,
    pub content_hash: String,
    pub data: Vec<u8>,
    pub metadata: serde_json::Value,
    pub uploaded_at: DateTime<Utc>,
}

impl NewBlobRow {
    /// Build the insert from a store-neutral record and its content.
    pub fn new(record: StoredRecord, data: Vec<u8>) -> Self {
        Self {
            id: *record.id.as_uuid(),
            filename: record.filename,
            length: i64::try_from(record.length).unwrap_or(i64::MAX),
            content_hash: record.content_hash,
            data,
            metadata: serde_json::Value::Object(record.metadata),
            uploaded_at: record.uploaded_at,
        }
    }
}
