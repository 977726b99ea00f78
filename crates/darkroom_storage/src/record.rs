//! Persisted blob record shared by the store backends.

use chrono::{DateTime, Utc};
use darkroom_core::{BlobUpload, Photo, PhotoId, PhotoMetadata};
use darkroom_error::{DarkroomResult, StorageError, StorageErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Everything a store keeps about a blob besides its bytes.
///
/// The metadata document is held as a raw JSON object so single keys can be
/// set without touching the rest of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Blob id
    pub id: PhotoId,
    /// Name given at upload
    pub filename: String,
    /// Content length in bytes
    pub length: u64,
    /// Commit time
    pub uploaded_at: DateTime<Utc>,
    /// SHA-256 of the content, lowercase hex
    pub content_hash: String,
    /// Metadata document
    pub metadata: Map<String, Value>,
}

impl StoredRecord {
    /// Build the record for a fresh upload.
    pub fn new(id: PhotoId, upload: &BlobUpload, data: &[u8]) -> DarkroomResult<Self> {
        let metadata = match serde_json::to_value(&upload.metadata) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(StorageError::new(StorageErrorKind::Metadata(format!(
                    "expected an object, got {}",
                    other
                )))
                .into());
            }
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::Metadata(e.to_string())).into());
            }
        };

        Ok(Self {
            id,
            filename: upload.filename.clone(),
            length: data.len() as u64,
            uploaded_at: Utc::now(),
            content_hash: compute_hash(data),
            metadata,
        })
    }

    /// Whether the metadata document names `business_id` as owner.
    pub fn is_owned_by(&self, business_id: &str) -> bool {
        matches!(self.metadata.get("businessId"), Some(Value::String(owner)) if owner == business_id)
    }

    /// Set one top-level metadata key.
    pub fn set_field(&mut self, key: &str, value: &str) {
        self.metadata
            .insert(key.to_string(), Value::String(value.to_string()));
    }

    /// Typed view of the record.
    pub fn to_photo(&self) -> DarkroomResult<Photo> {
        let metadata: PhotoMetadata =
            serde_json::from_value(Value::Object(self.metadata.clone())).map_err(|e| {
                StorageError::new(StorageErrorKind::Metadata(format!("{}: {}", self.id, e)))
            })?;

        Ok(Photo {
            id: self.id,
            filename: self.filename.clone(),
            length: self.length,
            uploaded_at: self.uploaded_at,
            metadata,
        })
    }
}

/// SHA-256 of `data` as lowercase hex.
pub(crate) fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkroom_core::VariantSize;

    #[test]
    fn test_set_field_preserves_other_keys() {
        let upload = BlobUpload {
            filename: "a.png".to_string(),
            metadata: PhotoMetadata::for_upload("image/png", "b-1", Some("front".into())),
        };
        let id = PhotoId::new();
        let mut record = StoredRecord::new(id, &upload, b"data").expect("record");
        record.set_field("256", &id.to_string());

        let photo = record.to_photo().expect("typed view");
        assert_eq!(photo.metadata.caption.as_deref(), Some("front"));
        assert_eq!(photo.metadata.variant(VariantSize::Edge256), Some(id));
        assert!(record.is_owned_by("b-1"));
        assert!(!record.is_owned_by("b-2"));
    }
}
