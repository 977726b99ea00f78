//! In-process content store.

use crate::DEFAULT_CHUNK_SIZE;
use crate::record::StoredRecord;
use async_trait::async_trait;
use bytes::Bytes;
use darkroom_core::{BlobUpload, Photo, PhotoId};
use darkroom_error::{DarkroomResult, StorageError, StorageErrorKind};
use darkroom_interface::{ByteStream, ContentStore, Download};
use futures_util::stream;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct MemoryEntry {
    record: StoredRecord,
    data: Bytes,
}

/// Content store held entirely in memory.
///
/// Behaves like [`FileSystemContentStore`](crate::FileSystemContentStore):
/// content is streamed back in chunks and metadata keys are updated one at a
/// time under the store's write lock.
pub struct MemoryContentStore {
    entries: RwLock<HashMap<PhotoId, MemoryEntry>>,
    chunk_size: usize,
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the streaming chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Number of blobs currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no blobs.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    #[tracing::instrument(skip(self), fields(photo_id = %id))]
    async fn open_download(&self, id: &PhotoId) -> DarkroomResult<Download> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(id)
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(id.to_string())))?;

        let data = entry.data.clone();
        let chunks: Vec<DarkroomResult<Bytes>> = (0..data.len())
            .step_by(self.chunk_size)
            .map(|start| Ok(data.slice(start..(start + self.chunk_size).min(data.len()))))
            .collect();
        let stream: ByteStream = Box::pin(stream::iter(chunks));

        Ok(Download::new(entry.record.to_photo()?, stream))
    }

    #[tracing::instrument(skip(self, upload, data), fields(filename = %upload.filename, size = data.len()))]
    async fn upload(&self, upload: BlobUpload, data: Bytes) -> DarkroomResult<PhotoId> {
        let id = PhotoId::new();
        let record = StoredRecord::new(id, &upload, &data)?;
        self.entries
            .write()
            .await
            .insert(id, MemoryEntry { record, data });

        tracing::debug!(photo_id = %id, "Stored blob in memory");
        Ok(id)
    }

    async fn find(&self, id: &PhotoId) -> DarkroomResult<Option<Photo>> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|entry| entry.record.to_photo())
            .transpose()
    }

    async fn find_by_owner(&self, business_id: &str) -> DarkroomResult<Vec<Photo>> {
        let entries = self.entries.read().await;
        let mut photos = entries
            .values()
            .filter(|entry| entry.record.is_owned_by(business_id))
            .filter_map(|entry| match entry.record.to_photo() {
                Ok(photo) => Some(photo),
                Err(e) => {
                    tracing::warn!(photo_id = %entry.record.id, error = %e, "Skipping unparsable record");
                    None
                }
            })
            .collect::<Vec<_>>();
        photos.sort_by_key(|photo| photo.uploaded_at);
        Ok(photos)
    }

    #[tracing::instrument(skip(self, value), fields(photo_id = %id))]
    async fn set_metadata_field(
        &self,
        id: &PhotoId,
        key: &str,
        value: &str,
    ) -> DarkroomResult<bool> {
        match self.entries.write().await.get_mut(id) {
            Some(entry) => {
                entry.record.set_field(key, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkroom_core::PhotoMetadata;

    #[tokio::test]
    async fn test_download_streams_in_chunks() {
        let store = MemoryContentStore::new().with_chunk_size(4);
        let upload = BlobUpload {
            filename: "x.bin".to_string(),
            metadata: PhotoMetadata::for_variant("image/jpeg"),
        };
        let id = store
            .upload(upload, Bytes::from_static(b"0123456789"))
            .await
            .unwrap();

        let (_, stream) = store.open_download(&id).await.unwrap().into_parts();
        let chunks: Vec<_> = futures_util::StreamExt::collect::<Vec<_>>(stream).await;
        assert_eq!(chunks.len(), 3);

        let (_, bytes) = store
            .open_download(&id)
            .await
            .unwrap()
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"0123456789");
    }

    #[tokio::test]
    async fn test_listing_keeps_records_with_unknown_keys() {
        let store = MemoryContentStore::new();
        let upload = BlobUpload {
            filename: "front.png".to_string(),
            metadata: PhotoMetadata::for_upload("image/png", "b-7", None),
        };
        let id = store.upload(upload, Bytes::from_static(b"png")).await.unwrap();
        assert!(store.set_metadata_field(&id, "thumbnail", "legacy").await.unwrap());

        let listed = store.find_by_owner("b-7").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert!(store.open_download(&id).await.is_ok());
    }
}
