//! Filesystem-based content store.
//!
//! Blob bytes and their metadata sidecars live side by side in a sharded
//! directory tree keyed by the hash of the blob id.

use crate::record::{StoredRecord, compute_hash};
use crate::DEFAULT_CHUNK_SIZE;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use darkroom_core::{BlobUpload, Photo, PhotoId};
use darkroom_error::{DarkroomResult, StorageError, StorageErrorKind};
use darkroom_interface::{ByteStream, ContentStore, Download};
use futures_util::Stream;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

/// Filesystem content store.
///
/// Layout: `{base_path}/{hash[0:2]}/{hash[2:4]}/{id}.blob` with the metadata
/// sidecar `{id}.json` next to it, where `hash` is the SHA-256 of the id.
///
/// # Example Structure
///
/// ```text
/// /var/darkroom/blobs/
/// ├── 3f/
/// │   └── a9/
/// │       ├── 9b1f0c2e-....blob
/// │       └── 9b1f0c2e-....json
/// └── c0/
///     └── 17/
///         ├── 41d2aa80-....blob
///         └── 41d2aa80-....json
/// ```
///
/// # Features
///
/// - **Atomic writes**: temp file + rename for both blob and sidecar
/// - **Commit point**: a blob exists once its sidecar is in place
/// - **Targeted updates**: metadata keys are set under a per-blob lock
/// - **Integrity**: content hash recorded at upload and checked on read
pub struct FileSystemContentStore {
    base_path: PathBuf,
    chunk_size: usize,
    locks: Mutex<HashMap<PhotoId, Arc<Mutex<()>>>>,
}

impl FileSystemContentStore {
    /// Create a new filesystem store rooted at `base_path`.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or accessed.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> DarkroomResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::info!(path = %base_path.display(), "Opened filesystem content store");
        Ok(Self {
            base_path,
            chunk_size: DEFAULT_CHUNK_SIZE,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Override the streaming chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Root directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Shard directory for a blob id.
    ///
    /// Structure: `{base}/{hash[0:2]}/{hash[2:4]}`
    fn shard_dir(&self, id: &PhotoId) -> PathBuf {
        let hash = compute_hash(id.to_string().as_bytes());
        self.base_path.join(&hash[0..2]).join(&hash[2..4])
    }

    fn blob_path(&self, id: &PhotoId) -> PathBuf {
        self.shard_dir(id).join(format!("{}.blob", id))
    }

    fn record_path(&self, id: &PhotoId) -> PathBuf {
        self.shard_dir(id).join(format!("{}.json", id))
    }

    async fn lock_for(&self, id: &PhotoId) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(*id).or_default().clone()
    }

    /// Drop the map entry for `id` once no other update holds or awaits it.
    async fn release_lock(&self, id: &PhotoId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One count for the map, one for `lock`.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    async fn held_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    async fn update_record(&self, id: &PhotoId, key: &str, value: &str) -> DarkroomResult<bool> {
        let Some(mut record) = self.read_record(id).await? else {
            tracing::debug!("No blob to update");
            return Ok(false);
        };
        record.set_field(key, value);
        self.write_record(&record).await?;

        tracing::debug!(key, "Updated metadata field");
        Ok(true)
    }

    async fn read_record(&self, id: &PhotoId) -> DarkroomResult<Option<StoredRecord>> {
        read_record_at(&self.record_path(id)).await
    }

    async fn write_record(&self, record: &StoredRecord) -> DarkroomResult<()> {
        let data = serde_json::to_vec_pretty(record)
            .map_err(|e| StorageError::new(StorageErrorKind::Metadata(e.to_string())))?;
        write_atomic(&self.record_path(&record.id), &data).await
    }

    /// Every sidecar path under the base directory.
    async fn record_paths(&self) -> DarkroomResult<Vec<PathBuf>> {
        let mut pending = vec![self.base_path.clone()];
        let mut found = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", dir.display(), e)))
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", dir.display(), e)))
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| {
                    StorageError::new(StorageErrorKind::FileRead(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                })?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "json") {
                    found.push(path);
                }
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl ContentStore for FileSystemContentStore {
    #[tracing::instrument(skip(self), fields(photo_id = %id))]
    async fn open_download(&self, id: &PhotoId) -> DarkroomResult<Download> {
        let record = self
            .read_record(id)
            .await?
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(id.to_string())))?;
        let photo = record.to_photo()?;

        let path = self.blob_path(id);
        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(id.to_string()))
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", path.display(), e)))
            }
        })?;

        tracing::debug!(path = %path.display(), length = record.length, "Opened blob for streaming");

        let stream: ByteStream = Box::pin(verified_chunks(
            file,
            path,
            self.chunk_size,
            record.content_hash,
        ));
        Ok(Download::new(photo, stream))
    }

    #[tracing::instrument(skip(self, upload, data), fields(filename = %upload.filename, size = data.len()))]
    async fn upload(&self, upload: BlobUpload, data: Bytes) -> DarkroomResult<PhotoId> {
        let id = PhotoId::new();
        let record = StoredRecord::new(id, &upload, &data)?;

        let shard = self.shard_dir(&id);
        tokio::fs::create_dir_all(&shard).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                shard.display(),
                e
            )))
        })?;

        write_atomic(&self.blob_path(&id), &data).await?;
        self.write_record(&record).await?;

        tracing::info!(photo_id = %id, hash = %record.content_hash, "Stored blob");
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(photo_id = %id))]
    async fn find(&self, id: &PhotoId) -> DarkroomResult<Option<Photo>> {
        self.read_record(id)
            .await?
            .map(|record| record.to_photo())
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_owner(&self, business_id: &str) -> DarkroomResult<Vec<Photo>> {
        let mut photos = Vec::new();
        for path in self.record_paths().await? {
            let record = match read_record_at(&path).await {
                Ok(Some(record)) if record.is_owned_by(business_id) => record,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable sidecar");
                    continue;
                }
            };
            match record.to_photo() {
                Ok(photo) => photos.push(photo),
                Err(e) => {
                    tracing::warn!(photo_id = %record.id, error = %e, "Skipping unparsable record");
                }
            }
        }
        photos.sort_by_key(|photo| photo.uploaded_at);

        tracing::debug!(count = photos.len(), "Listed blobs by owner");
        Ok(photos)
    }

    #[tracing::instrument(skip(self, value), fields(photo_id = %id))]
    async fn set_metadata_field(
        &self,
        id: &PhotoId,
        key: &str,
        value: &str,
    ) -> DarkroomResult<bool> {
        let lock = self.lock_for(id).await;
        let updated = {
            let _guard = lock.lock().await;
            self.update_record(id, key, value).await
        };
        self.release_lock(id, lock).await;
        updated
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

/// Stream a blob file in chunks, failing at the end if its hash differs
/// from the one recorded at upload.
fn verified_chunks(
    mut file: tokio::fs::File,
    path: PathBuf,
    chunk_size: usize,
    expected_hash: String,
) -> impl Stream<Item = DarkroomResult<Bytes>> + Send {
    async_stream::try_stream! {
        let mut hasher = Sha256::new();
        loop {
            let mut chunk = BytesMut::zeroed(chunk_size);
            let read = file.read(&mut chunk).await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", path.display(), e)))
            })?;
            if read == 0 {
                break;
            }
            chunk.truncate(read);
            hasher.update(&chunk);
            yield chunk.freeze();
        }

        let actual_hash = format!("{:x}", hasher.finalize());
        if actual_hash != expected_hash {
            Err::<(), _>(StorageError::new(StorageErrorKind::FileRead(format!(
                "Hash mismatch for {}: expected {}, got {}",
                path.display(),
                expected_hash,
                actual_hash
            ))))?;
        }
    }
}

async fn read_record_at(path: &Path) -> DarkroomResult<Option<StoredRecord>> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
            .into());
        }
    };

    let record = serde_json::from_slice(&data).map_err(|e| {
        StorageError::new(StorageErrorKind::Metadata(format!("{}: {}", path.display(), e)))
    })?;
    Ok(Some(record))
}

/// Write to a sibling temp file first, then rename into place.
async fn write_atomic(path: &Path, data: &[u8]) -> DarkroomResult<()> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    tokio::fs::write(&temp_path, data).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            temp_path.display(),
            e
        )))
    })?;

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        )))
    })?;

    Ok(())
}
