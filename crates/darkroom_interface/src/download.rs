//! Streaming reads from a content store.

use bytes::{Bytes, BytesMut};
use darkroom_core::Photo;
use darkroom_error::DarkroomResult;
use futures_util::stream::{Stream, TryStreamExt};
use std::pin::Pin;

/// Chunked byte stream of a stored blob.
pub type ByteStream = Pin<Box<dyn Stream<Item = DarkroomResult<Bytes>> + Send>>;

/// An open streaming read: the stored record plus its content.
pub struct Download {
    photo: Photo,
    stream: ByteStream,
}

impl Download {
    /// Pair a blob record with the stream of its bytes.
    pub fn new(photo: Photo, stream: ByteStream) -> Self {
        Self { photo, stream }
    }

    /// The blob record, available before any byte is read.
    pub fn photo(&self) -> &Photo {
        &self.photo
    }

    /// Split into record and stream.
    pub fn into_parts(self) -> (Photo, ByteStream) {
        (self.photo, self.stream)
    }

    /// Buffer the entire stream.
    ///
    /// Resolves once the stream ends; the first chunk error aborts the read.
    pub async fn read_to_end(self) -> DarkroomResult<(Photo, Bytes)> {
        let capacity = usize::try_from(self.photo.length).unwrap_or(0);
        let buffer = self
            .stream
            .try_fold(BytesMut::with_capacity(capacity), |mut buffer, chunk| async move {
                buffer.extend_from_slice(&chunk);
                Ok(buffer)
            })
            .await?;
        Ok((self.photo, buffer.freeze()))
    }
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("photo", &self.photo)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkroom_core::{PhotoId, PhotoMetadata};
    use darkroom_error::{StorageError, StorageErrorKind};
    use futures_util::stream;

    fn photo(length: u64) -> Photo {
        Photo {
            id: PhotoId::new(),
            filename: "a.png".to_string(),
            length,
            uploaded_at: chrono::Utc::now(),
            metadata: PhotoMetadata::for_variant("image/png"),
        }
    }

    #[tokio::test]
    async fn test_read_to_end_concatenates_chunks() {
        let chunks: Vec<DarkroomResult<Bytes>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"def")),
        ];
        let download = Download::new(photo(6), Box::pin(stream::iter(chunks)));
        let (_, bytes) = download.read_to_end().await.expect("stream succeeds");
        assert_eq!(&bytes[..], b"abcdef");
    }

    #[tokio::test]
    async fn test_read_to_end_surfaces_chunk_error() {
        let chunks: Vec<DarkroomResult<Bytes>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(StorageError::new(StorageErrorKind::FileRead("disk gone".into())).into()),
        ];
        let download = Download::new(photo(6), Box::pin(stream::iter(chunks)));
        assert!(download.read_to_end().await.is_err());
    }
}
