//! Storage-side traits.

use crate::Download;
use async_trait::async_trait;
use bytes::Bytes;
use darkroom_core::{BlobUpload, NewPhoto, Photo, PhotoId, VariantSize};
use darkroom_error::DarkroomResult;
use std::sync::Arc;

/// Blob storage with an attached mutable metadata document per blob.
///
/// Implementations must report a missing blob as
/// [`darkroom_error::StorageErrorKind::NotFound`] (or the database
/// equivalent) so callers can tell it apart from an outage; every other I/O
/// failure is opaque.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Open a streaming read of the blob with the given id.
    async fn open_download(&self, id: &PhotoId) -> DarkroomResult<Download>;

    /// Store a new blob.
    ///
    /// Resolves with the new id only after the data is fully written.
    async fn upload(&self, upload: BlobUpload, data: Bytes) -> DarkroomResult<PhotoId>;

    /// Look up a blob record without opening its content.
    async fn find(&self, id: &PhotoId) -> DarkroomResult<Option<Photo>>;

    /// All blobs whose metadata names the given business.
    async fn find_by_owner(&self, business_id: &str) -> DarkroomResult<Vec<Photo>>;

    /// Set one top-level key of a blob's metadata document.
    ///
    /// Only the named key is written; concurrent updates of other keys on
    /// the same blob are never lost. Returns whether the blob exists.
    async fn set_metadata_field(
        &self,
        id: &PhotoId,
        key: &str,
        value: &str,
    ) -> DarkroomResult<bool>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<T: ContentStore + ?Sized> ContentStore for Arc<T> {
    async fn open_download(&self, id: &PhotoId) -> DarkroomResult<Download> {
        (**self).open_download(id).await
    }

    async fn upload(&self, upload: BlobUpload, data: Bytes) -> DarkroomResult<PhotoId> {
        (**self).upload(upload, data).await
    }

    async fn find(&self, id: &PhotoId) -> DarkroomResult<Option<Photo>> {
        (**self).find(id).await
    }

    async fn find_by_owner(&self, business_id: &str) -> DarkroomResult<Vec<Photo>> {
        (**self).find_by_owner(business_id).await
    }

    async fn set_metadata_field(
        &self,
        id: &PhotoId,
        key: &str,
        value: &str,
    ) -> DarkroomResult<bool> {
        (**self).set_metadata_field(id, key, value).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Typed access to the metadata documents of originals.
#[async_trait]
pub trait MetadataAccessor: Send + Sync {
    /// Fetch an original by its textual id.
    ///
    /// A syntactically invalid id yields `Ok(None)`, not an error.
    async fn fetch_by_id(&self, id: &str) -> DarkroomResult<Option<Photo>>;

    /// All originals owned by a business.
    async fn fetch_by_owner(&self, business_id: &str) -> DarkroomResult<Vec<Photo>>;

    /// Store a new original; resolves after the content is durably committed.
    async fn create(&self, photo: NewPhoto) -> DarkroomResult<PhotoId>;

    /// Record `variant` as the rendition of `original` at `size`.
    ///
    /// Sets that one key only. Returns whether the original was found.
    async fn set_variant_reference(
        &self,
        original: &PhotoId,
        size: VariantSize,
        variant: &PhotoId,
    ) -> DarkroomResult<bool>;
}

#[async_trait]
impl<T: MetadataAccessor + ?Sized> MetadataAccessor for Arc<T> {
    async fn fetch_by_id(&self, id: &str) -> DarkroomResult<Option<Photo>> {
        (**self).fetch_by_id(id).await
    }

    async fn fetch_by_owner(&self, business_id: &str) -> DarkroomResult<Vec<Photo>> {
        (**self).fetch_by_owner(business_id).await
    }

    async fn create(&self, photo: NewPhoto) -> DarkroomResult<PhotoId> {
        (**self).create(photo).await
    }

    async fn set_variant_reference(
        &self,
        original: &PhotoId,
        size: VariantSize,
        variant: &PhotoId,
    ) -> DarkroomResult<bool> {
        (**self).set_variant_reference(original, size, variant).await
    }
}
