//! Metadata accessor over a content store.

use async_trait::async_trait;
use darkroom_core::{BlobUpload, ImageKind, NewPhoto, Photo, PhotoId, PhotoMetadata, VariantSize};
use darkroom_error::DarkroomResult;
use darkroom_interface::{ContentStore, MetadataAccessor};
use std::sync::Arc;

/// Typed metadata access for originals held in a [`ContentStore`].
///
/// Variant references are written as single-key updates, so concurrent
/// derivations of different sizes on the same original never overwrite each
/// other.
pub struct PhotoCatalog<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ContentStore + ?Sized> PhotoCatalog<S> {
    /// Wrap a content store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S: ?Sized> Clone for PhotoCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// File name recorded for an upload that did not name itself.
fn generated_filename(content_type: &str) -> String {
    let extension = ImageKind::from_content_type(content_type)
        .map(|kind| kind.extension())
        .unwrap_or("bin");
    format!("{}.{}", PhotoId::new().as_uuid().simple(), extension)
}

#[async_trait]
impl<S: ContentStore + ?Sized> MetadataAccessor for PhotoCatalog<S> {
    #[tracing::instrument(skip(self))]
    async fn fetch_by_id(&self, id: &str) -> DarkroomResult<Option<Photo>> {
        let Some(id) = PhotoId::parse(id) else {
            tracing::debug!("Rejected malformed photo id");
            return Ok(None);
        };
        self.store.find(&id).await
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_by_owner(&self, business_id: &str) -> DarkroomResult<Vec<Photo>> {
        self.store.find_by_owner(business_id).await
    }

    #[tracing::instrument(skip(self, photo), fields(business_id = %photo.business_id, size = photo.data.len()))]
    async fn create(&self, photo: NewPhoto) -> DarkroomResult<PhotoId> {
        let filename = photo
            .filename
            .unwrap_or_else(|| generated_filename(&photo.content_type));
        let upload = BlobUpload {
            filename,
            metadata: PhotoMetadata::for_upload(
                photo.content_type,
                photo.business_id,
                photo.caption,
            ),
        };

        let id = self.store.upload(upload, photo.data).await?;
        tracing::info!(photo_id = %id, backend = self.store.backend_name(), "Created photo");
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(original = %original, size = %size, variant = %variant))]
    async fn set_variant_reference(
        &self,
        original: &PhotoId,
        size: VariantSize,
        variant: &PhotoId,
    ) -> DarkroomResult<bool> {
        let found = self
            .store
            .set_metadata_field(original, size.key(), &variant.to_string())
            .await?;
        if !found {
            tracing::warn!("Original vanished before its variant was recorded");
        }
        Ok(found)
    }
}
