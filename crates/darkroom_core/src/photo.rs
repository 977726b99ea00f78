//! Stored blob records and upload requests.

use crate::{PhotoId, PhotoMetadata, VariantSize};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A blob as recorded by the content store: an uploaded original or a
/// derived variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// Immutable blob id
    pub id: PhotoId,
    /// Name given at upload
    pub filename: String,
    /// Byte length of the stored content
    pub length: u64,
    /// When the upload committed
    pub uploaded_at: DateTime<Utc>,
    /// Attached metadata document
    pub metadata: PhotoMetadata,
}

impl Photo {
    /// MIME type of the stored bytes.
    pub fn content_type(&self) -> &str {
        &self.metadata.content_type
    }

    /// Public media paths for every variant this photo currently has.
    pub fn links(&self) -> PhotoLinks {
        let media = self
            .metadata
            .variants()
            .keys()
            .map(|size| (*size, format!("photos/media/images/{}-{}.jpg", self.id, size)))
            .collect();

        PhotoLinks {
            id: self.id,
            content_type: self.metadata.content_type.clone(),
            business_id: self.metadata.business_id.clone(),
            caption: self.metadata.caption.clone(),
            media,
        }
    }
}

/// Client-facing description of a photo and where its variants live.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use darkroom_core::{Photo, PhotoId, PhotoMetadata, VariantSize};
///
/// let id = PhotoId::new();
/// let mut metadata = PhotoMetadata::for_upload("image/jpeg", "b-1", None);
/// metadata.set_variant(VariantSize::Orig, id);
/// let photo = Photo { id, filename: "a.jpg".into(), length: 10, uploaded_at: Utc::now(), metadata };
///
/// let links = photo.links();
/// assert_eq!(links.media[&VariantSize::Orig], format!("photos/media/images/{}-orig.jpg", id));
/// assert!(!links.media.contains_key(&VariantSize::Edge128));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoLinks {
    /// Original's id
    #[serde(rename = "_id")]
    pub id: PhotoId,
    /// MIME type of the original
    pub content_type: String,
    /// Owning business
    pub business_id: Option<String>,
    /// Upload caption
    pub caption: Option<String>,
    /// Media path per available size
    #[serde(flatten)]
    pub media: BTreeMap<VariantSize, String>,
}

/// What the content store needs to write a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobUpload {
    /// Name recorded with the blob
    pub filename: String,
    /// Initial metadata document
    pub metadata: PhotoMetadata,
}

impl BlobUpload {
    /// Upload description for a derived variant of `original`.
    pub fn variant(original: &PhotoId, size: VariantSize) -> Self {
        Self {
            filename: size.file_name(original),
            metadata: PhotoMetadata::for_variant(crate::VARIANT_CONTENT_TYPE),
        }
    }
}

/// A new original handed to the metadata accessor.
///
/// # Examples
///
/// ```
/// use darkroom_core::NewPhotoBuilder;
///
/// let photo = NewPhotoBuilder::default()
///     .data(vec![0xFF, 0xD8, 0xFF])
///     .content_type("image/jpeg")
///     .business_id("b-7")
///     .build()
///     .unwrap();
/// assert!(photo.caption.is_none());
/// assert!(photo.filename.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, derive_builder::Builder)]
#[builder(setter(into))]
pub struct NewPhoto {
    /// Encoded image bytes
    pub data: Bytes,
    /// MIME type of `data`
    pub content_type: String,
    /// Owning business
    pub business_id: String,
    /// Optional caption
    #[builder(default)]
    pub caption: Option<String>,
    /// File name to record; generated when absent
    #[builder(default)]
    pub filename: Option<String>,
}
