//! Resolving `photos/media/images/{id}-{size}.jpg` to stored bytes.

use darkroom_core::{PhotoId, VariantSize};
use darkroom_error::DarkroomResult;
use darkroom_interface::{ContentStore, Download, MetadataAccessor};
use tracing::{debug, instrument};

/// Message returned when an original exists but lacks the requested size.
pub const SIZE_UNAVAILABLE: &str = "Image size not available to download";

/// Result of a media lookup.
#[derive(Debug)]
pub enum MediaLookup {
    /// No original with that id
    NotFound,
    /// The original has no rendition at that size
    SizeUnavailable,
    /// The rendition, ready to stream
    Found(Download),
}

/// Split a media file name into its photo id and size.
///
/// # Examples
///
/// ```
/// use darkroom_core::VariantSize;
/// use darkroom_worker::parse_media_path;
///
/// let id = "0b3c8e5e-8a4e-4f9a-9d1f-2f6a5c7b8d90";
/// let name = format!("{}-640.jpg", id);
/// let (parsed, size) = parse_media_path(&name).unwrap();
/// assert_eq!(parsed, id);
/// assert_eq!(size, VariantSize::Edge640);
/// assert!(parse_media_path("nonsense").is_none());
/// ```
pub fn parse_media_path(name: &str) -> Option<(&str, VariantSize)> {
    let stem = name.strip_suffix(".jpg")?;
    let (id, size) = stem.rsplit_once('-')?;
    let size = size.parse::<VariantSize>().ok()?;
    Some((id, size))
}

/// Find the rendition of photo `id` at `size`.
#[instrument(skip(accessor, store))]
pub async fn lookup_media(
    accessor: &dyn MetadataAccessor,
    store: &dyn ContentStore,
    id: &str,
    size: VariantSize,
) -> DarkroomResult<MediaLookup> {
    let Some(photo) = accessor.fetch_by_id(id).await? else {
        return Ok(MediaLookup::NotFound);
    };
    let Some(variant) = photo.metadata.variant(size) else {
        debug!(photo_id = %photo.id, "Size not derived");
        return Ok(MediaLookup::SizeUnavailable);
    };
    open_variant(store, &variant).await
}

async fn open_variant(store: &dyn ContentStore, variant: &PhotoId) -> DarkroomResult<MediaLookup> {
    match store.open_download(variant).await {
        Ok(download) => Ok(MediaLookup::Found(download)),
        Err(e) if e.is_not_found() => {
            debug!(variant_id = %variant, "Referenced variant is missing");
            Ok(MediaLookup::SizeUnavailable)
        }
        Err(e) => Err(e),
    }
}
