//! Accepting new originals.

use bytes::Bytes;
use darkroom_core::{NewPhotoBuilder, PhotoId};
use darkroom_error::{ConfigError, DarkroomResult, IngestError, IngestErrorKind};
use darkroom_interface::MetadataAccessor;
use darkroom_queue::BrokerChannel;
use std::sync::Arc;
use tracing::{info, instrument};

/// Content types accepted as originals.
pub const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// An upload as received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Encoded image bytes
    pub data: Bytes,
    /// Declared MIME type
    pub content_type: String,
    /// Owning business
    pub business_id: Option<String>,
    /// Optional caption
    pub caption: Option<String>,
    /// Client-side file name
    pub filename: Option<String>,
}

impl UploadRequest {
    /// Upload with no caption or file name.
    pub fn new(
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
        business_id: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
            business_id: Some(business_id.into()),
            caption: None,
            filename: None,
        }
    }

    /// Attach a caption.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Record a file name.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// Stores originals and queues them for derivation.
pub struct Ingestor {
    accessor: Arc<dyn MetadataAccessor>,
    queue: String,
}

impl Ingestor {
    /// Ingest into `accessor`, publishing ids on `queue`.
    pub fn new(accessor: Arc<dyn MetadataAccessor>, queue: impl Into<String>) -> Self {
        Self {
            accessor,
            queue: queue.into(),
        }
    }

    /// Work queue receiving new ids.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Check an upload without storing it.
    pub fn validate(request: &UploadRequest) -> DarkroomResult<()> {
        if !ACCEPTED_CONTENT_TYPES.contains(&request.content_type.as_str()) {
            return Err(IngestError::new(IngestErrorKind::UnsupportedContentType(
                request.content_type.clone(),
            ))
            .into());
        }
        match request.business_id.as_deref().map(str::trim) {
            Some(business_id) if !business_id.is_empty() => {}
            _ => return Err(IngestError::new(IngestErrorKind::MissingBusinessId).into()),
        }
        if request.data.is_empty() {
            return Err(IngestError::new(IngestErrorKind::Empty).into());
        }
        Ok(())
    }

    /// Store the original, then publish its id for derivation.
    ///
    /// The id is published only after the content is committed, so a
    /// worker never sees an id it cannot download.
    #[instrument(skip(self, channel, request), fields(content_type = %request.content_type, size = request.data.len(), queue = %self.queue))]
    pub async fn ingest<Ch>(&self, channel: &mut Ch, request: UploadRequest) -> DarkroomResult<PhotoId>
    where
        Ch: BrokerChannel + ?Sized,
    {
        Self::validate(&request)?;

        let photo = NewPhotoBuilder::default()
            .data(request.data)
            .content_type(request.content_type)
            .business_id(request.business_id.unwrap_or_default())
            .caption(request.caption)
            .filename(request.filename)
            .build()
            .map_err(|e| ConfigError::new(format!("Incomplete upload: {}", e)))?;

        let id = self.accessor.create(photo).await?;
        channel.declare_queue(&self.queue).await?;
        channel.publish(&self.queue, id.to_string().as_bytes()).await?;
        info!(photo_id = %id, "Queued photo for derivation");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_types() {
        let jpeg = UploadRequest::new(vec![1u8], "image/jpeg", "b-1");
        let png = UploadRequest::new(vec![1u8], "image/png", "b-1");
        let gif = UploadRequest::new(vec![1u8], "image/gif", "b-1");

        assert!(Ingestor::validate(&jpeg).is_ok());
        assert!(Ingestor::validate(&png).is_ok());
        assert!(Ingestor::validate(&gif).is_err());
    }

    #[test]
    fn test_validate_requires_business_id() {
        let mut request = UploadRequest::new(vec![1u8], "image/jpeg", "  ");
        assert!(Ingestor::validate(&request).is_err());
        request.business_id = None;
        assert!(Ingestor::validate(&request).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_upload() {
        let request = UploadRequest::new(Vec::<u8>::new(), "image/png", "b-1");
        assert!(Ingestor::validate(&request).is_err());
    }
}
