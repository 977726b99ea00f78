//! `image`-crate implementation of the codec boundary.

use darkroom_core::{EncodePolicy, ImageKind, ImageProbe};
use darkroom_error::{CodecError, CodecErrorKind, DarkroomResult};
use darkroom_interface::ImageCodec;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

/// Codec backed by the `image` crate.
///
/// Renditions are resized to the exact requested dimensions (no aspect
/// preservation) with a triangle filter, then encoded as baseline JPEG.
#[derive(Debug, Clone, Copy)]
pub struct RasterCodec {
    filter: FilterType,
}

impl RasterCodec {
    /// Codec with the default resize filter.
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }

    /// Use a different resize filter.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

impl Default for RasterCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn image_kind(format: ImageFormat) -> ImageKind {
    match format {
        ImageFormat::Jpeg => ImageKind::Jpeg,
        ImageFormat::Png => ImageKind::Png,
        ImageFormat::Gif => ImageKind::Gif,
        ImageFormat::WebP => ImageKind::WebP,
        _ => ImageKind::Other,
    }
}

impl ImageCodec for RasterCodec {
    type Decoded = DynamicImage;

    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    fn probe(&self, data: &[u8]) -> DarkroomResult<ImageProbe> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::new(CodecErrorKind::Probe(e.to_string())))?;

        let format = reader.format().ok_or_else(|| {
            CodecError::new(CodecErrorKind::Probe("unrecognised image format".to_string()))
        })?;

        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| CodecError::new(CodecErrorKind::Probe(e.to_string())))?;

        let probe = ImageProbe {
            width,
            height,
            kind: image_kind(format),
        };
        tracing::debug!(width, height, kind = %probe.kind, "Probed image");
        Ok(probe)
    }

    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    fn decode(&self, data: &[u8]) -> DarkroomResult<DynamicImage> {
        let image = image::load_from_memory(data)
            .map_err(|e| CodecError::new(CodecErrorKind::Decode(e.to_string())))?;
        Ok(image)
    }

    #[tracing::instrument(skip(self, image, policy), fields(quality = *policy.quality()))]
    fn render(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        policy: &EncodePolicy,
    ) -> DarkroomResult<Vec<u8>> {
        if width == 0 || height == 0 {
            return Err(CodecError::new(CodecErrorKind::InvalidDimensions(width, height)).into());
        }

        let resized = if image.width() == width && image.height() == height {
            image.clone()
        } else {
            image.resize_exact(width, height, self.filter)
        };

        let mut buffer = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, *policy.quality());
            let encoded = if *policy.greyscale() {
                encoder.encode_image(&resized.to_luma8())
            } else {
                encoder.encode_image(&resized.to_rgb8())
            };
            encoded.map_err(|e| CodecError::new(CodecErrorKind::Encode(e.to_string())))?;
        }

        Ok(buffer)
    }
}
