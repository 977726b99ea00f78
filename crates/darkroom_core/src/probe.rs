//! Results of inspecting an encoded image without decoding it.

use serde::{Deserialize, Serialize};

/// Container format detected from an image's leading bytes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// JPEG / JFIF
    #[display("jpg")]
    Jpeg,
    /// PNG
    #[display("png")]
    Png,
    /// GIF
    #[display("gif")]
    Gif,
    /// WebP
    #[display("webp")]
    WebP,
    /// Recognised by the codec but not one of the above
    #[display("other")]
    Other,
}

impl ImageKind {
    /// Map an upload MIME type to a format, if it is one we name.
    ///
    /// # Examples
    ///
    /// ```
    /// use darkroom_core::ImageKind;
    ///
    /// assert_eq!(ImageKind::from_content_type("image/png"), Some(ImageKind::Png));
    /// assert_eq!(ImageKind::from_content_type("text/plain"), None);
    /// ```
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/gif" => Some(ImageKind::Gif),
            "image/webp" => Some(ImageKind::WebP),
            _ => None,
        }
    }

    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::WebP => "webp",
            ImageKind::Other => "bin",
        }
    }
}

/// Declared dimensions and format read from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageProbe {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected container format
    pub kind: ImageKind,
}

/// Fixed output policy applied to every rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct EncodePolicy {
    /// JPEG quality, 1-100
    quality: u8,
    /// Convert to greyscale before encoding
    greyscale: bool,
}

impl EncodePolicy {
    /// Create a policy, clamping quality into 1-100.
    pub fn new(quality: u8, greyscale: bool) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            greyscale,
        }
    }
}

impl Default for EncodePolicy {
    fn default() -> Self {
        Self::new(60, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_quality_60_greyscale() {
        let policy = EncodePolicy::default();
        assert_eq!(*policy.quality(), 60);
        assert!(*policy.greyscale());
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(*EncodePolicy::new(0, false).quality(), 1);
        assert_eq!(*EncodePolicy::new(250, false).quality(), 100);
    }

    #[test]
    fn test_jpeg_displays_as_jpg() {
        assert_eq!(ImageKind::Jpeg.to_string(), "jpg");
        assert_eq!(ImageKind::Jpeg.extension(), "jpg");
    }
}
