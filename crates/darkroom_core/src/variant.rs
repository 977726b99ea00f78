//! The fixed set of derived renditions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One of the five renditions recorded on an original's metadata document.
///
/// `Orig` is the canonical full-size re-encoding; the others are square
/// downscales with the given edge length. The metadata key of each size is
/// its string form (`"orig"`, `"128"`, ...).
///
/// # Examples
///
/// ```
/// use darkroom_core::VariantSize;
///
/// assert_eq!(VariantSize::Edge640.key(), "640");
/// assert_eq!(VariantSize::Edge640.edge(), Some(640));
/// assert_eq!(VariantSize::Orig.edge(), None);
/// assert_eq!("1024".parse::<VariantSize>(), Ok(VariantSize::Edge1024));
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
pub enum VariantSize {
    /// Canonical re-encoding at the original dimensions
    #[serde(rename = "orig")]
    #[display("orig")]
    Orig,
    /// 128×128 square
    #[serde(rename = "128")]
    #[display("128")]
    Edge128,
    /// 256×256 square
    #[serde(rename = "256")]
    #[display("256")]
    Edge256,
    /// 640×640 square
    #[serde(rename = "640")]
    #[display("640")]
    Edge640,
    /// 1024×1024 square
    #[serde(rename = "1024")]
    #[display("1024")]
    Edge1024,
}

impl VariantSize {
    /// Square sizes in the order the worker derives them, largest first.
    pub const DOWNSCALES: [VariantSize; 4] = [
        VariantSize::Edge1024,
        VariantSize::Edge640,
        VariantSize::Edge256,
        VariantSize::Edge128,
    ];

    /// Metadata document key for this size.
    pub fn key(&self) -> &'static str {
        match self {
            VariantSize::Orig => "orig",
            VariantSize::Edge128 => "128",
            VariantSize::Edge256 => "256",
            VariantSize::Edge640 => "640",
            VariantSize::Edge1024 => "1024",
        }
    }

    /// Target edge length, or `None` for the full-size rendition.
    pub fn edge(&self) -> Option<u32> {
        match self {
            VariantSize::Orig => None,
            VariantSize::Edge128 => Some(128),
            VariantSize::Edge256 => Some(256),
            VariantSize::Edge640 => Some(640),
            VariantSize::Edge1024 => Some(1024),
        }
    }

    /// Whether a rendition of this size is a genuine downscale of an image
    /// with the given dimensions.
    ///
    /// Both sides must strictly exceed the edge length; anything else would be
    /// an upscale and is never offered. `Orig` always qualifies.
    ///
    /// # Examples
    ///
    /// ```
    /// use darkroom_core::VariantSize;
    ///
    /// assert!(VariantSize::Edge128.fits_within(129, 2000));
    /// assert!(!VariantSize::Edge128.fits_within(128, 2000));
    /// assert!(VariantSize::Orig.fits_within(1, 1));
    /// ```
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        match self.edge() {
            Some(edge) => width > edge && height > edge,
            None => true,
        }
    }

    /// File name used for the scratch copy and the stored variant blob.
    pub fn file_name(&self, original: &crate::PhotoId) -> String {
        format!("{}_{}.jpg", original, self.key())
    }
}

impl FromStr for VariantSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orig" => Ok(VariantSize::Orig),
            "128" => Ok(VariantSize::Edge128),
            "256" => Ok(VariantSize::Edge256),
            "640" => Ok(VariantSize::Edge640),
            "1024" => Ok(VariantSize::Edge1024),
            _ => Err(format!("Unknown variant size: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_keys_round_trip_through_from_str() {
        for size in VariantSize::iter() {
            assert_eq!(size.key().parse::<VariantSize>(), Ok(size));
            assert_eq!(size.to_string(), size.key());
        }
    }

    #[test]
    fn test_downscales_exclude_orig_and_descend() {
        assert!(!VariantSize::DOWNSCALES.contains(&VariantSize::Orig));
        let edges: Vec<u32> = VariantSize::DOWNSCALES
            .iter()
            .filter_map(|s| s.edge())
            .collect();
        assert_eq!(edges, vec![1024, 640, 256, 128]);
    }

    #[test]
    fn test_fits_within_requires_both_sides() {
        assert!(VariantSize::Edge256.fits_within(300, 300));
        assert!(!VariantSize::Edge256.fits_within(300, 256));
        assert!(!VariantSize::Edge256.fits_within(100, 4000));
    }

    #[test]
    fn test_file_name_uses_original_id() {
        let id = crate::PhotoId::new();
        assert_eq!(
            VariantSize::Edge640.file_name(&id),
            format!("{}_640.jpg", id)
        );
    }
}
