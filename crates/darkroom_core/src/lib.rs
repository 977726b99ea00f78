//! Core data types for the Darkroom photo variant pipeline.
//!
//! This crate provides the vocabulary shared by the content store, the
//! metadata accessor, the codec and the derivation worker: photo ids, the
//! fixed set of variant sizes, the metadata document attached to every
//! original, and image probe results.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod id;
mod metadata;
mod photo;
mod probe;
mod variant;

pub use id::PhotoId;
pub use metadata::PhotoMetadata;
pub use photo::{BlobUpload, NewPhoto, NewPhotoBuilder, NewPhotoBuilderError, Photo, PhotoLinks};
pub use probe::{EncodePolicy, ImageKind, ImageProbe};
pub use variant::VariantSize;

/// Content type every derived variant is encoded as.
pub const VARIANT_CONTENT_TYPE: &str = "image/jpeg";
