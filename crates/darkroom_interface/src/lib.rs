//! Trait definitions for the Darkroom pipeline.
//!
//! The derivation worker only ever talks to its collaborators through the
//! traits in this crate: a streaming [`ContentStore`], the
//! [`MetadataAccessor`] layered over it, and an [`ImageCodec`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod download;
mod traits;

pub use codec::ImageCodec;
pub use download::{ByteStream, Download};
pub use traits::{ContentStore, MetadataAccessor};
