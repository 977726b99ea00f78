//! Content stores for Darkroom.
//!
//! This crate provides the blob backends the worker and CLI run against,
//! plus the metadata accessor layered over any of them.
//!
//! # Features
//!
//! - **Filesystem store**: blobs in a two-level sharded tree, metadata in a
//!   JSON sidecar, atomic temp-file + rename writes
//! - **Memory store**: same semantics, held in process, for tests and dry runs
//! - **Catalog**: [`PhotoCatalog`] implements the metadata accessor over any
//!   [`ContentStore`](darkroom_interface::ContentStore)
//! - **Scratch files**: [`ScratchDir`] holds renditions between encode and upload
//!
//! # Example
//!
//! ```rust
//! use darkroom_core::{NewPhotoBuilder, VariantSize};
//! use darkroom_interface::MetadataAccessor;
//! use darkroom_storage::{MemoryContentStore, PhotoCatalog};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = PhotoCatalog::new(Arc::new(MemoryContentStore::new()));
//! let id = catalog
//!     .create(
//!         NewPhotoBuilder::default()
//!             .data(vec![0u8; 16])
//!             .content_type("image/png")
//!             .business_id("b-1")
//!             .build()?,
//!     )
//!     .await?;
//!
//! assert!(catalog.set_variant_reference(&id, VariantSize::Orig, &id).await?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod filesystem;
mod memory;
mod record;
mod scratch;

pub use catalog::PhotoCatalog;
pub use darkroom_error::{StorageError, StorageErrorKind};
pub use filesystem::FileSystemContentStore;
pub use memory::MemoryContentStore;
pub use record::StoredRecord;
pub use scratch::{ScratchDir, ScratchFile};

/// Chunk size used when streaming blob content.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
