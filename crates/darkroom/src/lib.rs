//! Darkroom - photo ingestion and variant derivation.
//!
//! Uploaded originals are stored in a content store and their ids published
//! on a durable work queue. A worker consumes the queue and derives five
//! greyscale JPEG renditions per original (`orig`, 1024, 640, 256 and 128),
//! recording each one on the original's metadata document as it lands.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use darkroom::{
//!     ConnectionSupervisor, PhotoCatalog, RasterCodec, RedisConnector, ScratchDir,
//!     VariantDeriver, WorkerConfig, open_store,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkerConfig::load(None)?;
//!     let store = open_store(&config.storage).await?;
//!     let catalog = Arc::new(PhotoCatalog::new(Arc::clone(&store)));
//!     let deriver = VariantDeriver::new(
//!         store,
//!         catalog,
//!         RasterCodec::new(),
//!         ScratchDir::new(&config.derivation.scratch_dir)?,
//!     );
//!
//!     let connector = RedisConnector::new(config.redis_streams())?;
//!     let mut supervisor = ConnectionSupervisor::new(connector, config.supervisor()?);
//!     supervisor.run(&deriver, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await;
//!     Ok(())
//! }
//! ```
//!
//! # Cargo Features
//!
//! - `postgres` (default) - PostgreSQL content store backend
//!
//! # Architecture
//!
//! - `darkroom_error` - Error types
//! - `darkroom_core` - Photo ids, variant sizes, metadata documents
//! - `darkroom_interface` - Content store, metadata accessor and codec traits
//! - `darkroom_storage` - Filesystem and in-memory content stores
//! - `darkroom_database` - PostgreSQL content store
//! - `darkroom_codec` - Image decode, resize and JPEG encode
//! - `darkroom_queue` - Broker channels and the connection supervisor
//! - `darkroom_worker` - Derivation worker, ingestion, media lookup, config
//!
//! This crate (`darkroom`) re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod telemetry;

pub use backend::open_store;
pub use telemetry::init_tracing;

pub use darkroom_error::{
    CodecError, CodecErrorKind, ConfigError, DarkroomError, DarkroomErrorKind, DarkroomResult,
    IngestError, IngestErrorKind, QueueError, QueueErrorKind, StorageError, StorageErrorKind,
};

pub use darkroom_core::{
    BlobUpload, EncodePolicy, ImageKind, ImageProbe, NewPhoto, NewPhotoBuilder, Photo, PhotoId,
    PhotoLinks, PhotoMetadata, VARIANT_CONTENT_TYPE, VariantSize,
};

pub use darkroom_interface::{ByteStream, ContentStore, Download, ImageCodec, MetadataAccessor};

pub use darkroom_storage::{
    FileSystemContentStore, MemoryContentStore, PhotoCatalog, ScratchDir, ScratchFile,
};

#[cfg(feature = "postgres")]
pub use darkroom_database::PostgresContentStore;

pub use darkroom_codec::RasterCodec;

pub use darkroom_queue::{
    BrokerChannel, BrokerConnector, ConnectionSupervisor, Delivery, DeliveryHandler,
    HandlerOutcome, MemoryBroker, RedisConnector, RedisStreamsConfig, SupervisorConfig,
    SupervisorStats,
};

pub use darkroom_worker::{
    DerivationReport, DerivationStage, FailurePolicy, Ingestor, MediaLookup, SIZE_UNAVAILABLE,
    StorageBackend, UploadRequest, VariantDeriver, VariantOutcome, WorkerConfig, lookup_media,
    parse_media_path,
};
