//! The Darkroom variant derivation worker.
//!
//! [`VariantDeriver`] turns an original's id into its five renditions:
//! a canonical greyscale JPEG re-encoding (`orig`) and square downscales at
//! 1024, 640, 256 and 128 pixels. It plugs into a
//! [`darkroom_queue::ConnectionSupervisor`] as its delivery handler.
//!
//! Alongside the worker live the two other entry points into the pipeline:
//! [`Ingestor`] accepts new originals and queues them, and
//! [`lookup_media`] serves stored renditions back.
//!
//! # Examples
//!
//! ```no_run
//! use darkroom_worker::WorkerConfig;
//!
//! let config = WorkerConfig::load(None)?;
//! println!("consuming {}", config.broker.queue);
//! # Ok::<(), darkroom_error::DarkroomError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod deriver;
mod ingest;
mod media;

pub use crate::config::{
    BrokerSettings, DerivationSettings, FailurePolicy, StorageBackend, StorageSettings,
    WorkerConfig,
};
pub use deriver::{DerivationReport, DerivationStage, VariantDeriver, VariantOutcome};
pub use ingest::{ACCEPTED_CONTENT_TYPES, Ingestor, UploadRequest};
pub use media::{MediaLookup, SIZE_UNAVAILABLE, lookup_media, parse_media_path};
