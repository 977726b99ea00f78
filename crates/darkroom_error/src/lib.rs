//! Error types for the Darkroom pipeline.
//!
//! This crate provides the error types shared by every Darkroom crate.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use darkroom_error::{DarkroomResult, StorageError, StorageErrorKind};
//!
//! fn open_blob() -> DarkroomResult<Vec<u8>> {
//!     Err(StorageError::new(StorageErrorKind::NotFound("abc".to_string())))?
//! }
//!
//! match open_blob() {
//!     Ok(data) => println!("Got {} bytes", data.len()),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
#[cfg(feature = "database")]
mod database;
mod error;
mod ingest;
mod queue;
mod storage;

pub use codec::{CodecError, CodecErrorKind};
pub use config::ConfigError;
#[cfg(feature = "database")]
pub use database::{DatabaseError, DatabaseErrorKind};
pub use error::{DarkroomError, DarkroomErrorKind, DarkroomResult};
pub use ingest::{IngestError, IngestErrorKind};
pub use queue::{QueueError, QueueErrorKind};
pub use storage::{StorageError, StorageErrorKind};
