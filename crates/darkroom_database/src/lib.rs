//! PostgreSQL content store for Darkroom.
//!
//! This crate provides [`PostgresContentStore`], a diesel-backed
//! implementation of [`ContentStore`](darkroom_interface::ContentStore).
//!
//! # Features
//!
//! - Blob bytes in `bytea`, metadata document in `jsonb`
//! - Single-key metadata updates via `jsonb_set`
//! - r2d2 connection pool, every query on a blocking thread
//! - Embedded migrations applied on connect
//!
//! # Example
//!
//! ```rust,ignore
//! use darkroom_database::PostgresContentStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresContentStore::connect("postgres://localhost/darkroom", 4).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod models;
mod store;

/// Diesel table definitions.
#[allow(missing_docs)]
pub mod schema;

use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub use darkroom_error::{DatabaseError, DatabaseErrorKind};
pub use models::{BlobRecordRow, NewBlobRow};
pub use store::PostgresContentStore;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Schema migrations bundled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
