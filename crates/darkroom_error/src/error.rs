//! Top-level error wrapper types.

use crate::{CodecError, ConfigError, IngestError, QueueError, StorageError};
#[cfg(feature = "database")]
use crate::DatabaseError;

/// Every failure the pipeline can report, grouped by concern.
///
/// # Examples
///
/// ```
/// use darkroom_error::{DarkroomError, QueueError, QueueErrorKind};
///
/// let queue_err = QueueError::new(QueueErrorKind::Closed("broker went away".to_string()));
/// let err: DarkroomError = queue_err.into();
/// assert!(format!("{}", err).contains("Queue Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum DarkroomErrorKind {
    /// Content store error
    #[from(StorageError)]
    Storage(StorageError),
    /// Database error
    #[cfg(feature = "database")]
    #[from(DatabaseError)]
    Database(DatabaseError),
    /// Work queue / broker error
    #[from(QueueError)]
    Queue(QueueError),
    /// Image codec error
    #[from(CodecError)]
    Codec(CodecError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Upload rejected or failed
    #[from(IngestError)]
    Ingest(IngestError),
}

/// Darkroom error with kind discrimination.
///
/// # Examples
///
/// ```
/// use darkroom_error::{ConfigError, DarkroomErrorKind, DarkroomResult};
///
/// fn might_fail() -> DarkroomResult<()> {
///     Err(ConfigError::new("Missing broker url"))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert!(matches!(err.kind(), DarkroomErrorKind::Config(_)));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Darkroom Error: {}", _0)]
pub struct DarkroomError(Box<DarkroomErrorKind>);

impl DarkroomError {
    /// Create a new error from a kind.
    pub fn new(kind: DarkroomErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &DarkroomErrorKind {
        &self.0
    }

    /// Whether this error reports a blob or record that does not exist.
    ///
    /// The content store distinguishes "missing" from every other I/O failure;
    /// callers use this to tell an unknown id apart from an outage.
    pub fn is_not_found(&self) -> bool {
        match self.kind() {
            DarkroomErrorKind::Storage(e) => {
                matches!(e.kind, crate::StorageErrorKind::NotFound(_))
            }
            #[cfg(feature = "database")]
            DarkroomErrorKind::Database(e) => {
                matches!(e.kind, crate::DatabaseErrorKind::NotFound)
            }
            _ => false,
        }
    }
}

// Generic From implementation for any type that converts to DarkroomErrorKind
impl<T> From<T> for DarkroomError
where
    T: Into<DarkroomErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Darkroom operations.
pub type DarkroomResult<T> = std::result::Result<T, DarkroomError>;
