//! Postgres metadata store error types.

/// Ways the Postgres store can fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum DatabaseErrorKind {
    /// Pool could not hand out a connection
    #[display("Postgres connection failed: {}", _0)]
    Connection(String),
    /// Statement failed to execute
    #[display("Postgres statement failed: {}", _0)]
    Query(String),
    /// Embedded migrations did not apply
    #[display("Schema migration failed: {}", _0)]
    Migration(String),
    /// No row for the requested id
    #[display("Photo row not found")]
    NotFound,
}

/// Postgres store error, tagged with where it was raised.
///
/// ```
/// use darkroom_error::{DatabaseError, DatabaseErrorKind};
///
/// let err = DatabaseError::new(DatabaseErrorKind::NotFound);
/// assert!(err.to_string().contains("not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Database Error: {} at line {} in {}", kind, line, file)]
pub struct DatabaseError {
    /// What went wrong
    pub kind: DatabaseErrorKind,
    /// Line the error was raised on
    pub line: u32,
    /// Source file the error was raised in
    pub file: &'static str,
}

impl DatabaseError {
    /// Wrap `kind` with the caller's location.
    #[track_caller]
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl From<diesel::result::Error> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        let kind = match err {
            diesel::result::Error::NotFound => DatabaseErrorKind::NotFound,
            other => DatabaseErrorKind::Query(other.to_string()),
        };
        DatabaseError::new(kind)
    }
}

impl From<diesel::ConnectionError> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        DatabaseError::new(DatabaseErrorKind::Connection(err.to_string()))
    }
}
