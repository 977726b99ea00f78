//! Upload validation error types.

/// Reasons an upload is refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum IngestErrorKind {
    /// Only JPEG and PNG uploads are accepted
    #[display("Unsupported content type: {}", _0)]
    UnsupportedContentType(String),
    /// Every upload must name its owning business
    #[display("Missing business id")]
    MissingBusinessId,
    /// Upload had no bytes
    #[display("Empty upload")]
    Empty,
}

/// Ingest error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Ingest Error: {} at line {} in {}", kind, line, file)]
pub struct IngestError {
    /// The kind of error that occurred
    pub kind: IngestErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl IngestError {
    /// Create a new ingest error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: IngestErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
