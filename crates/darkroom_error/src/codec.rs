//! Image codec error types.

/// Kinds of codec failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum CodecErrorKind {
    /// Header could not be read to determine format and dimensions
    #[display("Failed to probe image: {}", _0)]
    Probe(String),
    /// Pixel data could not be decoded
    #[display("Failed to decode image: {}", _0)]
    Decode(String),
    /// Resized image could not be encoded
    #[display("Failed to encode image: {}", _0)]
    Encode(String),
    /// Requested dimensions are unusable
    #[display("Invalid dimensions {}x{}", _0, _1)]
    InvalidDimensions(u32, u32),
    /// Codec worker thread failed
    #[display("Codec task failed: {}", _0)]
    Task(String),
}

/// Codec error with location tracking.
///
/// # Examples
///
/// ```
/// use darkroom_error::{CodecError, CodecErrorKind};
///
/// let err = CodecError::new(CodecErrorKind::InvalidDimensions(0, 128));
/// assert!(format!("{}", err).contains("0x128"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Codec Error: {} at line {} in {}", kind, line, file)]
pub struct CodecError {
    /// The kind of error that occurred
    pub kind: CodecErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CodecError {
    /// Create a new codec error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CodecErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
