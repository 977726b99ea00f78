//! Work queue error types.

/// Kinds of broker failures.
///
/// Each one is a connection fault: the supervisor tears the channel down
/// and reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum QueueErrorKind {
    /// Could not reach the broker
    #[display("Broker connection failed: {}", _0)]
    Connection(String),
    /// The connection or channel was closed
    #[display("Broker channel closed: {}", _0)]
    Closed(String),
    /// A broker command failed at the transport level
    #[display("Broker command failed: {}", _0)]
    Command(String),
    /// The broker did not answer a heartbeat
    #[display("Broker heartbeat failed: {}", _0)]
    Heartbeat(String),
}

/// Queue error with location tracking.
///
/// # Examples
///
/// ```
/// use darkroom_error::{QueueError, QueueErrorKind};
///
/// let err = QueueError::new(QueueErrorKind::Heartbeat("timed out".to_string()));
/// assert!(format!("{}", err).contains("heartbeat"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Queue Error: {} at line {} in {}", kind, line, file)]
pub struct QueueError {
    /// The kind of error that occurred
    pub kind: QueueErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl QueueError {
    /// Create a new queue error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: QueueErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
