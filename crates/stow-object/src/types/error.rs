//! Minimal error type for object-store operations.

use std::fmt;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backend could not be reached or a client could not be built.
    Connection,
    /// The requested object or bucket does not exist.
    NotFound,
    /// The operation is not permitted by the credentials in use.
    Denied,
    /// Any other failure reported while the operation was running.
    Runtime,
}

/// A lightweight error carrying a message, a kind, an optional source, and a
/// retryable flag.
pub struct Error {
    message: String,
    kind: ErrorKind,
    source: Option<BoxedError>,
    retryable: bool,
}

impl Error {
    fn new(kind: ErrorKind, msg: impl fmt::Display, label: &str, retryable: bool) -> Self {
        Self {
            message: format!("[{label}] {msg}"),
            kind,
            source: None,
            retryable,
        }
    }

    /// Create a runtime error formatted as `[{label}] {msg}`.
    pub fn runtime(msg: impl fmt::Display, label: &str, retryable: bool) -> Self {
        Self::new(ErrorKind::Runtime, msg, label, retryable)
    }

    /// Create a connection error formatted as `[{label}] {msg}`.
    pub fn connection(msg: impl fmt::Display, label: &str, retryable: bool) -> Self {
        Self::new(ErrorKind::Connection, msg, label, retryable)
    }

    /// Create a non-retryable not-found error.
    pub fn not_found(msg: impl fmt::Display, label: &str) -> Self {
        Self::new(ErrorKind::NotFound, msg, label, false)
    }

    /// Create a non-retryable permission error.
    pub fn denied(msg: impl fmt::Display, label: &str) -> Self {
        Self::new(ErrorKind::Denied, msg, label, false)
    }

    /// Attach a source error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the caller should retry this operation.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("message", &self.message)
            .field("kind", &self.kind)
            .field("retryable", &self.retryable)
            .field("source", &self.source)
            .finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
