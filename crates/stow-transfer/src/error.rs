//! Transfer error types.

use std::path::PathBuf;

/// Result type for transfer operations.
pub type TransferResult<T, E = TransferError> = Result<T, E>;

/// Fatal conditions that abort a transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// A local file or directory could not be read or written.
    #[error("local i/o on '{}' failed", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A transient remote failure persisted for every allowed attempt.
    #[error("{operation} of '{key}' failed after {attempts} attempt(s)")]
    RetriesExhausted {
        operation: &'static str,
        key: String,
        attempts: u32,
        #[source]
        source: stow_object::Error,
    },

    /// A remote failure that retrying cannot fix.
    #[error("{operation} of '{key}' failed")]
    Remote {
        operation: &'static str,
        key: String,
        #[source]
        source: stow_object::Error,
    },

    /// The cancellation token fired.
    #[error("transfer cancelled")]
    Cancelled,

    #[error("invalid transfer configuration: {0}")]
    InvalidConfig(String),

    /// The source name hint cannot produce object names.
    #[error("invalid source name hint '{0}'")]
    InvalidHint(String),

    /// Two manifest files would be stored under the same object group.
    #[error("'{first}' and '{second}' both map to object group '{group}'")]
    DuplicateGroup {
        group: String,
        first: String,
        second: String,
    },

    /// Downloaded objects do not reassemble into the expected file.
    #[error("verification of '{group}' failed: {reason}")]
    Verification { group: String, reason: String },
}

impl TransferError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn verification(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Verification {
            group: group.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A failed upload together with what it left behind in the store.
#[derive(Debug, thiserror::Error)]
#[error("{error} ({} object(s) left committed)", committed.len())]
pub struct UploadFailure {
    /// Objects committed before the failure that are still in the store.
    pub committed: Vec<String>,
    /// Objects removed again under [`CleanupPolicy::DeleteCommitted`](crate::CleanupPolicy::DeleteCommitted).
    pub removed: Vec<String>,
    #[source]
    pub error: TransferError,
}

impl UploadFailure {
    pub fn new(error: TransferError) -> Self {
        Self {
            committed: Vec::new(),
            removed: Vec::new(),
            error,
        }
    }

    /// Prepends names committed by earlier, successful uploads.
    pub(crate) fn after(mut self, earlier: Vec<String>) -> Self {
        let mut committed = earlier;
        committed.append(&mut self.committed);
        self.committed = committed;
        self
    }
}

impl From<TransferError> for UploadFailure {
    fn from(error: TransferError) -> Self {
        Self::new(error)
    }
}
