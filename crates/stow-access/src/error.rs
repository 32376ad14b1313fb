//! Scope error types.
//!
//! Every variant is a configuration error: it is surfaced immediately and
//! never retried.

use jiff::Timestamp;

/// Result type for scope operations.
pub type ScopeResult<T, E = ScopeError> = Result<T, E>;

/// Errors raised while deriving, restricting or resolving an access scope.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors should be handled appropriately"]
pub enum ScopeError {
    /// Root credentials are missing or malformed.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The satellite address could not be parsed.
    #[error("invalid satellite address '{address}': {reason}")]
    InvalidSatellite { address: String, reason: String },

    /// The destination bucket name is unusable.
    #[error("invalid bucket name '{0}'")]
    InvalidBucket(String),

    /// A serialized scope could not be parsed or failed its integrity check.
    #[error("malformed serialized scope: {0}")]
    MalformedScope(String),

    /// A restriction's validity window ends before it starts.
    #[error("invalid validity window: not_before {not_before} is after not_after {not_after}")]
    InvalidWindow {
        not_before: Timestamp,
        not_after: Timestamp,
    },

    /// The satellite or bucket could not be reached or provisioned.
    #[error("bucket '{bucket}' is unreachable: {source}")]
    Unreachable {
        bucket: String,
        #[source]
        source: stow_object::Error,
    },

    /// Serialization of a grant failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScopeError {
    /// Creates a new invalid credentials error.
    pub fn invalid_credentials(msg: impl Into<String>) -> Self {
        Self::InvalidCredentials(msg.into())
    }

    /// Creates a new malformed scope error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedScope(msg.into())
    }
}
