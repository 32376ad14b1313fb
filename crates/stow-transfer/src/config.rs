//! Transfer configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_CHUNK_SIZE;
use crate::error::{TransferError, TransferResult};
use crate::retry::RetryPolicy;

/// What happens to objects committed by an upload that later fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Leave them in the store and report their names.
    #[default]
    Retain,
    /// Delete them, best-effort.
    DeleteCommitted,
}

/// Settings shared by the upload engine, the verifier and the pipeline.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Maximum bytes per remote object.
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    pub cleanup: CleanupPolicy,
    /// Delete each source file after its upload succeeds.
    pub delete_sources: bool,
    /// Read every uploaded group back after the upload.
    pub verify: bool,
    /// Directory verified files are written under.
    pub debug_root: PathBuf,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            cleanup: CleanupPolicy::default(),
            delete_sources: false,
            verify: false,
            debug_root: PathBuf::from("debug"),
        }
    }
}

impl TransferConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.retry = RetryPolicy::new(max_attempts, delay);
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_delete_sources(mut self, delete_sources: bool) -> Self {
        self.delete_sources = delete_sources;
        self
    }

    pub fn with_verify(mut self, debug_root: impl Into<PathBuf>) -> Self {
        self.verify = true;
        self.debug_root = debug_root.into();
        self
    }

    pub fn validate(&self) -> TransferResult<()> {
        if self.chunk_size == 0 {
            return Err(TransferError::InvalidConfig(
                "chunk size must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(TransferError::InvalidConfig(
                "at least one attempt is required".into(),
            ));
        }
        Ok(())
    }
}
