//! Transfer tuning.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};
use stow_transfer::{CleanupPolicy, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ATTEMPTS, TransferConfig};

use crate::TRACING_TARGET_CONFIG;

/// Chunking, retry and cleanup settings.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct TransferArgs {
    /// Maximum bytes per uploaded object.
    #[arg(long, env = "STOW_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Attempts per chunk before the transfer fails.
    #[arg(long, env = "STOW_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Pause between attempts, in milliseconds.
    #[arg(long, env = "STOW_RETRY_DELAY_MS", default_value_t = 0)]
    pub retry_delay_ms: u64,

    /// Delete the objects of a file whose upload fails part-way.
    #[arg(long, env = "STOW_CLEANUP_ON_FAILURE")]
    #[serde(default)]
    pub cleanup_on_failure: bool,

    /// Delete each backup file once it has been uploaded.
    #[arg(long, env = "STOW_DELETE_SOURCES")]
    #[serde(default)]
    pub delete_sources: bool,

    /// Directory verified downloads are written to.
    #[arg(long, env = "STOW_DEBUG_ROOT", default_value = "./debug")]
    pub debug_root: PathBuf,
}

impl TransferArgs {
    pub fn validate(&self, verify: bool) -> anyhow::Result<()> {
        self.to_config(verify).validate()?;
        Ok(())
    }

    pub fn to_config(&self, verify: bool) -> TransferConfig {
        let cleanup = if self.cleanup_on_failure {
            CleanupPolicy::DeleteCommitted
        } else {
            CleanupPolicy::Retain
        };

        let mut config = TransferConfig::default()
            .with_chunk_size(self.chunk_size)
            .with_retry(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
            .with_cleanup(cleanup)
            .with_delete_sources(self.delete_sources);
        config.verify = verify;
        config.debug_root = self.debug_root.clone();
        config
    }

    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            chunk_size = self.chunk_size,
            max_attempts = self.max_attempts,
            retry_delay_ms = self.retry_delay_ms,
            cleanup_on_failure = self.cleanup_on_failure,
            delete_sources = self.delete_sources,
            debug_root = %self.debug_root.display(),
            "Transfer configuration"
        );
    }
}
