#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for manifest reading.
pub const TRACING_TARGET_READER: &str = "stow_transfer::reader";

/// Tracing target for chunk uploads and retries.
pub const TRACING_TARGET_UPLOAD: &str = "stow_transfer::upload";

/// Tracing target for download verification.
pub const TRACING_TARGET_VERIFY: &str = "stow_transfer::verify";

/// Tracing target for the per-file pipeline.
pub const TRACING_TARGET_PIPELINE: &str = "stow_transfer::pipeline";

/// Chunk size used when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Attempts per remote operation when none is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

mod config;
mod error;
mod manifest;
mod naming;
mod pipeline;
mod reader;
mod retry;
mod upload;
mod verify;

#[doc(hidden)]
pub mod prelude;

pub use config::{CleanupPolicy, TransferConfig};
pub use error::{TransferError, TransferResult, UploadFailure};
pub use manifest::Manifest;
pub use naming::{NameHint, UploadPrefix};
pub use pipeline::{FileTransfer, Pipeline, TransferReport, VerifyOutcome};
pub use reader::{ManifestReader, ReadStatus, TransferCursor};
pub use retry::RetryPolicy;
pub use tokio_util::sync::CancellationToken;
pub use upload::{UploadEngine, UploadReport};
pub use verify::{DownloadVerifier, VerifyReport, VerifyRequest};
