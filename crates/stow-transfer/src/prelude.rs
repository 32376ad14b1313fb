//! Convenience re-exports.

pub use crate::config::{CleanupPolicy, TransferConfig};
pub use crate::error::{TransferError, TransferResult, UploadFailure};
pub use crate::manifest::Manifest;
pub use crate::naming::{NameHint, UploadPrefix};
pub use crate::pipeline::{Pipeline, TransferReport};
pub use crate::reader::{ManifestReader, ReadStatus};
pub use crate::retry::RetryPolicy;
pub use crate::upload::UploadEngine;
pub use crate::verify::{DownloadVerifier, VerifyRequest};
pub use tokio_util::sync::CancellationToken;
