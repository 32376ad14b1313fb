#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for object-store client operations.
pub const TRACING_TARGET_CLIENT: &str = "stow_object::client";

/// Tracing target for provider connection and bucket management.
pub const TRACING_TARGET_PROVIDER: &str = "stow_object::provider";

pub mod client;
/// Provider trait and object storage provider factories.
pub mod providers;
mod remote;
/// Error type shared by every remote operation.
pub mod types;

#[doc(hidden)]
pub mod prelude;

pub use client::{GetOutput, ObjectStoreClient, PutOutput};
pub use remote::RemoteStore;
pub use types::{Error, ErrorKind};
