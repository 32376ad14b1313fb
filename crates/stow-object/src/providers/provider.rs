//! Client trait for creating authenticated object-store connections.

use std::future::Future;

use serde::de::DeserializeOwned;

use crate::types::Error;

/// Factory for connections to one bucket of an object-storage backend.
///
/// Implementations handle credential validation, bucket provisioning and
/// client construction for a specific backend.
pub trait Client: Sized + Send + Sync + 'static {
    /// Strongly-typed credentials for this provider.
    type Credentials: DeserializeOwned + Send + Sync;

    /// Unique identifier (e.g. "gateway", "local").
    const ID: &'static str;

    /// Create a client bound to the bucket named in `creds`.
    fn connect(creds: &Self::Credentials) -> impl Future<Output = Result<Self, Error>> + Send;

    /// Create the bucket named in `creds` if it does not exist yet.
    ///
    /// Must be idempotent: calling it for an existing bucket succeeds.
    fn ensure_bucket(creds: &Self::Credentials) -> impl Future<Output = Result<(), Error>> + Send;
}
