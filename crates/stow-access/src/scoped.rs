//! A bucket-bound store that enforces its grant's caveats.

use std::sync::Arc;

use bytes::Bytes;
use jiff::Timestamp;
use stow_object::{Error, ObjectStoreClient, PutOutput, RemoteStore};

use crate::grant::AccessGrant;
use crate::permission::Operation;

/// Wraps an [`ObjectStoreClient`] and checks every operation against the
/// grant's permissions, validity window and share prefixes before it is sent.
#[derive(Debug, Clone)]
pub struct ScopedStore {
    inner: ObjectStoreClient,
    grant: Arc<AccessGrant>,
    bucket: String,
}

impl ScopedStore {
    pub fn new(inner: ObjectStoreClient, grant: AccessGrant, bucket: impl Into<String>) -> Self {
        Self {
            inner,
            grant: Arc::new(grant),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn grant(&self) -> &AccessGrant {
        &self.grant
    }

    fn authorize(&self, operation: Operation, key: &str) -> Result<(), Error> {
        if self
            .grant
            .allows(operation, &self.bucket, key, Timestamp::now())
        {
            return Ok(());
        }
        Err(Error::denied(
            format!(
                "{operation} of '{key}' in bucket '{}' is not permitted by the access grant",
                self.bucket
            ),
            "scope",
        ))
    }
}

#[async_trait::async_trait]
impl RemoteStore for ScopedStore {
    async fn write_object(&self, key: &str, data: Bytes) -> Result<PutOutput, Error> {
        self.authorize(Operation::Upload, key)?;
        self.inner.write_object(key, data).await
    }

    async fn read_object(&self, key: &str) -> Result<Bytes, Error> {
        self.authorize(Operation::Download, key)?;
        self.inner.read_object(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        self.authorize(Operation::List, prefix)?;
        self.inner.list_keys(prefix).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), Error> {
        self.authorize(Operation::Delete, key)?;
        self.inner.delete_object(key).await
    }
}
