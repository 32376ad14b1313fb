//! The remote-store seam the transfer pipeline is written against.

use bytes::Bytes;

use crate::client::{ObjectStoreClient, PutOutput};
use crate::types::Error;

/// Minimal set of remote operations needed to move chunks in and out of a
/// bucket.
///
/// `write_object` must follow open/write/commit semantics: when it returns an
/// error no object may be visible at `key`.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open an object at `key`, stream `data` into it and commit it.
    async fn write_object(&self, key: &str, data: Bytes) -> Result<PutOutput, Error>;

    /// Read the full contents of the object at `key`.
    async fn read_object(&self, key: &str) -> Result<Bytes, Error>;

    /// List the keys of all objects under `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, Error>;

    /// Delete the object at `key`.
    async fn delete_object(&self, key: &str) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl RemoteStore for ObjectStoreClient {
    async fn write_object(&self, key: &str, data: Bytes) -> Result<PutOutput, Error> {
        ObjectStoreClient::write_object(self, key, data).await
    }

    async fn read_object(&self, key: &str) -> Result<Bytes, Error> {
        Ok(self.get(key).await?.data)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let items = self.list(prefix).await?;
        Ok(items
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect())
    }

    async fn delete_object(&self, key: &str) -> Result<(), Error> {
        self.delete(key).await
    }
}

#[async_trait::async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<T> {
    async fn write_object(&self, key: &str, data: Bytes) -> Result<PutOutput, Error> {
        (**self).write_object(key, data).await
    }

    async fn read_object(&self, key: &str) -> Result<Bytes, Error> {
        (**self).read_object(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, Error> {
        (**self).list_keys(prefix).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), Error> {
        (**self).delete_object(key).await
    }
}
