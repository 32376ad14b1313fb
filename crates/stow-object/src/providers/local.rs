//! Local-directory provider using [`object_store::local::LocalFileSystem`].
//!
//! Each bucket is a directory below `root`.

use std::path::PathBuf;

use derive_more::Deref;
use object_store::local::LocalFileSystem;
use serde::{Deserialize, Serialize};

use super::Client;
use crate::client::ObjectStoreClient;
use crate::types::Error;

/// Typed credentials for the local-directory provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCredentials {
    /// Directory holding one sub-directory per bucket.
    pub root: PathBuf,
    /// Destination bucket.
    pub bucket: String,
}

impl LocalCredentials {
    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }
}

/// Local-directory object storage client.
#[derive(Debug, Clone, Deref)]
pub struct LocalProvider(ObjectStoreClient);

impl LocalProvider {
    /// Consumes the provider, returning the underlying client.
    pub fn into_client(self) -> ObjectStoreClient {
        self.0
    }
}

impl Client for LocalProvider {
    type Credentials = LocalCredentials;

    const ID: &'static str = "local";

    async fn connect(creds: &Self::Credentials) -> Result<Self, Error> {
        let dir = creds.bucket_dir();
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(Error::not_found(
                format!("bucket directory {} does not exist", dir.display()),
                Self::ID,
            ));
        }

        let store = LocalFileSystem::new_with_prefix(&dir)
            .map_err(|e| Error::connection(e.to_string(), Self::ID, false).with_source(e))?;
        Ok(Self(ObjectStoreClient::new(store)))
    }

    async fn ensure_bucket(creds: &Self::Credentials) -> Result<(), Error> {
        tokio::fs::create_dir_all(creds.bucket_dir())
            .await
            .map_err(|e| Error::connection(e.to_string(), Self::ID, false).with_source(e))
    }
}
