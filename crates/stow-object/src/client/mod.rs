//! Unified object-store client backed by [`object_store::ObjectStore`].
//!
//! [`ObjectStoreClient`] is a thin, cloneable wrapper around
//! `Arc<dyn ObjectStore>`. Writes follow an explicit open/write/commit
//! sequence so that an object only becomes visible once its commit succeeds.
//! Every public method is instrumented with [`tracing`].

use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{MultipartUpload, ObjectMeta, ObjectStore, PutPayload};

use crate::TRACING_TARGET_CLIENT;
use crate::types::Error;

mod get_output;
mod put_output;

pub use get_output::GetOutput;
pub use put_output::PutOutput;

/// Cloneable handle to any [`ObjectStore`] backend (S3 gateway, local, memory).
///
/// All methods accept human-readable string keys and convert them to
/// [`object_store::path::Path`] internally.
#[derive(Clone, Debug)]
pub struct ObjectStoreClient(pub Arc<dyn ObjectStore>);

impl ObjectStoreClient {
    /// Wrap a concrete [`ObjectStore`] implementation.
    pub fn new(store: impl ObjectStore) -> Self {
        Self(Arc::new(store))
    }

    /// Verify that the backing store is reachable.
    ///
    /// Issues a HEAD for a marker key; a not-found response is treated as
    /// success, any other error is propagated.
    #[tracing::instrument(name = "object.verify", skip(self))]
    pub async fn verify_reachable(&self) -> Result<(), Error> {
        let path = Path::from("_stow_reachable");
        match self.0.head(&path).await {
            Ok(_) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(from_object_store(e)),
        }
    }

    /// List object metadata under `prefix`.
    #[tracing::instrument(name = "object.list", skip(self), fields(prefix))]
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, Error> {
        let prefix = if prefix.is_empty() {
            None
        } else {
            Some(Path::from(prefix))
        };
        self.0
            .list(prefix.as_ref())
            .try_collect()
            .await
            .map_err(from_object_store)
    }

    /// Retrieve the raw bytes and metadata stored at `key`.
    #[tracing::instrument(name = "object.get", skip(self), fields(key))]
    pub async fn get(&self, key: &str) -> Result<GetOutput, Error> {
        let path = Path::from(key);
        let result = self.0.get(&path).await.map_err(from_object_store)?;
        let meta = result.meta.clone();
        let data = result.bytes().await.map_err(from_object_store)?;
        Ok(GetOutput { data, meta })
    }

    /// Open an upload handle for `key`, stream `data` into it and commit.
    ///
    /// A failure before the commit aborts the handle, so no object is left
    /// visible at `key`.
    #[tracing::instrument(name = "object.write", skip(self, data), fields(key, size = data.len()))]
    pub async fn write_object(&self, key: &str, data: Bytes) -> Result<PutOutput, Error> {
        let path = Path::from(key);
        let mut upload = self
            .0
            .put_multipart(&path)
            .await
            .map_err(from_object_store)?;

        if let Err(err) = upload.put_part(PutPayload::from(data)).await {
            abort_upload(upload.as_mut(), key).await;
            return Err(from_object_store(err));
        }

        match upload.complete().await {
            Ok(result) => Ok(result.into()),
            Err(err) => {
                abort_upload(upload.as_mut(), key).await;
                Err(from_object_store(err))
            }
        }
    }

    /// Delete the object at `key`.
    #[tracing::instrument(name = "object.delete", skip(self), fields(key))]
    pub async fn delete(&self, key: &str) -> Result<(), Error> {
        let path = Path::from(key);
        self.0.delete(&path).await.map_err(from_object_store)
    }
}

async fn abort_upload(upload: &mut dyn MultipartUpload, key: &str) {
    if let Err(err) = upload.abort().await {
        tracing::warn!(
            target: TRACING_TARGET_CLIENT,
            key,
            error = %err,
            "failed to abort uncommitted upload"
        );
    }
}

/// Convert an [`object_store::Error`] into a crate [`Error`].
pub(crate) fn from_object_store(err: object_store::Error) -> Error {
    const LABEL: &str = "object-store";
    match err {
        object_store::Error::NotFound { .. } => {
            Error::not_found(err.to_string(), LABEL).with_source(err)
        }
        object_store::Error::PermissionDenied { .. }
        | object_store::Error::Unauthenticated { .. } => {
            Error::denied(err.to_string(), LABEL).with_source(err)
        }
        object_store::Error::AlreadyExists { .. } | object_store::Error::Precondition { .. } => {
            Error::runtime(err.to_string(), LABEL, false).with_source(err)
        }
        _ => Error::runtime(err.to_string(), LABEL, true).with_source(err),
    }
}
