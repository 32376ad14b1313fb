//! Chunked upload engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use stow_object::RemoteStore;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::TRACING_TARGET_UPLOAD;
use crate::config::{CleanupPolicy, TransferConfig};
use crate::error::{TransferError, TransferResult, UploadFailure};
use crate::naming::{NameHint, UploadPrefix};
use crate::reader::ManifestReader;

/// Objects committed by one successful upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Object names in index order.
    pub committed: Vec<String>,
    pub bytes: u64,
}

impl UploadReport {
    /// Name of the highest-index object, if any were written.
    pub fn last_object(&self) -> Option<&str> {
        self.committed.last().map(String::as_str)
    }
}

type PrefixLocks = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Exclusive hold on one group prefix. The map entry is dropped with the last
/// holder, so the map only tracks prefixes with an upload in flight.
struct PrefixGuard {
    prefix: String,
    locks: PrefixLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PrefixGuard {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference is the map's, one is held by our guard.
        let idle = locks
            .get(&self.prefix)
            .is_some_and(|lock| Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(&self.prefix);
        }
        self.guard.take();
    }
}

/// Drains a [`ManifestReader`] into a sequence of committed objects.
///
/// Each non-empty read becomes one object written under the configured retry
/// policy. Uploads targeting the same group prefix are serialized.
#[derive(Debug, Clone)]
pub struct UploadEngine {
    config: TransferConfig,
    locks: PrefixLocks,
}

impl UploadEngine {
    pub fn new(config: TransferConfig) -> TransferResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            locks: Arc::default(),
        })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    async fn lock_prefix(&self, prefix: &str) -> PrefixGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(prefix.to_string()).or_default().clone()
        };
        PrefixGuard {
            prefix: prefix.to_string(),
            locks: self.locks.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of group prefixes with an upload in flight or waiting.
    fn locked_prefixes(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Uploads everything `reader` produces as the group named by `hint`.
    ///
    /// Stops at the first fatal error. Objects committed before it are
    /// reported in the failure, or deleted first under
    /// [`CleanupPolicy::DeleteCommitted`].
    #[tracing::instrument(
        target = TRACING_TARGET_UPLOAD,
        name = "transfer.upload",
        skip_all,
        fields(prefix = %prefix, hint = %hint)
    )]
    pub async fn upload<S>(
        &self,
        store: &S,
        prefix: &UploadPrefix,
        reader: &mut ManifestReader,
        hint: &NameHint,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, UploadFailure>
    where
        S: RemoteStore + ?Sized,
    {
        let group = hint.group_prefix(prefix);
        let _guard = self.lock_prefix(&group).await;

        let mut buf = vec![0u8; self.config.chunk_size];
        let mut report = UploadReport::default();
        let mut index = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(self.fail(store, report, TransferError::Cancelled).await);
            }

            let status = match reader.read(&mut buf).await {
                Ok(status) => status,
                Err(error) => return Err(self.fail(store, report, error).await),
            };

            if !status.is_empty() {
                let key = hint.object_name(prefix, index);
                let chunk = Bytes::copy_from_slice(&buf[..status.len()]);
                let key_ref = key.as_str();
                let written = self
                    .config
                    .retry
                    .run("upload", key_ref, cancel, move |_| {
                        store.write_object(key_ref, chunk.clone())
                    })
                    .await;
                if let Err(error) = written {
                    return Err(self.fail(store, report, error).await);
                }

                tracing::debug!(
                    target: TRACING_TARGET_UPLOAD,
                    key = %key,
                    size = status.len(),
                    "chunk committed"
                );
                report.bytes += status.len() as u64;
                report.committed.push(key);
                index += 1;
            }

            if status.is_final() {
                break;
            }
        }

        tracing::info!(
            target: TRACING_TARGET_UPLOAD,
            group = %group,
            objects = report.committed.len(),
            bytes = report.bytes,
            "upload completed"
        );
        Ok(report)
    }

    async fn fail<S>(&self, store: &S, report: UploadReport, error: TransferError) -> UploadFailure
    where
        S: RemoteStore + ?Sized,
    {
        tracing::error!(
            target: TRACING_TARGET_UPLOAD,
            error = %error,
            committed = report.committed.len(),
            "upload failed"
        );

        let mut failure = UploadFailure::new(error);
        if self.config.cleanup == CleanupPolicy::Retain {
            failure.committed = report.committed;
            return failure;
        }

        // Cleanup runs even when the upload itself was cancelled.
        let cancel = CancellationToken::new();
        for key in report.committed {
            let key_ref = key.as_str();
            let deleted = self
                .config
                .retry
                .run("delete", key_ref, &cancel, move |_| store.delete_object(key_ref))
                .await;
            match deleted {
                Ok(()) => failure.removed.push(key),
                Err(error) => {
                    tracing::warn!(
                        target: TRACING_TARGET_UPLOAD,
                        key = %key,
                        error = %error,
                        "could not delete committed object"
                    );
                    failure.committed.push(key);
                }
            }
        }
        failure
    }
}
