//! Download verification: read a group back and reassemble it locally.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use stow_object::RemoteStore;
use tokio_util::sync::CancellationToken;

use crate::TRACING_TARGET_VERIFY;
use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::naming::{NameHint, UploadPrefix};
use crate::retry::RetryPolicy;

/// What to verify.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub hint: NameHint,
    /// Last object the upload reported; the group must end exactly there.
    pub last_object: Option<String>,
    /// Size of the original source.
    pub expected_bytes: Option<u64>,
}

impl VerifyRequest {
    pub fn new(hint: NameHint) -> Self {
        Self {
            hint,
            last_object: None,
            expected_bytes: None,
        }
    }

    pub fn with_last_object(mut self, last_object: impl Into<String>) -> Self {
        self.last_object = Some(last_object.into());
        self
    }

    pub fn with_expected_bytes(mut self, expected_bytes: u64) -> Self {
        self.expected_bytes = Some(expected_bytes);
        self
    }
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Objects read, in index order.
    pub objects: Vec<String>,
    pub bytes: u64,
    /// Where the reassembled file was written.
    pub local_path: PathBuf,
    /// Hex-encoded SHA-256 of the reassembled bytes.
    pub sha256: String,
}

/// Re-derives object names for a group, downloads them in index order and
/// writes the concatenation under a debug root.
#[derive(Debug, Clone)]
pub struct DownloadVerifier {
    retry: RetryPolicy,
    debug_root: PathBuf,
}

impl DownloadVerifier {
    pub fn new(retry: RetryPolicy, debug_root: impl Into<PathBuf>) -> Self {
        Self {
            retry,
            debug_root: debug_root.into(),
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.retry, config.debug_root.clone())
    }

    #[tracing::instrument(
        target = TRACING_TARGET_VERIFY,
        name = "transfer.verify",
        skip_all,
        fields(prefix = %prefix, hint = %request.hint)
    )]
    pub async fn verify<S>(
        &self,
        store: &S,
        prefix: &UploadPrefix,
        request: &VerifyRequest,
        cancel: &CancellationToken,
    ) -> TransferResult<VerifyReport>
    where
        S: RemoteStore + ?Sized,
    {
        let hint = &request.hint;
        let group = hint.group_prefix(prefix);
        let group_ref = group.as_str();

        let keys = self
            .retry
            .run("list", group_ref, cancel, move |_| store.list_keys(group_ref))
            .await?;
        let count = self.check_sequence(prefix, request, &group, &keys)?;

        let mut data = Vec::new();
        let mut objects = Vec::with_capacity(count);
        for index in 0..count as u64 {
            let key = hint.object_name(prefix, index);
            let key_ref = key.as_str();
            let chunk = self
                .retry
                .run("download", key_ref, cancel, move |_| store.read_object(key_ref))
                .await?;
            tracing::debug!(
                target: TRACING_TARGET_VERIFY,
                key = %key,
                size = chunk.len(),
                "object downloaded"
            );
            data.extend_from_slice(&chunk);
            objects.push(key);
        }

        let local_path = self.debug_root.join(hint.relative_path());
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::io(parent, e))?;
        }
        tokio::fs::write(&local_path, &data)
            .await
            .map_err(|e| TransferError::io(&local_path, e))?;

        let bytes = data.len() as u64;
        if let Some(expected) = request.expected_bytes
            && expected != bytes
        {
            return Err(TransferError::verification(
                group,
                format!("expected {expected} bytes, reassembled {bytes}"),
            ));
        }

        let sha256 = hex::encode(Sha256::digest(&data));
        tracing::info!(
            target: TRACING_TARGET_VERIFY,
            path = %local_path.display(),
            objects = objects.len(),
            bytes,
            sha256 = %sha256,
            "verification completed"
        );

        Ok(VerifyReport {
            objects,
            bytes,
            local_path,
            sha256,
        })
    }

    /// Checks that `keys` are exactly indices `0..n` of the group and returns `n`.
    fn check_sequence(
        &self,
        prefix: &UploadPrefix,
        request: &VerifyRequest,
        group: &str,
        keys: &[String],
    ) -> TransferResult<usize> {
        let mut indices = Vec::with_capacity(keys.len());
        for key in keys {
            match request.hint.parse_index(prefix, key) {
                Some(index) => indices.push(index),
                None => {
                    return Err(TransferError::verification(
                        group,
                        format!("unexpected object '{key}'"),
                    ));
                }
            }
        }
        indices.sort_unstable();

        if indices.is_empty() {
            return Err(TransferError::verification(group, "no objects found"));
        }
        if let Some(gap) = indices.iter().enumerate().find(|(i, index)| *i as u64 != **index) {
            return Err(TransferError::verification(
                group,
                format!("missing object with index {}", gap.0),
            ));
        }

        if let Some(last) = &request.last_object {
            let expected = request.hint.parse_index(prefix, last).ok_or_else(|| {
                TransferError::verification(group, format!("'{last}' is not part of the group"))
            })?;
            let found = indices.len() as u64 - 1;
            if expected != found {
                return Err(TransferError::verification(
                    group,
                    format!("expected last index {expected}, found {found}"),
                ));
            }
        }

        Ok(indices.len())
    }
}
