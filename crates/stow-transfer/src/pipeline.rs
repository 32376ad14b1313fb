//! Per-file transfer of a whole manifest.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use stow_object::RemoteStore;
use tokio_util::sync::CancellationToken;

use crate::TRACING_TARGET_PIPELINE;
use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult, UploadFailure};
use crate::manifest::Manifest;
use crate::naming::{NameHint, UploadPrefix};
use crate::reader::ManifestReader;
use crate::upload::{UploadEngine, UploadReport};
use crate::verify::{DownloadVerifier, VerifyReport, VerifyRequest};

/// Outcome of reading one uploaded group back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified(VerifyReport),
    /// Verification failed; the upload itself still stands.
    Failed(String),
}

/// One manifest file and what became of it.
#[derive(Debug, Clone)]
pub struct FileTransfer {
    pub source: PathBuf,
    pub hint: NameHint,
    pub upload: UploadReport,
    pub verification: Option<VerifyOutcome>,
}

/// Everything a pipeline run committed.
#[derive(Debug, Clone, Default)]
pub struct TransferReport {
    pub files: Vec<FileTransfer>,
}

impl TransferReport {
    /// All committed object names, in upload order.
    pub fn committed(&self) -> Vec<String> {
        self.files
            .iter()
            .flat_map(|file| file.upload.committed.iter().cloned())
            .collect()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|file| file.upload.bytes).sum()
    }

    /// Whether any requested verification failed.
    pub fn has_verification_failures(&self) -> bool {
        self.files
            .iter()
            .any(|file| matches!(file.verification, Some(VerifyOutcome::Failed(_))))
    }
}

/// Uploads each manifest file as its own group, then optionally verifies it
/// and deletes the source.
#[derive(Debug, Clone)]
pub struct Pipeline {
    engine: UploadEngine,
    verifier: DownloadVerifier,
}

impl Pipeline {
    pub fn new(config: TransferConfig) -> TransferResult<Self> {
        let verifier = DownloadVerifier::from_config(&config);
        Ok(Self {
            engine: UploadEngine::new(config)?,
            verifier,
        })
    }

    pub fn engine(&self) -> &UploadEngine {
        &self.engine
    }

    pub fn verifier(&self) -> &DownloadVerifier {
        &self.verifier
    }

    /// Transfers every file of `manifest` under `prefix`.
    ///
    /// Each file's hint is `<group>/<path relative to the manifest root>`,
    /// without the group when it is empty. Hints are derived for every file
    /// before anything is uploaded, and a run whose files would share an
    /// object group fails up front. The run stops at the first fatal error;
    /// the failure lists every object committed by earlier files too.
    #[tracing::instrument(
        target = TRACING_TARGET_PIPELINE,
        name = "transfer.pipeline",
        skip_all,
        fields(prefix = %prefix, group = group, files = manifest.len())
    )]
    pub async fn run<S>(
        &self,
        store: &S,
        prefix: &UploadPrefix,
        manifest: &Manifest,
        group: &str,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, UploadFailure>
    where
        S: RemoteStore + ?Sized,
    {
        let config = self.engine.config();
        let mut report = TransferReport::default();
        let hints = plan(prefix, manifest, group).map_err(UploadFailure::new)?;

        for (source, hint) in manifest.files().iter().zip(hints) {
            let mut reader = ManifestReader::new(Manifest::from_files([source.clone()]));

            let upload = self
                .engine
                .upload(store, prefix, &mut reader, &hint, cancel)
                .await
                .map_err(|failure| failure.after(report.committed()))?;

            let verification = if config.verify {
                Some(self.verify(store, prefix, &hint, &upload, cancel).await.map_err(
                    |e| {
                        let mut failure = UploadFailure::new(e);
                        failure.committed = upload.committed.clone();
                        failure.after(report.committed())
                    },
                )?)
            } else {
                None
            };

            let transfer = FileTransfer {
                source: source.clone(),
                hint,
                upload,
                verification,
            };
            if config.delete_sources {
                tokio::fs::remove_file(source).await.map_err(|e| {
                    let mut failure = UploadFailure::new(TransferError::io(source, e));
                    failure.committed = transfer.upload.committed.clone();
                    failure.after(report.committed())
                })?;
                tracing::debug!(
                    target: TRACING_TARGET_PIPELINE,
                    path = %source.display(),
                    "source deleted"
                );
            }
            report.files.push(transfer);
        }

        tracing::info!(
            target: TRACING_TARGET_PIPELINE,
            files = report.files.len(),
            objects = report.committed().len(),
            bytes = report.total_bytes(),
            "transfer completed"
        );
        Ok(report)
    }

    /// Verifies one uploaded group. Only cancellation is fatal.
    async fn verify<S>(
        &self,
        store: &S,
        prefix: &UploadPrefix,
        hint: &NameHint,
        upload: &UploadReport,
        cancel: &CancellationToken,
    ) -> TransferResult<VerifyOutcome>
    where
        S: RemoteStore + ?Sized,
    {
        if upload.committed.is_empty() {
            return Ok(VerifyOutcome::Failed("nothing was uploaded".into()));
        }

        let mut request = VerifyRequest::new(hint.clone()).with_expected_bytes(upload.bytes);
        if let Some(last) = upload.last_object() {
            request = request.with_last_object(last);
        }

        match self.verifier.verify(store, prefix, &request, cancel).await {
            Ok(report) => Ok(VerifyOutcome::Verified(report)),
            Err(TransferError::Cancelled) => Err(TransferError::Cancelled),
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET_PIPELINE,
                    hint = %hint,
                    error = %error,
                    "verification failed"
                );
                Ok(VerifyOutcome::Failed(error.to_string()))
            }
        }
    }
}

/// Derives one hint per manifest file and rejects object group collisions.
fn plan(prefix: &UploadPrefix, manifest: &Manifest, group: &str) -> TransferResult<Vec<NameHint>> {
    let mut seen: HashMap<String, &Path> = HashMap::with_capacity(manifest.len());
    let mut hints = Vec::with_capacity(manifest.len());

    for source in manifest.files() {
        let hint = hint_for(group, manifest.root(), source)?;
        let group_prefix = hint.group_prefix(prefix);
        if let Some(first) = seen.insert(group_prefix.clone(), source.as_path()) {
            return Err(TransferError::DuplicateGroup {
                group: group_prefix,
                first: first.display().to_string(),
                second: source.display().to_string(),
            });
        }
        hints.push(hint);
    }
    Ok(hints)
}

/// `<group>/<source relative to root>`; only the file name is used when the
/// source is not under `root`.
fn hint_for(group: &str, root: Option<&Path>, source: &Path) -> TransferResult<NameHint> {
    let invalid = || TransferError::InvalidHint(source.display().to_string());
    let relative = match root.and_then(|root| source.strip_prefix(root).ok()) {
        Some(relative) => relative,
        None => source.file_name().map(Path::new).ok_or_else(invalid)?,
    };
    let relative = relative
        .iter()
        .map(|component| component.to_str().ok_or_else(invalid))
        .collect::<TransferResult<Vec<_>>>()?
        .join("/");

    let group = group.trim_matches('/');
    if group.is_empty() {
        NameHint::parse(&relative)
    } else {
        NameHint::parse(&format!("{group}/{relative}"))
    }
}
