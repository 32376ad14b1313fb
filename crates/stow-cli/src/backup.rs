//! Resolves the destination scope and runs the transfer pipeline.

use anyhow::Context;
use stow_access::{ScopeManager, ScopeRequest};
use stow_transfer::{
    CancellationToken, Manifest, Pipeline, TransferReport, UploadFailure, VerifyOutcome,
};

use crate::TRACING_TARGET_BACKUP;
use crate::config::{Cli, StoreConfig};

/// What a successful run produced.
#[derive(Debug)]
pub struct Outcome {
    pub report: TransferReport,
    /// Serialized grant the upload used.
    pub serialized: String,
    /// Restricted grant, when sharing was requested.
    pub shared: Option<String>,
}

/// Uploads every file of the backup directory.
///
/// On failure the names of the objects left in the store are printed before
/// the error is returned.
pub async fn execute(
    cli: &Cli,
    store_config: &StoreConfig,
    manager: &ScopeManager,
    cancel: &CancellationToken,
) -> anyhow::Result<Outcome> {
    let source = store_config
        .scope_source(cli.source.access_key)
        .context("invalid store configuration")?;
    let mut request = ScopeRequest::new(source, store_config.bucket.trim());
    if cli.source.share {
        let restriction = store_config
            .restriction()
            .context("invalid share permissions")?;
        request = request.with_restriction(restriction);
    }

    let scope = manager
        .resolve(request)
        .await
        .context("failed to resolve access scope")?;

    let manifest = Manifest::from_dir(&cli.source.backup_dir)
        .context("failed to collect backup files")?;
    tracing::info!(
        target: TRACING_TARGET_BACKUP,
        files = manifest.len(),
        bucket = %scope.store.bucket(),
        "collected backup files"
    );

    let pipeline = Pipeline::new(cli.transfer.to_config(cli.source.debug))?;
    let prefix = store_config.upload_prefix();
    let report = match pipeline
        .run(&scope.store, &prefix, &manifest, &cli.source.group, cancel)
        .await
    {
        Ok(report) => report,
        Err(failure) => {
            print_failure(&failure);
            return Err(failure).context("transfer failed");
        }
    };

    Ok(Outcome {
        report,
        serialized: scope.serialized,
        shared: scope.shared.map(|shared| shared.serialized),
    })
}

pub fn print_outcome(outcome: &Outcome) {
    for file in &outcome.report.files {
        println!(
            "{} -> {} object(s), {} bytes",
            file.source.display(),
            file.upload.committed.len(),
            file.upload.bytes
        );
        for name in &file.upload.committed {
            println!("  {name}");
        }
        match &file.verification {
            Some(VerifyOutcome::Verified(report)) => println!(
                "  verified into {} (sha256 {})",
                report.local_path.display(),
                report.sha256
            ),
            Some(VerifyOutcome::Failed(reason)) => println!("  verification failed: {reason}"),
            None => {}
        }
    }
    if let Some(shared) = &outcome.shared {
        println!("Shareable serialized access: {shared}");
    }
}

fn print_failure(failure: &UploadFailure) {
    if !failure.committed.is_empty() {
        eprintln!("Objects committed before the failure:");
        for name in &failure.committed {
            eprintln!("  {name}");
        }
    }
    if !failure.removed.is_empty() {
        eprintln!("Objects removed after the failure:");
        for name in &failure.removed {
            eprintln!("  {name}");
        }
    }
}
