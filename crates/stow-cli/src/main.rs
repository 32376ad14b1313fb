#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod backup;
mod config;

use std::process;

use anyhow::Context;
use stow_access::{DefaultConnector, ScopeManager};
use stow_transfer::CancellationToken;

use crate::config::{Cli, StoreConfig};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "stow_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "stow_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "stow_cli::config";
pub const TRACING_TARGET_BACKUP: &str = "stow_cli::backup";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    cli.init_tracing();
    cli.log();
    cli.validate().context("invalid configuration")?;

    let store_config = StoreConfig::load(&cli.source.store_config)?;
    let manager = ScopeManager::new(DefaultConnector);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let outcome = backup::execute(&cli, &store_config, &manager, &cancel).await?;
    backup::print_outcome(&outcome);
    Ok(())
}

/// Cancels `token` on Ctrl+C so the transfer stops between chunks.
async fn cancel_on_ctrl_c(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!(
                target: TRACING_TARGET_SHUTDOWN,
                "received Ctrl+C, cancelling transfer"
            );
            token.cancel();
        }
        Err(e) => {
            tracing::error!(
                target: TRACING_TARGET_SHUTDOWN,
                error = %e,
                "failed to install Ctrl+C handler"
            );
        }
    }
}
