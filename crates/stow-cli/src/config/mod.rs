//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── source: SourceConfig      # store file, backup directory, group, modes
//! └── transfer: TransferArgs    # chunking, retries, cleanup, verification
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.

mod store;
mod transfer;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser};
use serde::{Deserialize, Serialize};
pub use store::{StoreConfig, StoreConfigError};
pub use transfer::TransferArgs;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "stow")]
#[command(about = "Upload a backup directory to an object store in bounded-size chunks")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub source: SourceConfig,

    #[clap(flatten)]
    pub transfer: TransferArgs,
}

/// What to upload, where, and in which mode.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path of the JSON store configuration.
    #[arg(
        short = 'u',
        long = "store",
        env = "STOW_STORE_CONFIG",
        default_value = "./config/store.json"
    )]
    pub store_config: PathBuf,

    /// Directory whose files are uploaded.
    #[arg(short = 'b', long, env = "STOW_BACKUP_DIR")]
    pub backup_dir: PathBuf,

    /// Group every file is uploaded under, usually the database name.
    #[arg(short = 'g', long, env = "STOW_GROUP", default_value = "")]
    #[serde(default)]
    pub group: String,

    /// Connect with the serialized access from the store configuration
    /// instead of the API key.
    #[arg(short = 'a', long, env = "STOW_ACCESS_KEY")]
    #[serde(default)]
    pub access_key: bool,

    /// Print a restricted, shareable access grant after the upload.
    #[arg(short = 's', long, env = "STOW_SHARE")]
    #[serde(default)]
    pub share: bool,

    /// Verbose logging, and read every upload back into the debug root.
    #[arg(short = 'd', long, env = "STOW_DEBUG")]
    #[serde(default)]
    pub debug: bool,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    ///
    /// Without `RUST_LOG` the filter is `info`, or `debug` with `--debug`.
    pub fn init_tracing(&self) {
        let fallback = if self.source.debug { "debug" } else { "info" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.source.backup_dir.is_dir() {
            anyhow::bail!(
                "backup directory '{}' does not exist",
                self.source.backup_dir.display()
            );
        }
        self.transfer.validate(self.source.debug)
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            store_config = %self.source.store_config.display(),
            backup_dir = %self.source.backup_dir.display(),
            group = %self.source.group,
            access_key = self.source.access_key,
            share = self.source.share,
            debug = self.source.debug,
            "Source configuration"
        );
        self.transfer.log();
    }

    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
