//! Store configuration file.

use std::path::{Path, PathBuf};

use jiff::Timestamp;
use jiff::civil::DateTime;
use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};
use stow_access::{Permission, Restriction, ScopeSource, SharePrefix};
use stow_transfer::UploadPrefix;

/// Format of `notBefore` / `notAfter`, interpreted as UTC.
const WINDOW_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// Problems with the store configuration file.
#[derive(Debug, thiserror::Error)]
pub enum StoreConfigError {
    #[error("cannot read store configuration '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse store configuration '{}'", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{field}' must be a boolean, got '{value}'")]
    InvalidBool { field: &'static str, value: String },

    #[error("'{field}' must look like YYYY-MM-DD_HH:MM:SS, got '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("'{0}' is required")]
    Missing(&'static str),
}

/// Credentials, destination and share permissions, as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(rename = "apikey")]
    pub api_key: String,
    pub satellite: String,
    pub bucket: String,
    #[serde(rename = "uploadPath")]
    pub upload_path: String,
    #[serde(rename = "encryptionpassphrase")]
    pub encryption_passphrase: String,
    #[serde(rename = "serializedAccess")]
    pub serialized_access: String,
    #[serde(rename = "allowDownload")]
    pub allow_download: String,
    #[serde(rename = "allowUpload")]
    pub allow_upload: String,
    #[serde(rename = "allowList")]
    pub allow_list: String,
    #[serde(rename = "allowDelete")]
    pub allow_delete: String,
    #[serde(rename = "notBefore")]
    pub not_before: String,
    #[serde(rename = "notAfter")]
    pub not_after: String,
}

impl StoreConfig {
    pub fn load(path: &Path) -> Result<Self, StoreConfigError> {
        let raw = std::fs::read(path).map_err(|source| StoreConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| StoreConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn upload_prefix(&self) -> UploadPrefix {
        UploadPrefix::new(&self.upload_path)
    }

    /// Grant source: the serialized access when `reuse` is set, otherwise the
    /// satellite, API key and passphrase.
    pub fn scope_source(&self, reuse: bool) -> Result<ScopeSource, StoreConfigError> {
        if reuse {
            if self.serialized_access.trim().is_empty() {
                return Err(StoreConfigError::Missing("serializedAccess"));
            }
            return Ok(ScopeSource::Reuse {
                serialized: self.serialized_access.trim().to_string(),
            });
        }
        if self.satellite.trim().is_empty() {
            return Err(StoreConfigError::Missing("satellite"));
        }
        Ok(ScopeSource::Fresh {
            satellite: self.satellite.trim().to_string(),
            api_key: self.api_key.trim().to_string(),
            passphrase: self.encryption_passphrase.clone(),
        })
    }

    /// Share restriction built from the `allow*` and window fields, bound to
    /// the bucket and upload path.
    pub fn restriction(&self) -> Result<Restriction, StoreConfigError> {
        let permission = Permission {
            allow_download: parse_bool("allowDownload", &self.allow_download)?,
            allow_upload: parse_bool("allowUpload", &self.allow_upload)?,
            allow_list: parse_bool("allowList", &self.allow_list)?,
            allow_delete: parse_bool("allowDelete", &self.allow_delete)?,
            not_before: parse_timestamp("notBefore", &self.not_before)?,
            not_after: parse_timestamp("notAfter", &self.not_after)?,
        };

        let prefix = self.upload_prefix();
        let share = if prefix.as_str().is_empty() {
            SharePrefix::full_bucket(&self.bucket)
        } else {
            SharePrefix::new(&self.bucket, prefix.as_str())
        };
        Ok(Restriction::new(permission).with_prefix(share))
    }
}

/// Accepts the usual spellings; an empty value is `false`.
fn parse_bool(field: &'static str, value: &str) -> Result<bool, StoreConfigError> {
    match value.trim() {
        "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        other => Err(StoreConfigError::InvalidBool {
            field,
            value: other.to_string(),
        }),
    }
}

/// An empty value leaves that side of the window open.
fn parse_timestamp(field: &'static str, value: &str) -> Result<Option<Timestamp>, StoreConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let invalid = || StoreConfigError::InvalidTimestamp {
        field,
        value: value.to_string(),
    };
    let civil = DateTime::strptime(WINDOW_FORMAT, value).map_err(|_| invalid())?;
    let zoned = civil.to_zoned(TimeZone::UTC).map_err(|_| invalid())?;
    Ok(Some(zoned.timestamp()))
}
