//! Permissions, validity windows and share prefixes.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{ScopeError, ScopeResult};

/// A remote operation subject to permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Download,
    Upload,
    List,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Download => "download",
            Self::Upload => "upload",
            Self::List => "list",
            Self::Delete => "delete",
        })
    }
}

/// Operations allowed by a grant and the window during which it is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default)]
    pub allow_download: bool,
    #[serde(default)]
    pub allow_upload: bool,
    #[serde(default)]
    pub allow_list: bool,
    #[serde(default)]
    pub allow_delete: bool,
    /// The grant is not valid before this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<Timestamp>,
    /// The grant is not valid after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<Timestamp>,
}

impl Permission {
    /// Allows every operation with no time bounds.
    pub fn full() -> Self {
        Self {
            allow_download: true,
            allow_upload: true,
            allow_list: true,
            allow_delete: true,
            not_before: None,
            not_after: None,
        }
    }

    /// Allows download and list.
    pub fn read_only() -> Self {
        Self {
            allow_download: true,
            allow_list: true,
            ..Self::none()
        }
    }

    /// Allows upload and list.
    pub fn write_only() -> Self {
        Self {
            allow_upload: true,
            allow_list: true,
            ..Self::none()
        }
    }

    /// Allows nothing.
    pub fn none() -> Self {
        Self {
            allow_download: false,
            allow_upload: false,
            allow_list: false,
            allow_delete: false,
            not_before: None,
            not_after: None,
        }
    }

    /// Bounds the validity window.
    pub fn with_window(mut self, not_before: Option<Timestamp>, not_after: Option<Timestamp>) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    /// Rejects windows whose start lies after their end.
    pub fn validate(&self) -> ScopeResult<()> {
        if let (Some(not_before), Some(not_after)) = (self.not_before, self.not_after)
            && not_before > not_after
        {
            return Err(ScopeError::InvalidWindow {
                not_before,
                not_after,
            });
        }
        Ok(())
    }

    /// Whether `operation` is allowed at `now`.
    pub fn allows(&self, operation: Operation, now: Timestamp) -> bool {
        if self.not_before.is_some_and(|t| now < t) || self.not_after.is_some_and(|t| now > t) {
            return false;
        }
        match operation {
            Operation::Download => self.allow_download,
            Operation::Upload => self.allow_upload,
            Operation::List => self.allow_list,
            Operation::Delete => self.allow_delete,
        }
    }
}

impl Default for Permission {
    fn default() -> Self {
        Self::full()
    }
}

/// Limits a grant to keys under `prefix` within `bucket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePrefix {
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
}

impl SharePrefix {
    /// Shares a whole bucket.
    pub fn full_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: String::new(),
        }
    }

    /// Shares keys under `prefix` within `bucket`.
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Whether `key` in `bucket` falls under this prefix.
    pub fn covers(&self, bucket: &str, key: &str) -> bool {
        self.bucket == bucket && key.starts_with(&self.prefix)
    }
}

/// One caveat appended to a grant by [`AccessGrant::share`](crate::AccessGrant::share).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restriction {
    pub permission: Permission,
    /// Empty means no prefix limit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefixes: Vec<SharePrefix>,
}

impl Restriction {
    /// Restricts to `permission` with no prefix limit.
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            prefixes: Vec::new(),
        }
    }

    /// Adds a bucket/prefix the grant remains valid for.
    pub fn with_prefix(mut self, prefix: SharePrefix) -> Self {
        self.prefixes.push(prefix);
        self
    }

    /// Whether `operation` on `key` in `bucket` is allowed at `now`.
    ///
    /// Listing a prefix is allowed when the listed prefix lies within a shared
    /// prefix or a shared prefix lies within it.
    pub fn allows(&self, operation: Operation, bucket: &str, key: &str, now: Timestamp) -> bool {
        if !self.permission.allows(operation, now) {
            return false;
        }
        if self.prefixes.is_empty() {
            return true;
        }
        self.prefixes.iter().any(|shared| {
            shared.covers(bucket, key)
                || (operation == Operation::List
                    && shared.bucket == bucket
                    && shared.prefix.starts_with(key))
        })
    }
}
