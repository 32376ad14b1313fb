//! Ordered list of local files to transfer.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::TRACING_TARGET_READER;
use crate::error::{TransferError, TransferResult};

/// Ordered sequence of local file paths.
///
/// The first entry may be the directory the files were collected from; it is
/// a marker only and is never read as data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<PathBuf>,
    root: Option<PathBuf>,
}

impl Manifest {
    /// Wraps an externally produced list. When `root` is given and the list
    /// starts with it, that entry is treated as the root marker.
    pub fn new(entries: Vec<PathBuf>, root: Option<PathBuf>) -> Self {
        Self { entries, root }
    }

    /// A manifest of data files only.
    pub fn from_files<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(files.into_iter().map(Into::into).collect(), None)
    }

    /// Walks `root` in lexical order: the root itself first, then every
    /// regular file below it. Directories are not listed.
    pub fn from_dir(root: impl AsRef<Path>) -> TransferResult<Self> {
        let root = root.as_ref();
        let meta = std::fs::metadata(root).map_err(|e| TransferError::io(root, e))?;
        if !meta.is_dir() {
            return Err(TransferError::io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }
        let mut entries = vec![root.to_path_buf()];

        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                TransferError::io(path, e.into())
            })?;
            if entry.file_type().is_file() {
                entries.push(entry.into_path());
            }
        }

        tracing::debug!(
            target: TRACING_TARGET_READER,
            root = %root.display(),
            files = entries.len() - 1,
            "collected manifest"
        );
        Ok(Self::new(entries, Some(root.to_path_buf())))
    }

    /// All entries, including a leading root marker if present.
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Whether the entry at `index` is the root marker.
    pub fn is_root_marker(&self, index: usize) -> bool {
        index == 0
            && self
                .root
                .as_deref()
                .is_some_and(|root| self.entries.first().is_some_and(|e| e == root))
    }

    /// The data files, in order.
    pub fn files(&self) -> &[PathBuf] {
        if self.is_root_marker(0) {
            &self.entries[1..]
        } else {
            &self.entries
        }
    }

    /// Number of data files.
    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }

    /// Sum of the sizes of all data files.
    pub async fn total_size(&self) -> TransferResult<u64> {
        let mut total = 0;
        for path in self.files() {
            let meta = tokio::fs::metadata(path)
                .await
                .map_err(|e| TransferError::io(path, e))?;
            total += meta.len();
        }
        Ok(total)
    }
}
