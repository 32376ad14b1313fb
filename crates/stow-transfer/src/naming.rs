//! Deterministic object naming shared by upload and verification.
//!
//! A source hint such as `db/000000001.txt` is split once into a directory
//! (`db`), a group and an extension. The file name's dot-separated components
//! form the group: at most the first three, joined without separators, so
//! `x.s1.tar.gz` groups as `xs1tar`. The extension is every component after
//! the first, joined with dots. Chunk `i` of the group is stored at
//! `<prefix><dir>/<group>/<i>.<extension>`.

use std::fmt;
use std::path::PathBuf;

use crate::error::{TransferError, TransferResult};

/// Number of leading file name components that make up the group.
const GROUP_COMPONENTS: usize = 3;

/// An upload path prefix, normalized to be empty or end in exactly one `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UploadPrefix(String);

impl UploadPrefix {
    pub fn new(raw: &str) -> Self {
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            Self(String::new())
        } else {
            Self(format!("{}/", segments.join("/")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The parsed form of a source name hint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameHint {
    dir: Option<String>,
    file_name: String,
    group: String,
    extension: Option<String>,
}

impl NameHint {
    pub fn parse(hint: &str) -> TransferResult<Self> {
        let mut segments: Vec<&str> = hint.split('/').filter(|s| !s.is_empty()).collect();
        let Some(file_name) = segments.pop() else {
            return Err(TransferError::InvalidHint(hint.to_string()));
        };
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(TransferError::InvalidHint(hint.to_string()));
        }

        let components: Vec<&str> = file_name.split('.').filter(|s| !s.is_empty()).collect();
        let Some((_, rest)) = components.split_first() else {
            return Err(TransferError::InvalidHint(hint.to_string()));
        };

        Ok(Self {
            dir: (!segments.is_empty()).then(|| segments.join("/")),
            file_name: file_name.to_string(),
            group: components[..components.len().min(GROUP_COMPONENTS)].concat(),
            extension: (!rest.is_empty()).then(|| rest.join(".")),
        })
    }

    /// The final path component of the hint, e.g. `000000001.txt`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Prefix under which every object of the group lives, ending in `/`.
    pub fn group_prefix(&self, prefix: &UploadPrefix) -> String {
        match &self.dir {
            Some(dir) => format!("{prefix}{dir}/{}/", self.group),
            None => format!("{prefix}{}/", self.group),
        }
    }

    /// Name of the object holding chunk `index`.
    pub fn object_name(&self, prefix: &UploadPrefix, index: u64) -> String {
        let group = self.group_prefix(prefix);
        match &self.extension {
            Some(ext) => format!("{group}{index}.{ext}"),
            None => format!("{group}{index}"),
        }
    }

    /// Recovers the chunk index from an object name produced by
    /// [`object_name`](Self::object_name) with the same prefix.
    pub fn parse_index(&self, prefix: &UploadPrefix, key: &str) -> Option<u64> {
        let rest = key.strip_prefix(&self.group_prefix(prefix))?;
        let digits = match &self.extension {
            Some(ext) => rest.strip_suffix(ext)?.strip_suffix('.')?,
            None => rest,
        };
        let index: u64 = digits.parse().ok()?;
        (index.to_string() == digits).then_some(index)
    }

    /// Relative local path the hint mirrors, e.g. `db/000000001.txt`.
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        if let Some(dir) = &self.dir {
            path.push(dir);
        }
        path.push(&self.file_name);
        path
    }
}

impl fmt::Display for NameHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dir {
            Some(dir) => write!(f, "{dir}/{}", self.file_name),
            None => f.write_str(&self.file_name),
        }
    }
}
