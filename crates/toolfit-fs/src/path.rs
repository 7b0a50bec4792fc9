//! Project-relative file paths

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// A file path relative to the project root.
///
/// Stored with forward slashes so that it can be used as a stable key in
/// persisted state regardless of platform. Converted to a native path only
/// when joined onto a root directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectPath {
    inner: String,
}

impl ProjectPath {
    /// Parse and validate a project-relative path.
    ///
    /// Rejects empty paths, absolute paths and paths escaping the root via `..`.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        let normalized = raw.replace('\\', "/");

        if normalized.starts_with('/') || has_drive_prefix(&normalized) {
            return Err(invalid(raw, "path must be relative to the project root"));
        }

        let mut segments = Vec::new();
        for segment in normalized.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(invalid(raw, "path must not leave the project root")),
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Err(invalid(raw, "path is empty"));
        }

        Ok(Self {
            inner: segments.join("/"),
        })
    }

    /// A path from a literal that is already relative and normalized.
    pub fn from_static(path: &'static str) -> Self {
        debug_assert!(Self::new(path).is_ok_and(|p| p.as_str() == path));
        Self {
            inner: path.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Resolve against a root directory into a native path.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.inner.split('/').fold(root.to_path_buf(), |acc, s| acc.join(s))
    }

    pub fn file_name(&self) -> &str {
        self.inner.rsplit('/').next().unwrap_or(&self.inner)
    }

    /// The extension of the file name, if any. Dotfiles have no extension.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn invalid(path: &str, reason: &str) -> Error {
    Error::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl TryFrom<&str> for ProjectPath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl Serialize for ProjectPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}

impl<'de> Deserialize<'de> for ProjectPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(serde::de::Error::custom)
    }
}
