//! Format detection and handler trait

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::node::Node;
use crate::path::KeyPath;
use crate::value::Value;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Toml,
    Yaml,
}

impl Format {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Detect format from a file path's extension
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Format-specific backend owning a parsed document.
///
/// Every edit must leave the bytes of untouched nodes unchanged. Paths given
/// to edits are absolute; parents must already exist.
pub trait FormatHandler: Send + Sync {
    fn format(&self) -> Format;

    /// Read the node at `path`.
    fn get(&self, path: &KeyPath) -> Option<Node>;

    /// Replace the value at an existing path, keeping its trailing comment.
    fn replace(&mut self, path: &KeyPath, value: &Value) -> Result<()>;

    /// Insert a new key into the mapping at `parent`.
    ///
    /// The entry goes directly after `after` when that key exists, otherwise
    /// at the end of the mapping.
    fn insert_key(
        &mut self,
        parent: &KeyPath,
        key: &str,
        value: &Value,
        after: Option<&str>,
    ) -> Result<()>;

    /// Insert an element into the sequence at `sequence` before `index`
    /// (`index == len` appends).
    fn insert_element(&mut self, sequence: &KeyPath, index: usize, value: &Value) -> Result<()>;

    /// Remove a mapping entry or sequence element along with its dedicated comments.
    fn remove(&mut self, path: &KeyPath) -> Result<()>;

    /// Render the current document.
    fn render(&self) -> String;

    /// Semantic JSON view for comparisons.
    fn normalize(&self) -> Result<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_from_path() {
        assert_eq!(Format::from_path("pyproject.toml"), Some(Format::Toml));
        assert_eq!(
            Format::from_path(".pre-commit-config.yaml"),
            Some(Format::Yaml)
        );
        assert_eq!(Format::from_path("ci/workflow.YML"), Some(Format::Yaml));
        assert_eq!(Format::from_path("setup.cfg"), None);
    }
}
