//! Unified Document type

use std::fmt;

use crate::error::{Error, Result};
use crate::format::{Format, FormatHandler};
use crate::handlers::{TomlHandler, YamlHandler};
use crate::node::Node;
use crate::path::{KeyPath, PathSegment};
use crate::value::{Mapping, Value};

/// A parsed configuration file that can be edited without losing formatting.
pub struct Document {
    /// Source as provided to [`Document::parse`], for `is_modified` tracking
    original: String,
    format: Format,
    handler: Box<dyn FormatHandler>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("format", &self.format)
            .field("modified", &self.is_modified())
            .finish()
    }
}

impl Document {
    pub fn parse(source: &str, format: Format) -> Result<Self> {
        let handler: Box<dyn FormatHandler> = match format {
            Format::Toml => Box::new(TomlHandler::parse(source)?),
            Format::Yaml => Box::new(YamlHandler::parse(source)?),
        };
        Ok(Self {
            original: source.to_string(),
            format,
            handler,
        })
    }

    /// An empty document of the given format.
    pub fn empty(format: Format) -> Result<Self> {
        Self::parse("", format)
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn get(&self, path: &KeyPath) -> Option<Node> {
        self.handler.get(path)
    }

    /// Read the value at `path` with formatting stripped.
    pub fn get_value(&self, path: &KeyPath) -> Option<Value> {
        self.get(path).map(|n| n.to_value())
    }

    pub fn contains(&self, path: &KeyPath) -> bool {
        self.get(path).is_some()
    }

    /// Set a value, creating missing parent mappings.
    pub fn set(&mut self, path: &KeyPath, value: &Value) -> Result<()> {
        self.set_with(path, value, None)
    }

    /// Set a value; a newly created key is placed after `after` when that
    /// sibling exists.
    ///
    /// An existing value is replaced in place and keeps its trailing comment.
    /// When parents are missing, the deepest existing ancestor receives one
    /// new entry holding the whole missing subtree. A null ancestor counts
    /// as vacant and is replaced.
    pub fn set_with(&mut self, path: &KeyPath, value: &Value, after: Option<&str>) -> Result<()> {
        if path.is_root() {
            return Err(Error::set_failed(self.format.name(), path, "cannot set the document root"));
        }
        if self.contains(path) {
            return self.handler.replace(path, value);
        }

        let mut depth = path.len() - 1;
        while depth > 0 && !self.contains(&path.prefix(depth)) {
            depth -= 1;
        }
        let ancestor = path.prefix(depth);
        let missing = &path.segments()[depth..];

        // Wrap the value in mappings for every missing key below the first.
        let mut nested = value.clone();
        for segment in missing[1..].iter().rev() {
            let PathSegment::Key(key) = segment else {
                return Err(Error::set_failed(
                    self.format.name(),
                    path,
                    "cannot create a sequence element through a missing parent",
                ));
            };
            let mut mapping = Mapping::new();
            mapping.insert(key.clone(), nested);
            nested = Value::Mapping(mapping);
        }
        let hint = if missing.len() == 1 { after } else { None };

        let ancestor_node = self.get(&ancestor);
        match (&missing[0], ancestor_node) {
            (PathSegment::Key(key), Some(node)) if node.is_null() => {
                let mut mapping = Mapping::new();
                mapping.insert(key.clone(), nested);
                self.handler.replace(&ancestor, &Value::Mapping(mapping))
            }
            (PathSegment::Key(key), _) => self.handler.insert_key(&ancestor, key, &nested, hint),
            (PathSegment::Index(index), Some(node)) if *index == node.len() => {
                self.handler.insert_element(&ancestor, *index, &nested)
            }
            (PathSegment::Index(_), _) => Err(Error::set_failed(
                self.format.name(),
                path,
                "sequence index out of range",
            )),
        }
    }

    pub fn insert_key(
        &mut self,
        parent: &KeyPath,
        key: &str,
        value: &Value,
        after: Option<&str>,
    ) -> Result<()> {
        self.handler.insert_key(parent, key, value, after)
    }

    pub fn insert_element(&mut self, sequence: &KeyPath, index: usize, value: &Value) -> Result<()> {
        self.handler.insert_element(sequence, index, value)
    }

    /// Append to the sequence at `sequence`.
    pub fn push_element(&mut self, sequence: &KeyPath, value: &Value) -> Result<()> {
        let len = self
            .get(sequence)
            .ok_or_else(|| Error::not_found(sequence))?
            .len();
        self.handler.insert_element(sequence, len, value)
    }

    pub fn replace(&mut self, path: &KeyPath, value: &Value) -> Result<()> {
        self.handler.replace(path, value)
    }

    /// Remove a mapping entry or sequence element along with its dedicated
    /// comment lines.
    pub fn delete(&mut self, path: &KeyPath) -> Result<()> {
        self.handler.remove(path)
    }

    pub fn serialize(&self) -> String {
        self.handler.render()
    }

    /// Replace the current content with `source`, keeping the original for
    /// change tracking.
    pub fn reset_to(&mut self, source: &str) -> Result<()> {
        let fresh = Self::parse(source, self.format)?;
        self.handler = fresh.handler;
        Ok(())
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Check if document has been modified from its original source.
    pub fn is_modified(&self) -> bool {
        self.serialize() != self.original
    }

    /// Get normalized representation for semantic comparison
    pub fn normalize(&self) -> Result<serde_json::Value> {
        self.handler.normalize()
    }

    /// Check semantic equality, ignoring formatting and key order.
    pub fn semantic_eq(&self, other: &Document) -> bool {
        match (self.normalize(), other.normalize()) {
            (Ok(a), Ok(b)) => Value::from(a) == Value::from(b),
            _ => false,
        }
    }
}
