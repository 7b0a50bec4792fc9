//! Key paths into structured documents
//!
//! # Path Syntax
//!
//! - Dot-separated keys: `tool.ruff.lint`
//! - Sequence indexing: `repos[0].hooks`
//! - Quoted keys for keys containing dots or brackets: `tool."setuptools.packages"`
//! - The empty string is the document root
//!
//! ```
//! use toolfit_content::path::{KeyPath, PathSegment};
//!
//! let path: KeyPath = "repos[1].hooks".parse().unwrap();
//! assert_eq!(path.segments(), &[
//!     PathSegment::Key("repos".to_string()),
//!     PathSegment::Index(1),
//!     PathSegment::Key("hooks".to_string()),
//! ]);
//! assert_eq!(path.to_string(), "repos[1].hooks");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A segment of a path - either a mapping key or a sequence index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// An absolute path from the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath {
    segments: Vec<PathSegment>,
}

impl KeyPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Parse the textual form of a path.
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidPath {
            path: path.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut chars = path.chars().peekable();
        // True when the next token must be a key (start of path or after '.').
        let mut expect_key = true;

        while let Some(&ch) = chars.peek() {
            match ch {
                '.' => {
                    if expect_key {
                        return Err(invalid("empty key"));
                    }
                    chars.next();
                    expect_key = true;
                }
                '[' => {
                    if expect_key && !segments.is_empty() {
                        return Err(invalid("index must follow a key or index"));
                    }
                    chars.next();
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            _ => return Err(invalid("malformed index")),
                        }
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| invalid("malformed index"))?;
                    segments.push(PathSegment::Index(index));
                    expect_key = false;
                }
                '"' => {
                    if !expect_key {
                        return Err(invalid("missing '.' before key"));
                    }
                    chars.next();
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some('"') => break,
                            Some('\\') => match chars.next() {
                                Some(escaped) => key.push(escaped),
                                None => return Err(invalid("unterminated quoted key")),
                            },
                            Some(c) => key.push(c),
                            None => return Err(invalid("unterminated quoted key")),
                        }
                    }
                    segments.push(PathSegment::Key(key));
                    expect_key = false;
                }
                _ => {
                    if !expect_key {
                        return Err(invalid("missing '.' before key"));
                    }
                    let mut key = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == '.' || c == '[' || c == '"' {
                            break;
                        }
                        key.push(c);
                        chars.next();
                    }
                    segments.push(PathSegment::Key(key));
                    expect_key = false;
                }
            }
        }

        if expect_key && !segments.is_empty() {
            return Err(invalid("trailing '.'"));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.into()));
        Self { segments }
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// The last segment as a key, if it is one.
    pub fn last_key(&self) -> Option<&str> {
        match self.segments.last() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }

    pub fn join(&self, other: &KeyPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// The first `len` segments.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            segments: self.segments[..len.min(self.segments.len())].to_vec(),
        }
    }
}

fn needs_quotes(key: &str) -> bool {
    key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    if needs_quotes(key) {
                        write!(f, "\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))?;
                    } else {
                        f.write_str(key)?;
                    }
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for KeyPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for KeyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
