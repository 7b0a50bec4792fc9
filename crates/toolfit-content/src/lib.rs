//! Format-preserving structured documents for toolfit
//!
//! A [`Document`] wraps a TOML or YAML source and exposes path-based reads
//! and minimal edits. Anything an edit does not touch is serialized back
//! byte for byte, comments and blank lines included.

pub mod diff;
pub mod document;
pub mod error;
pub mod format;
pub mod handlers;
pub mod node;
pub mod path;
pub mod value;

pub use diff::unified_diff;
pub use document::Document;
pub use error::{Error, Result};
pub use format::{Format, FormatHandler};
pub use node::{Formatting, Node};
pub use path::{KeyPath, PathSegment};
pub use value::{Mapping, Scalar, Value, ValueKind};
