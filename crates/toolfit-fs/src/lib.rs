//! Filesystem helpers for toolfit
//!
//! Project-relative paths, checksums and atomic, locked writes.

pub mod checksum;
pub mod error;
pub mod io;
pub mod path;

pub use error::{Error, Result};
pub use path::ProjectPath;
