//! Error types for toolfit-merge

use toolfit_content::{KeyPath, Value};

/// Result type for toolfit-merge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while merging fragments
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document holds a different value where the fragment needs its own
    #[error("Merge conflict at '{path}': document has {existing}, fragment requires {requested}")]
    MergeConflict {
        path: KeyPath,
        existing: Value,
        requested: Value,
    },

    /// The fragment cannot be placed at the requested path
    #[error("Invalid fragment target '{path}': {reason}")]
    InvalidTarget { path: KeyPath, reason: String },

    #[error(transparent)]
    Content(#[from] toolfit_content::Error),
}
