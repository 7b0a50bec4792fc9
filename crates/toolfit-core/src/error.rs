//! Error types for toolfit-core

use std::path::PathBuf;

/// Result type for toolfit-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in toolfit-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The same tool was asked to be both added and removed
    #[error("Conflicting requests for tool '{tool}'")]
    ConflictingRequests { tool: String },

    /// Invalid engine configuration
    #[error("Invalid configuration in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    /// Apply state on disk could not be read
    #[error("Corrupt apply state at {path}: {message}")]
    CorruptState { path: PathBuf, message: String },

    /// No handler for the file's extension
    #[error("Unsupported file type: {path}")]
    UnsupportedFile { path: String },

    // Transparent wrappers for underlying crate errors
    #[error(transparent)]
    Fs(#[from] toolfit_fs::Error),

    #[error(transparent)]
    Content(#[from] toolfit_content::Error),

    #[error(transparent)]
    Merge(#[from] toolfit_merge::Error),

    #[error(transparent)]
    Tools(#[from] toolfit_tools::Error),

    #[error(transparent)]
    Deps(#[from] toolfit_deps::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
