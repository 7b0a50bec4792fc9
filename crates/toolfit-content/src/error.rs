//! Error types for toolfit-content

/// Result type for toolfit-content operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in toolfit-content operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse {format} content: {message}")]
    ParseError { format: String, message: String },

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid key path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    #[error("Cannot set path in {format} document: {reason}")]
    PathSetFailed {
        format: String,
        path: String,
        reason: String,
    },
}

impl Error {
    pub fn parse(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn not_found(path: impl ToString) -> Self {
        Self::PathNotFound {
            path: path.to_string(),
        }
    }

    pub fn set_failed(
        format: impl Into<String>,
        path: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::PathSetFailed {
            format: format.into(),
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
