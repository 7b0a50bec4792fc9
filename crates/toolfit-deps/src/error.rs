//! Error types for toolfit-deps

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The project pins a range that shares no version with the tool's
    #[error("Incompatible constraint for '{package}' in group '{group}': project has '{existing}', {tool} requires '{requested}'")]
    IncompatibleConstraint {
        tool: String,
        group: String,
        package: String,
        existing: String,
        requested: String,
    },

    #[error("Invalid requirement '{requirement}': {reason}")]
    InvalidRequirement { requirement: String, reason: String },

    #[error("Invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    #[error("Malformed dependency group '{group}': {reason}")]
    MalformedGroup { group: String, reason: String },

    #[error(transparent)]
    Content(#[from] toolfit_content::Error),
}
