//! Error types for toolfit-tools

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Prerequisite cycle between tools: {}", tools.join(", "))]
    DependencyCycle { tools: Vec<String> },
}
