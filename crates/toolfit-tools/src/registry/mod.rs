//! Tool registry and built-in catalog

mod builtins;
mod store;

pub use builtins::{BUILTIN_COUNT, PRE_COMMIT_CONFIG, PYPROJECT, builtin_tools};
pub use store::ToolRegistry;
