//! Tool definitions for toolfit
//!
//! A [`Tool`] is immutable data: the configuration fragments it contributes
//! to project files, the packages it needs and the tools it builds on.
//! The [`ToolRegistry`] holds the catalog and orders tools by their
//! prerequisites.

pub mod error;
pub mod registry;
pub mod tool;

pub use error::{Error, Result};
pub use registry::{BUILTIN_COUNT, PRE_COMMIT_CONFIG, PYPROJECT, ToolRegistry, builtin_tools};
pub use tool::{Condition, DependencyDecl, FileFragment, Tool};
