//! Planning and execution of tool configuration changes
//!
//! [`ApplyPlanner`] turns add/remove requests into a [`MergePlan`] grouped
//! by file, executes it against the project's files with
//! [`toolfit_merge::FragmentMerger`] and [`toolfit_deps::DependencySync`],
//! and records what was done in the persisted [`ApplyState`].

pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod planner;
pub mod report;
pub mod state;
pub mod vcs;

pub use config::{CONFIG_FILE, EngineConfig};
pub use error::{Error, Result};
pub use plan::{Action, FilePlan, MergePlan, Operation, PlanEntry, Request};
pub use planner::ApplyPlanner;
pub use report::{DependencyReport, ExecutionReport, FileReport, Outcome, ToolOutcome, WriteStatus};
pub use state::{ApplyRecord, ApplyState, FileState};
pub use vcs::{NoVcs, VcsStatus};
