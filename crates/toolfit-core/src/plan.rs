//! Merge plans: what will be done to which file, in which order

use toolfit_content::KeyPath;
use toolfit_fs::ProjectPath;
use toolfit_merge::{AppliedDiff, Fragment};

use crate::report::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Remove,
}

/// A caller's request to add or remove one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub tool: String,
    pub action: Action,
}

impl Request {
    pub fn add(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            action: Action::Add,
        }
    }

    pub fn remove(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            action: Action::Remove,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Apply { path: KeyPath, fragment: Fragment },
    /// Undo a recorded diff
    Retract { diff: AppliedDiff },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub tool: String,
    pub operation: Operation,
}

/// Every operation on one file, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePlan {
    pub file: ProjectPath,
    pub entries: Vec<PlanEntry>,
}

/// The full plan for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    /// Files in first-touched order
    pub files: Vec<FilePlan>,
    /// Tools in execution order: removals (dependents first), then additions
    /// (prerequisites first)
    pub steps: Vec<(String, Action)>,
    /// Outcomes settled at plan time, such as removals with nothing recorded
    pub settled: Vec<(String, Option<ProjectPath>, Outcome)>,
}

impl MergePlan {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.steps.is_empty()
    }

    pub fn file(&self, file: &ProjectPath) -> Option<&FilePlan> {
        self.files.iter().find(|p| &p.file == file)
    }

    pub(crate) fn push(&mut self, file: &ProjectPath, entry: PlanEntry) {
        match self.files.iter_mut().find(|p| &p.file == file) {
            Some(plan) => plan.entries.push(entry),
            None => self.files.push(FilePlan {
                file: file.clone(),
                entries: vec![entry],
            }),
        }
    }
}
