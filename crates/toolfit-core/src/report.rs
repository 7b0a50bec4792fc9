//! Outcome of executing a merge plan

use std::fmt;

use serde::Serialize;
use toolfit_deps::SyncEvent;

/// What happened to one tool on one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    Applied { changes: usize },
    /// Everything the fragment asks for is already present
    AlreadyApplied,
    Conflict { path: String, message: String },
    Removed { undone: usize, warnings: Vec<String> },
    /// Removal requested but nothing was recorded for the tool
    NotFound,
    /// Another tool's conflict stopped the file from being written
    Blocked { by: String },
    Skipped { reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Blocked { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied { changes } => write!(f, "applied ({changes} changes)"),
            Self::AlreadyApplied => f.write_str("already applied"),
            Self::Conflict { message, .. } => write!(f, "conflict: {message}"),
            Self::Removed { undone, warnings } if warnings.is_empty() => {
                write!(f, "removed ({undone} changes undone)")
            }
            Self::Removed { undone, warnings } => write!(
                f,
                "removed ({undone} changes undone, {} kept)",
                warnings.len()
            ),
            Self::NotFound => f.write_str("not applied"),
            Self::Blocked { by } => write!(f, "blocked by a conflict in {by}"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutcome {
    pub tool: String,
    /// `None` for outcomes that concern the tool as a whole
    pub file: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum WriteStatus {
    Written,
    Created,
    /// An engine-created file left empty by retraction
    Deleted,
    Unchanged,
    /// Dry run; the file would have been written
    Pending,
    Blocked,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub file: String,
    #[serde(flatten)]
    pub status: WriteStatus,
    /// Unified diff of the change, in dry runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub tool: String,
    #[serde(flatten)]
    pub event: SyncEvent,
}

/// Everything a caller needs to present the result of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub dry_run: bool,
    pub outcomes: Vec<ToolOutcome>,
    pub files: Vec<FileReport>,
    pub dependencies: Vec<DependencyReport>,
    pub dependency_errors: Vec<String>,
    pub notices: Vec<String>,
}

impl ExecutionReport {
    pub(crate) fn outcome(&mut self, tool: &str, file: Option<&str>, outcome: Outcome) {
        self.outcomes.push(ToolOutcome {
            tool: tool.to_string(),
            file: file.map(str::to_string),
            outcome,
        });
    }

    pub(crate) fn notice(&mut self, notice: impl Into<String>) {
        let notice = notice.into();
        tracing::info!("{notice}");
        self.notices.push(notice);
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| !o.outcome.is_failure())
            && self.dependency_errors.is_empty()
            && !self.has_write_failures()
    }

    pub fn has_write_failures(&self) -> bool {
        self.files
            .iter()
            .any(|f| matches!(f.status, WriteStatus::Failed { .. }))
    }

    /// Process exit code: 0 on success, 2 when a write failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else if self.has_write_failures() {
            2
        } else {
            1
        }
    }

    pub fn file(&self, file: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.file == file)
    }

    /// Outcomes recorded for one tool, in plan order.
    pub fn outcomes_for<'a>(&'a self, tool: &'a str) -> impl Iterator<Item = &'a ToolOutcome> {
        self.outcomes.iter().filter(move |o| o.tool == tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_succeeds() {
        let report = ExecutionReport::default();
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn conflict_fails_with_code_one() {
        let mut report = ExecutionReport::default();
        report.outcome(
            "ruff",
            Some("pyproject.toml"),
            Outcome::Conflict {
                path: "tool.ruff.target-version".into(),
                message: "differs".into(),
            },
        );
        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn write_failure_has_its_own_code() {
        let mut report = ExecutionReport::default();
        report.files.push(FileReport {
            file: "pyproject.toml".into(),
            status: WriteStatus::Failed {
                error: "read-only".into(),
            },
            diff: None,
        });
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn serializes_flat() {
        let outcome = ToolOutcome {
            tool: "ruff".into(),
            file: None,
            outcome: Outcome::NotFound,
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"tool": "ruff", "file": null, "outcome": "not-found"})
        );
    }
}
