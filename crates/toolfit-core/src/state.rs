//! Persisted record of what the engine applied
//!
//! The apply state is the source of truth for retraction: every
//! `(tool, file)` pair the engine touched keeps the [`AppliedDiff`] needed to
//! undo it. It also remembers file checksums for drift notices, which files
//! the engine created, and dependency attributions.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use toolfit_deps::Attributions;
use toolfit_fs::ProjectPath;
use toolfit_merge::AppliedDiff;

use crate::{Error, Result};

const STATE_VERSION: &str = "1";

/// What one tool contributed to one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyRecord {
    pub tool: String,
    pub file: ProjectPath,
    pub diff: AppliedDiff,
    pub applied_at: DateTime<Utc>,
}

/// Per-file bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// Checksum of the content the engine last wrote
    pub checksum: String,
    /// The file did not exist before the engine wrote it
    #[serde(default)]
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyState {
    /// State format version for forward compatibility
    version: String,
    #[serde(default)]
    records: Vec<ApplyRecord>,
    #[serde(default)]
    files: BTreeMap<ProjectPath, FileState>,
    #[serde(default)]
    dependencies: Attributions,
}

impl Default for ApplyState {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplyState {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            records: Vec::new(),
            files: BTreeMap::new(),
            dependencies: Attributions::default(),
        }
    }

    /// Load the state under a shared lock; a missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(toolfit_fs::Error::io(path, e).into()),
        };
        FileExt::lock_shared(&file).map_err(|_| toolfit_fs::Error::LockFailed {
            path: path.to_path_buf(),
        })?;

        // Read through the locked handle.
        let mut content = String::new();
        (&file)
            .read_to_string(&mut content)
            .map_err(|e| toolfit_fs::Error::io(path, e))?;

        let state: Self = serde_json::from_str(&content).map_err(|e| Error::CorruptState {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::debug!(records = state.records.len(), "Loaded apply state");
        Ok(state)
    }

    /// Save atomically (temp file + rename under an exclusive lock).
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        toolfit_fs::io::write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    pub fn records(&self) -> &[ApplyRecord] {
        &self.records
    }

    pub fn record(&self, tool: &str, file: &ProjectPath) -> Option<&ApplyRecord> {
        self.records
            .iter()
            .find(|r| r.tool == tool && &r.file == file)
    }

    pub fn records_for_tool<'a>(&'a self, tool: &'a str) -> impl Iterator<Item = &'a ApplyRecord> {
        self.records.iter().filter(move |r| r.tool == tool)
    }

    pub fn records_for_file<'a>(
        &'a self,
        file: &'a ProjectPath,
    ) -> impl Iterator<Item = &'a ApplyRecord> {
        self.records.iter().filter(move |r| &r.file == file)
    }

    /// Tools with at least one record, sorted.
    pub fn tools(&self) -> Vec<&str> {
        let mut tools: Vec<&str> = self.records.iter().map(|r| r.tool.as_str()).collect();
        tools.sort_unstable();
        tools.dedup();
        tools
    }

    pub fn is_applied(&self, tool: &str) -> bool {
        self.records.iter().any(|r| r.tool == tool)
    }

    /// Add `diff` to the record for `(tool, file)`, creating it if needed.
    ///
    /// An empty diff for an existing record leaves the record untouched.
    pub fn record_applied(&mut self, tool: &str, file: &ProjectPath, diff: AppliedDiff) {
        let now = Utc::now();
        match self
            .records
            .iter_mut()
            .find(|r| r.tool == tool && &r.file == file)
        {
            Some(_) if diff.is_empty() => {}
            Some(record) => {
                record.diff.extend(diff);
                record.applied_at = now;
            }
            None => self.records.push(ApplyRecord {
                tool: tool.to_string(),
                file: file.clone(),
                diff,
                applied_at: now,
            }),
        }
    }

    pub fn remove_record(&mut self, tool: &str, file: &ProjectPath) -> Option<ApplyRecord> {
        let pos = self
            .records
            .iter()
            .position(|r| r.tool == tool && &r.file == file)?;
        Some(self.records.remove(pos))
    }

    /// Pass containers a retracted record created, but could not remove, to
    /// the first remaining record on `file` with changes inside them. The
    /// container is then collected when that record is retracted.
    ///
    /// Returns how many containers found no new owner.
    pub fn hand_over(&mut self, file: &ProjectPath, residual: AppliedDiff) -> usize {
        let mut orphaned = 0;
        for change in residual.changes.into_iter().rev() {
            let container = change.path().clone();
            let owner = self.records.iter_mut().find(|r| {
                &r.file == file && r.diff.changes.iter().any(|c| c.path().starts_with(&container))
            });
            match owner {
                Some(record) => {
                    tracing::debug!(tool = %record.tool, path = %container, "Handed over container");
                    record.diff.changes.insert(0, change);
                }
                None => {
                    tracing::debug!(file = %file, path = %container, "Container left to the user");
                    orphaned += 1;
                }
            }
        }
        orphaned
    }

    pub fn file(&self, file: &ProjectPath) -> Option<&FileState> {
        self.files.get(file)
    }

    pub fn set_file(&mut self, file: &ProjectPath, state: FileState) {
        self.files.insert(file.clone(), state);
    }

    pub fn forget_file(&mut self, file: &ProjectPath) -> Option<FileState> {
        self.files.remove(file)
    }

    pub fn dependencies(&self) -> &Attributions {
        &self.dependencies
    }

    pub fn set_dependencies(&mut self, attributions: Attributions) {
        self.dependencies = attributions;
    }
}
