//! Planning and executing tool changes
//!
//! A run has three stages. [`ApplyPlanner::plan`] resolves requests into a
//! [`MergePlan`] grouped by file. [`ApplyPlanner::execute`] loads every
//! target file, merges in memory, syncs dependencies, then writes each
//! changed file once. [`ApplyPlanner::run`] wraps both with loading and
//! saving the apply state.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::PathBuf;

use toolfit_content::{Document, Format, unified_diff};
use toolfit_deps::{DependencyManifest, DependencySync, PackageIndex, SyncAction};
use toolfit_fs::ProjectPath;
use toolfit_fs::checksum::content_checksum;
use toolfit_merge::{AppliedDiff, FragmentMerger};
use toolfit_tools::{Condition, Tool, ToolRegistry};

use crate::config::EngineConfig;
use crate::plan::{Action, MergePlan, Operation, PlanEntry, Request};
use crate::report::{DependencyReport, ExecutionReport, FileReport, Outcome, WriteStatus};
use crate::state::{ApplyState, FileState};
use crate::vcs::{NoVcs, VcsStatus};
use crate::{Error, Result};

static NO_VCS: NoVcs = NoVcs;

/// What an entry left behind for the state, once its file is written.
#[derive(Debug)]
enum Staged {
    Applied(AppliedDiff),
    Retracted,
}

/// A target file held in memory for the duration of one execution.
struct Loaded {
    path: ProjectPath,
    original: Option<String>,
    doc: Document,
    /// Tool whose conflict stopped this file from being written
    blocked: Option<String>,
    staged: Vec<(String, Staged)>,
    /// Created containers a retraction had to leave in place
    residual: AppliedDiff,
    rendered: String,
    status: Option<WriteStatus>,
}

/// Plans and executes add/remove requests against one project.
pub struct ApplyPlanner<'a> {
    root: PathBuf,
    config: EngineConfig,
    registry: &'a ToolRegistry,
    index: Option<&'a dyn PackageIndex>,
    vcs: &'a dyn VcsStatus,
    merger: FragmentMerger,
}

impl<'a> ApplyPlanner<'a> {
    pub fn new(root: impl Into<PathBuf>, config: EngineConfig, registry: &'a ToolRegistry) -> Self {
        Self {
            root: root.into(),
            config,
            registry,
            index: None,
            vcs: &NO_VCS,
            merger: FragmentMerger::new(),
        }
    }

    pub fn with_index(mut self, index: &'a dyn PackageIndex) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_vcs(mut self, vcs: &'a dyn VcsStatus) -> Self {
        self.vcs = vcs;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load state, plan, execute and save state.
    pub fn run(&self, requests: &[Request]) -> Result<ExecutionReport> {
        let state_path = self.config.state_path()?.resolve(&self.root);
        let mut state = ApplyState::load(&state_path)?;
        let before = state.clone();

        let plan = self.plan(requests, &state)?;
        let report = self.execute(&plan, &mut state)?;

        if !self.config.dry_run && state != before {
            state.save(&state_path)?;
        }
        Ok(report)
    }

    /// Resolve requests into per-file operations.
    ///
    /// Additions pull in prerequisites and run prerequisites first; removals
    /// cover only the named tools and run dependents first. Removing a tool
    /// that has nothing recorded settles as [`Outcome::NotFound`].
    pub fn plan(&self, requests: &[Request], state: &ApplyState) -> Result<MergePlan> {
        let mut adds: Vec<&str> = Vec::new();
        let mut removes: Vec<&str> = Vec::new();
        for request in requests {
            let list = match request.action {
                Action::Add => &mut adds,
                Action::Remove => &mut removes,
            };
            if !list.contains(&request.tool.as_str()) {
                list.push(request.tool.as_str());
            }
        }

        let added = self.registry.resolve(&adds)?;
        let removed = self.registry.resolve_exact(&removes)?;
        if let Some(tool) = added.iter().find(|t| removes.contains(&t.name.as_str())) {
            return Err(Error::ConflictingRequests {
                tool: tool.name.clone(),
            });
        }

        let mut plan = MergePlan::default();
        let is_named = |name: &str| added.iter().chain(&removed).any(|t| t.name == name);

        // Files the engine created for a removed tool go away with it, so
        // conditional contributions from other tools are retracted first.
        let retiring: HashSet<&ProjectPath> = removed
            .iter()
            .flat_map(|t| &t.fragments)
            .filter(|f| f.when == Condition::Always)
            .map(|f| &f.file)
            .filter(|file| state.file(file).is_some_and(|f| f.created))
            .collect();
        let mut retired: Vec<&ProjectPath> = retiring.iter().copied().collect();
        retired.sort();
        for file in retired {
            for record in state.records_for_file(file) {
                if is_named(&record.tool) || !self.only_conditional(&record.tool, file) {
                    continue;
                }
                tracing::debug!(tool = %record.tool, file = %file, "Retiring conditional fragment");
                plan.push(
                    file,
                    PlanEntry {
                        tool: record.tool.clone(),
                        operation: Operation::Retract {
                            diff: record.diff.clone(),
                        },
                    },
                );
            }
        }

        for tool in removed.iter().rev() {
            let records: Vec<_> = state.records_for_tool(&tool.name).collect();
            let owns_dependencies = state.dependencies().owned_by(&tool.name).next().is_some();
            if records.is_empty() && !owns_dependencies {
                plan.settled.push((tool.name.clone(), None, Outcome::NotFound));
                continue;
            }
            plan.steps.push((tool.name.clone(), Action::Remove));
            for record in records {
                plan.push(
                    &record.file,
                    PlanEntry {
                        tool: tool.name.clone(),
                        operation: Operation::Retract {
                            diff: record.diff.clone(),
                        },
                    },
                );
            }
        }

        let created: HashSet<&ProjectPath> = added
            .iter()
            .flat_map(|t| &t.fragments)
            .filter(|f| f.when == Condition::Always)
            .map(|f| &f.file)
            .collect();

        for tool in &added {
            plan.steps.push((tool.name.clone(), Action::Add));
            for fragment in &tool.fragments {
                let in_use = fragment.when == Condition::Always
                    || created.contains(&fragment.file)
                    || (!retiring.contains(&fragment.file) && fragment.file.resolve(&self.root).exists());
                if !in_use {
                    let already = plan.settled.iter().any(|(name, file, _)| {
                        name == &tool.name && file.as_ref() == Some(&fragment.file)
                    });
                    if !already {
                        plan.settled.push((
                            tool.name.clone(),
                            Some(fragment.file.clone()),
                            Outcome::Skipped {
                                reason: format!("{} is not in use", fragment.file),
                            },
                        ));
                    }
                    continue;
                }
                plan.push(
                    &fragment.file,
                    PlanEntry {
                        tool: tool.name.clone(),
                        operation: Operation::Apply {
                            path: fragment.path.clone(),
                            fragment: fragment.fragment.clone(),
                        },
                    },
                );
            }
        }

        // Tools applied before their conditional file existed catch up
        // when an added tool creates it.
        let mut created: Vec<&ProjectPath> = created.into_iter().collect();
        created.sort();
        for file in created {
            for name in state.tools() {
                if is_named(name) || state.record(name, file).is_some() {
                    continue;
                }
                let Some(tool) = self.registry.get(name) else {
                    continue;
                };
                for fragment in tool
                    .fragments
                    .iter()
                    .filter(|f| &f.file == file && f.when == Condition::FileExists)
                {
                    tracing::debug!(tool = %name, file = %file, "Backfilling conditional fragment");
                    plan.push(
                        file,
                        PlanEntry {
                            tool: name.to_string(),
                            operation: Operation::Apply {
                                path: fragment.path.clone(),
                                fragment: fragment.fragment.clone(),
                            },
                        },
                    );
                }
            }
        }

        tracing::info!(
            files = plan.files.len(),
            tools = plan.steps.len(),
            "Planned tool changes"
        );
        Ok(plan)
    }

    /// Whether every fragment `tool` aims at `file` is conditional on it.
    fn only_conditional(&self, tool: &str, file: &ProjectPath) -> bool {
        self.registry.get(tool).is_some_and(|t| {
            t.fragments
                .iter()
                .filter(|f| &f.file == file)
                .all(|f| f.when == Condition::FileExists)
        })
    }

    /// Execute a plan and update `state` for every file that ended up
    /// consistent on disk.
    ///
    /// Any parse error aborts before anything is written. A merge conflict
    /// blocks only its own file. Write failures are reported per file and
    /// not rolled back. In a dry run nothing is written, `state` is left
    /// alone and the report carries unified diffs.
    pub fn execute(&self, plan: &MergePlan, state: &mut ApplyState) -> Result<ExecutionReport> {
        let mut report = ExecutionReport {
            dry_run: self.config.dry_run,
            ..ExecutionReport::default()
        };
        for (tool, file, outcome) in &plan.settled {
            report.outcome(tool, file.as_ref().map(ProjectPath::as_str), outcome.clone());
        }

        let manifest_path = self.config.manifest_path()?;
        let syncs_dependencies = plan.steps.iter().any(|(name, action)| match action {
            Action::Add => self
                .registry
                .get(name)
                .is_some_and(|t| !t.dependencies.is_empty()),
            Action::Remove => state.dependencies().owned_by(name).next().is_some(),
        });

        let mut files = Vec::with_capacity(plan.files.len() + 1);
        for file_plan in &plan.files {
            files.push(self.load(&file_plan.file, state, &mut report)?);
        }
        if syncs_dependencies && !files.iter().any(|f| f.path == manifest_path) {
            files.push(self.load(&manifest_path, state, &mut report)?);
        }

        for (file_plan, loaded) in plan.files.iter().zip(files.iter_mut()) {
            let outcomes = self.merge_file(&file_plan.entries, loaded);
            for (tool, outcome) in outcomes {
                report.outcome(&tool, Some(loaded.path.as_str()), outcome);
            }
        }

        let mut attributions = None;
        if syncs_dependencies
            && let Some(loaded) = files.iter_mut().find(|f| f.path == manifest_path)
        {
            if let Some(by) = loaded.blocked.clone() {
                report.notice(format!(
                    "Dependency changes skipped: {manifest_path} is blocked by a conflict in {by}"
                ));
            } else {
                attributions = Some(self.sync_dependencies(plan, loaded, state, &mut report)?);
            }
        }

        for loaded in &mut files {
            let status = self.write(loaded, state);
            let diff = matches!(status, WriteStatus::Pending).then(|| {
                unified_diff(
                    loaded.original.as_deref().unwrap_or(""),
                    &loaded.rendered,
                    loaded.path.as_str(),
                )
            });
            report.files.push(FileReport {
                file: loaded.path.to_string(),
                status: status.clone(),
                diff,
            });
            loaded.status = Some(status);
        }

        if !self.config.dry_run {
            for loaded in files.iter_mut() {
                update_state(state, loaded);
            }
            let manifest_ok = files
                .iter()
                .find(|f| f.path == manifest_path)
                .is_some_and(|f| is_consistent(f.status.as_ref()));
            if let Some(attributions) = attributions
                && manifest_ok
            {
                state.set_dependencies(attributions);
            }
        }

        tracing::info!(
            success = report.is_success(),
            files = report.files.len(),
            "Executed plan"
        );
        Ok(report)
    }

    fn load(
        &self,
        file: &ProjectPath,
        state: &ApplyState,
        report: &mut ExecutionReport,
    ) -> Result<Loaded> {
        let format = Format::from_path(file.as_str()).ok_or_else(|| Error::UnsupportedFile {
            path: file.to_string(),
        })?;
        let path = file.resolve(&self.root);
        let original = toolfit_fs::io::read_optional(&path)?;
        let doc = Document::parse(original.as_deref().unwrap_or(""), format)?;

        if let (Some(text), Some(recorded)) = (&original, state.file(file))
            && content_checksum(text) != recorded.checksum
        {
            report.notice(format!("{file} was edited since toolfit last wrote it"));
        }
        if original.is_some() && self.vcs.is_modified(&path) {
            report.notice(format!("{file} has uncommitted changes"));
        }

        tracing::debug!(file = %file, exists = original.is_some(), "Loaded target file");
        Ok(Loaded {
            path: file.clone(),
            original,
            doc,
            blocked: None,
            staged: Vec::new(),
            residual: AppliedDiff::default(),
            rendered: String::new(),
            status: None,
        })
    }

    /// Run a file's entries in memory. The first failure blocks the file.
    fn merge_file(&self, entries: &[PlanEntry], loaded: &mut Loaded) -> Vec<(String, Outcome)> {
        let mut outcomes: Vec<(String, Outcome)> = Vec::new();

        for (position, entry) in entries.iter().enumerate() {
            let result = match &entry.operation {
                Operation::Apply { path, fragment } => self
                    .merger
                    .apply(&mut loaded.doc, path, fragment)
                    .map(|diff| {
                        let outcome = if diff.is_empty() {
                            Outcome::AlreadyApplied
                        } else {
                            Outcome::Applied {
                                changes: diff.len(),
                            }
                        };
                        loaded.staged.push((entry.tool.clone(), Staged::Applied(diff)));
                        outcome
                    }),
                Operation::Retract { diff } => {
                    self.merger.retract(&mut loaded.doc, diff).map(|retracted| {
                        loaded.staged.push((entry.tool.clone(), Staged::Retracted));
                        loaded.residual.extend(retracted.kept);
                        Outcome::Removed {
                            undone: retracted.undone,
                            warnings: retracted.warnings.iter().map(ToString::to_string).collect(),
                        }
                    })
                }
            };

            match result {
                Ok(outcome) => push_outcome(&mut outcomes, &entry.tool, outcome),
                Err(err) => {
                    let by = entry.tool.clone();
                    tracing::warn!(tool = %by, file = %loaded.path, error = %err, "Merge failed, file will not be written");

                    let path = match &err {
                        toolfit_merge::Error::MergeConflict { path, .. }
                        | toolfit_merge::Error::InvalidTarget { path, .. } => path.to_string(),
                        toolfit_merge::Error::Content(_) => String::new(),
                    };
                    outcomes.retain(|(tool, _)| tool != &by);
                    for (_, outcome) in outcomes.iter_mut() {
                        *outcome = Outcome::Blocked { by: by.clone() };
                    }
                    outcomes.push((
                        by.clone(),
                        Outcome::Conflict {
                            path,
                            message: err.to_string(),
                        },
                    ));
                    for rest in &entries[position + 1..] {
                        if !outcomes.iter().any(|(tool, _)| tool == &rest.tool) {
                            outcomes.push((rest.tool.clone(), Outcome::Blocked { by: by.clone() }));
                        }
                    }
                    loaded.staged.clear();
                    loaded.residual = AppliedDiff::default();
                    loaded.blocked = Some(by);
                    break;
                }
            }
        }

        // Later retractions in the same run may have emptied what an
        // earlier one had to keep.
        if loaded.blocked.is_none() && !loaded.residual.is_empty() {
            let residual = std::mem::take(&mut loaded.residual);
            match self.merger.retract(&mut loaded.doc, &residual) {
                Ok(second) => loaded.residual = second.kept,
                Err(err) => {
                    tracing::warn!(file = %loaded.path, error = %err, "Could not collect kept containers");
                    loaded.residual = residual;
                }
            }
        }
        outcomes
    }

    fn sync_dependencies(
        &self,
        plan: &MergePlan,
        loaded: &mut Loaded,
        state: &ApplyState,
        report: &mut ExecutionReport,
    ) -> Result<toolfit_deps::Attributions> {
        let mut manifest =
            DependencyManifest::from_document(&loaded.doc, state.dependencies().clone())?;
        let sync = match self.index {
            Some(index) => DependencySync::with_index(index),
            None => DependencySync::new(),
        };
        let conflicted: HashSet<String> = report
            .outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Conflict { .. }))
            .map(|o| o.tool.clone())
            .collect();

        for (name, action) in &plan.steps {
            if conflicted.contains(name) {
                continue;
            }
            let Some(tool) = self.registry.get(name) else {
                continue;
            };
            let tool = self.with_default_group(tool);
            let action = match action {
                Action::Add => SyncAction::Add,
                Action::Remove => SyncAction::Remove,
            };
            let outcome = sync.sync(&mut manifest, &tool, action);
            for event in outcome.events {
                report.dependencies.push(DependencyReport {
                    tool: name.clone(),
                    event,
                });
            }
            report
                .dependency_errors
                .extend(outcome.errors.iter().map(ToString::to_string));
        }

        manifest.write_to(&mut loaded.doc)?;
        Ok(manifest.into_attributions())
    }

    /// Fill in the configured group for declarations that have none.
    fn with_default_group<'t>(&self, tool: &'t Tool) -> Cow<'t, Tool> {
        if tool.dependencies.iter().all(|d| !d.group.is_empty()) {
            return Cow::Borrowed(tool);
        }
        let mut tool = tool.clone();
        for decl in &mut tool.dependencies {
            if decl.group.is_empty() {
                decl.group = self.config.default_group.clone();
            }
        }
        Cow::Owned(tool)
    }

    /// Serialize and write (or delete) one file; returns what happened.
    fn write(&self, loaded: &mut Loaded, state: &ApplyState) -> WriteStatus {
        if loaded.blocked.is_some() {
            return WriteStatus::Blocked;
        }
        loaded.rendered = loaded.doc.serialize();
        let before = loaded.original.as_deref().unwrap_or("");
        if loaded.rendered == before {
            return WriteStatus::Unchanged;
        }

        let engine_created = state.file(&loaded.path).is_some_and(|f| f.created);
        let delete = loaded.original.is_some() && engine_created && loaded.rendered.trim().is_empty();
        if self.config.dry_run {
            return WriteStatus::Pending;
        }

        let path = loaded.path.resolve(&self.root);
        let (result, status) = if delete {
            (toolfit_fs::io::remove_file(&path), WriteStatus::Deleted)
        } else if loaded.original.is_none() {
            (
                toolfit_fs::io::write_atomic(&path, loaded.rendered.as_bytes()),
                WriteStatus::Created,
            )
        } else {
            (
                toolfit_fs::io::write_atomic(&path, loaded.rendered.as_bytes()),
                WriteStatus::Written,
            )
        };

        match result {
            Ok(()) => {
                tracing::info!(file = %loaded.path, ?status, "Updated file");
                status
            }
            Err(err) => {
                tracing::error!(file = %loaded.path, error = %err, "Write failed");
                WriteStatus::Failed {
                    error: err.to_string(),
                }
            }
        }
    }
}

/// Fold a new outcome into the outcome already recorded for the same tool.
fn push_outcome(outcomes: &mut Vec<(String, Outcome)>, tool: &str, outcome: Outcome) {
    let Some((_, existing)) = outcomes.iter_mut().find(|(t, _)| t == tool) else {
        outcomes.push((tool.to_string(), outcome));
        return;
    };
    *existing = match (&*existing, outcome) {
        (Outcome::Applied { changes: a }, Outcome::Applied { changes: b }) => {
            Outcome::Applied { changes: a + b }
        }
        (Outcome::Applied { changes }, Outcome::AlreadyApplied) => Outcome::Applied {
            changes: *changes,
        },
        (_, other) => other,
    };
}

fn is_consistent(status: Option<&WriteStatus>) -> bool {
    matches!(
        status,
        Some(WriteStatus::Written | WriteStatus::Created | WriteStatus::Deleted | WriteStatus::Unchanged)
    )
}

/// Record what a successfully handled file now holds.
fn update_state(state: &mut ApplyState, loaded: &mut Loaded) {
    if !is_consistent(loaded.status.as_ref()) {
        return;
    }
    for (tool, staged) in loaded.staged.drain(..) {
        match staged {
            Staged::Applied(diff) => state.record_applied(&tool, &loaded.path, diff),
            Staged::Retracted => {
                state.remove_record(&tool, &loaded.path);
            }
        }
    }
    let residual = std::mem::take(&mut loaded.residual);
    if !residual.is_empty() {
        state.hand_over(&loaded.path, residual);
    }

    let deleted = matches!(loaded.status, Some(WriteStatus::Deleted));
    if deleted || state.records_for_file(&loaded.path).next().is_none() {
        state.forget_file(&loaded.path);
        return;
    }
    let created = matches!(loaded.status, Some(WriteStatus::Created))
        || state.file(&loaded.path).is_some_and(|f| f.created);
    state.set_file(
        &loaded.path,
        FileState {
            checksum: content_checksum(&loaded.rendered),
            created,
        },
    );
}
