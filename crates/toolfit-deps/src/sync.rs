//! Reconciling tool dependency declarations with a manifest

use std::fmt;

use serde::Serialize;
use toolfit_tools::{DependencyDecl, Tool};

use crate::error::{Error, Result};
use crate::index::PackageIndex;
use crate::manifest::{Attribution, DependencyManifest, GroupEntry};
use crate::requirement::{Requirement, normalize_name};
use crate::version::VersionConstraint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Add,
    Remove,
}

/// Why an entry stayed after its tool was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RetainReason {
    /// The entry was in the manifest before any tool asked for it
    UserOwned,
    RequiredBy { tools: Vec<String> },
}

impl fmt::Display for RetainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserOwned => f.write_str("it was declared by the project"),
            Self::RequiredBy { tools } => write!(f, "still required by {}", tools.join(", ")),
        }
    }
}

/// A change (or deliberate non-change) made to one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SyncEvent {
    Added {
        group: String,
        requirement: String,
    },
    Narrowed {
        group: String,
        package: String,
        from: String,
        to: String,
    },
    Kept {
        group: String,
        requirement: String,
    },
    Removed {
        group: String,
        requirement: String,
    },
    Retained {
        group: String,
        requirement: String,
        reason: RetainReason,
    },
}

impl SyncEvent {
    /// True for events that edited the manifest.
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Added { .. } | Self::Narrowed { .. } | Self::Removed { .. }
        )
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { group, requirement } => write!(f, "added '{requirement}' to {group}"),
            Self::Narrowed { group, from, to, .. } => {
                write!(f, "narrowed '{from}' to '{to}' in {group}")
            }
            Self::Kept { group, requirement } => {
                write!(f, "kept '{requirement}' in {group}")
            }
            Self::Removed { group, requirement } => {
                write!(f, "removed '{requirement}' from {group}")
            }
            Self::Retained {
                group,
                requirement,
                reason,
            } => write!(f, "kept '{requirement}' in {group}: {reason}"),
        }
    }
}

/// Result of syncing one tool.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub events: Vec<SyncEvent>,
    /// Per-dependency failures; other dependencies were still processed
    pub errors: Vec<Error>,
}

impl SyncOutcome {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn changed(&self) -> bool {
        self.events.iter().any(SyncEvent::is_change)
    }
}

/// Folds tool dependency declarations into a [`DependencyManifest`].
#[derive(Default)]
pub struct DependencySync<'a> {
    index: Option<&'a dyn PackageIndex>,
}

impl<'a> DependencySync<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve unconstrained declarations to `>=<latest>` through `index`.
    pub fn with_index(index: &'a dyn PackageIndex) -> Self {
        Self { index: Some(index) }
    }

    pub fn sync(
        &self,
        manifest: &mut DependencyManifest,
        tool: &Tool,
        action: SyncAction,
    ) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        match action {
            SyncAction::Add => {
                for decl in &tool.dependencies {
                    match self.add(manifest, &tool.name, decl) {
                        Ok(event) => outcome.events.push(event),
                        Err(err) => {
                            tracing::warn!(tool = %tool.name, package = %decl.package, error = %err, "Dependency not synced");
                            outcome.errors.push(err);
                        }
                    }
                }
            }
            SyncAction::Remove => outcome.events = remove(manifest, &tool.name),
        }
        for event in &outcome.events {
            tracing::debug!(tool = %tool.name, %event, "Dependency sync");
        }
        outcome
    }

    fn requested(&self, decl: &DependencyDecl) -> Option<String> {
        decl.constraint.clone().or_else(|| {
            self.index?
                .latest_version(&decl.package)
                .map(|version| format!(">={version}"))
        })
    }

    fn add(
        &self,
        manifest: &mut DependencyManifest,
        tool: &str,
        decl: &DependencyDecl,
    ) -> Result<SyncEvent> {
        let package = normalize_name(&decl.package);
        let group = decl.group.clone();
        let requested = self.requested(decl);

        let Some(entry) = manifest.find_mut(&group, &package) else {
            let mut requirement = Requirement::new(decl.package.clone());
            requirement.extras = decl.extras.clone();
            requirement.constraint = requested;
            let text = requirement.to_string();
            manifest
                .ensure_group(&group)
                .push(GroupEntry::from_requirement(requirement));

            let attributions = manifest.attributions_mut();
            attributions
                .entries
                .retain(|a| !(a.group == group && a.package == package));
            attributions.entries.push(Attribution {
                group: group.clone(),
                package,
                tools: vec![tool.to_string()],
                user_owned: false,
            });
            return Ok(SyncEvent::Added {
                group,
                requirement: text,
            });
        };

        let GroupEntry::Requirement { text, requirement } = entry.clone() else {
            return Err(Error::InvalidRequirement {
                requirement: package,
                reason: "entry is not a requirement string".to_string(),
            });
        };

        let mut updated = requirement.clone();
        updated.constraint = combine(tool, &group, &requirement, requested.as_deref())?;
        updated.merge_extras(&decl.extras);

        let event = if updated == requirement {
            SyncEvent::Kept {
                group: group.clone(),
                requirement: text,
            }
        } else {
            let to = updated.to_string();
            *entry = GroupEntry::from_requirement(updated);
            SyncEvent::Narrowed {
                group: group.clone(),
                package: package.clone(),
                from: text,
                to,
            }
        };

        let attributions = manifest.attributions_mut();
        match attributions.get_mut(&group, &package) {
            Some(record) => {
                if !record.tools.iter().any(|t| t == tool) {
                    record.tools.push(tool.to_string());
                }
            }
            None => attributions.entries.push(Attribution {
                group,
                package,
                tools: vec![tool.to_string()],
                user_owned: true,
            }),
        }
        Ok(event)
    }
}

/// The constraint an existing requirement should carry once `requested`
/// is taken into account.
///
/// The narrower of the two wins, the existing text is kept when it already
/// is the narrower one, overlapping ranges are intersected.
fn combine(
    tool: &str,
    group: &str,
    current: &Requirement,
    requested: Option<&str>,
) -> Result<Option<String>> {
    let Some(requested) = requested else {
        return Ok(current.constraint.clone());
    };
    if current.url.is_some() {
        return Ok(current.constraint.clone());
    }
    let wanted = VersionConstraint::parse(requested)?;
    let have = match current.version_constraint() {
        None => return Ok(Some(requested.to_string())),
        Some(Ok(have)) => have,
        // Specifiers we cannot reason about stay as the project wrote them.
        Some(Err(_)) => return Ok(current.constraint.clone()),
    };

    if have.is_subset_of(&wanted) {
        Ok(current.constraint.clone())
    } else if wanted.is_subset_of(&have) {
        Ok(Some(requested.to_string()))
    } else {
        have.intersect(&wanted)
            .map(|both| Some(both.as_str().to_string()))
            .ok_or_else(|| Error::IncompatibleConstraint {
                tool: tool.to_string(),
                group: group.to_string(),
                package: current.normalized_name(),
                existing: have.as_str().to_string(),
                requested: requested.to_string(),
            })
    }
}

/// Drop `tool`'s attributions and delete the entries it alone introduced.
fn remove(manifest: &mut DependencyManifest, tool: &str) -> Vec<SyncEvent> {
    let owned: Vec<Attribution> = manifest.attributions().owned_by(tool).cloned().collect();
    let mut events = Vec::new();

    for record in owned {
        let attributions = manifest.attributions_mut();
        let others: Vec<String> = record.tools.iter().filter(|t| *t != tool).cloned().collect();
        if others.is_empty() {
            attributions
                .entries
                .retain(|a| !(a.group == record.group && a.package == record.package));
        } else if let Some(live) = attributions.get_mut(&record.group, &record.package) {
            live.tools.retain(|t| t != tool);
        }

        let Some(requirement) = manifest.find(&record.group, &record.package) else {
            // Removed by hand since it was added.
            continue;
        };
        let text = requirement.to_string();
        let group = record.group.clone();

        if !others.is_empty() {
            events.push(SyncEvent::Retained {
                group,
                requirement: text,
                reason: RetainReason::RequiredBy { tools: others },
            });
        } else if record.user_owned {
            events.push(SyncEvent::Retained {
                group,
                requirement: text,
                reason: RetainReason::UserOwned,
            });
        } else {
            manifest.remove(&record.group, &record.package);
            events.push(SyncEvent::Removed {
                group,
                requirement: text,
            });
        }
    }
    events
}
