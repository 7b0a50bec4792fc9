//! PEP 735 dependency groups and who asked for each entry

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use toolfit_content::{Document, KeyPath, Value};

use crate::error::{Error, Result};
use crate::requirement::{Requirement, normalize_name};

/// Top-level table holding the dependency groups.
pub const DEPENDENCY_GROUPS: &str = "dependency-groups";

/// The tools that asked for one entry of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub group: String,
    /// Normalized package name
    pub package: String,
    pub tools: Vec<String>,
    /// The entry existed before any tool asked for it
    #[serde(default)]
    pub user_owned: bool,
}

/// Persisted provenance of engine-managed dependency entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Attributions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<Attribution>,
    /// Groups the engine created and may delete once empty
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub created_groups: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub created_table: bool,
}

impl Attributions {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.created_groups.is_empty() && !self.created_table
    }

    pub fn get(&self, group: &str, package: &str) -> Option<&Attribution> {
        self.entries
            .iter()
            .find(|a| same_name(&a.group, group) && a.package == package)
    }

    pub(crate) fn get_mut(&mut self, group: &str, package: &str) -> Option<&mut Attribution> {
        self.entries
            .iter_mut()
            .find(|a| same_name(&a.group, group) && a.package == package)
    }

    /// Entries `tool` is attributed on.
    pub fn owned_by<'a>(&'a self, tool: &'a str) -> impl Iterator<Item = &'a Attribution> {
        self.entries
            .iter()
            .filter(move |a| a.tools.iter().any(|t| t == tool))
    }
}

/// One element of a dependency group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupEntry {
    Requirement {
        /// Text as it appears in the file
        text: String,
        requirement: Requirement,
    },
    /// `{include-group = "..."}` tables and strings that do not parse
    Other(Value),
}

impl GroupEntry {
    pub fn from_requirement(requirement: Requirement) -> Self {
        Self::Requirement {
            text: requirement.to_string(),
            requirement,
        }
    }

    fn from_value(value: Value) -> Self {
        if let Some(text) = value.as_str()
            && let Ok(requirement) = Requirement::parse(text)
        {
            return Self::Requirement {
                text: text.to_string(),
                requirement,
            };
        }
        Self::Other(value)
    }

    pub fn requirement(&self) -> Option<&Requirement> {
        match self {
            Self::Requirement { requirement, .. } => Some(requirement),
            Self::Other(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Requirement { text, .. } => Value::string(text.clone()),
            Self::Other(value) => value.clone(),
        }
    }

    /// Normalized package name, or the raw value for other entries.
    fn key(&self) -> String {
        match self {
            Self::Requirement { requirement, .. } => requirement.normalized_name(),
            Self::Other(value) => value.to_string(),
        }
    }
}

fn same_name(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}

/// The dependency groups of a project manifest plus their attributions.
#[derive(Debug, Clone, Default)]
pub struct DependencyManifest {
    groups: Vec<(String, Vec<GroupEntry>)>,
    attributions: Attributions,
    table_present: bool,
}

impl DependencyManifest {
    /// Read `[dependency-groups]` from a parsed project manifest.
    pub fn from_document(doc: &Document, attributions: Attributions) -> Result<Self> {
        let table = KeyPath::root().child(DEPENDENCY_GROUPS);
        let mut manifest = Self {
            groups: Vec::new(),
            attributions,
            table_present: false,
        };

        match doc.get_value(&table) {
            None => {}
            Some(Value::Mapping(groups)) => {
                manifest.table_present = true;
                for (name, value) in groups {
                    let Value::Sequence(items) = value else {
                        return Err(Error::MalformedGroup {
                            group: name,
                            reason: format!("expected an array, found a {}", value.kind()),
                        });
                    };
                    let entries = items.into_iter().map(GroupEntry::from_value).collect();
                    manifest.groups.push((name, entries));
                }
            }
            Some(other) => {
                return Err(Error::MalformedGroup {
                    group: DEPENDENCY_GROUPS.to_string(),
                    reason: format!("expected a table, found a {}", other.kind()),
                });
            }
        }

        tracing::debug!(groups = manifest.groups.len(), "Loaded dependency groups");
        Ok(manifest)
    }

    pub fn attributions(&self) -> &Attributions {
        &self.attributions
    }

    pub(crate) fn attributions_mut(&mut self) -> &mut Attributions {
        &mut self.attributions
    }

    pub fn into_attributions(self) -> Attributions {
        self.attributions
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    pub fn group(&self, group: &str) -> Option<&[GroupEntry]> {
        self.groups
            .iter()
            .find(|(name, _)| same_name(name, group))
            .map(|(_, entries)| entries.as_slice())
    }

    /// The entry texts of a group, in file order.
    pub fn requirements(&self, group: &str) -> Vec<String> {
        self.group(group)
            .unwrap_or_default()
            .iter()
            .filter_map(|e| e.to_value().as_str().map(str::to_string))
            .collect()
    }

    /// Find a requirement by normalized package name.
    pub fn find(&self, group: &str, package: &str) -> Option<&Requirement> {
        self.group(group)?
            .iter()
            .filter_map(GroupEntry::requirement)
            .find(|r| r.normalized_name() == package)
    }

    pub(crate) fn find_mut(&mut self, group: &str, package: &str) -> Option<&mut GroupEntry> {
        self.groups
            .iter_mut()
            .find(|(name, _)| same_name(name, group))?
            .1
            .iter_mut()
            .find(|e| e.requirement().is_some_and(|r| r.normalized_name() == package))
    }

    /// The group's entries, creating the group (and the table) on demand.
    pub(crate) fn ensure_group(&mut self, group: &str) -> &mut Vec<GroupEntry> {
        if !self.table_present {
            self.table_present = true;
            self.attributions.created_table = true;
        }
        let index = match self.groups.iter().position(|(name, _)| same_name(name, group)) {
            Some(index) => index,
            None => {
                self.groups.push((group.to_string(), Vec::new()));
                self.attributions.created_groups.insert(group.to_string());
                self.groups.len() - 1
            }
        };
        &mut self.groups[index].1
    }

    /// Remove a requirement, then any engine-created group or table it leaves
    /// empty.
    pub(crate) fn remove(&mut self, group: &str, package: &str) -> Option<GroupEntry> {
        let index = self.groups.iter().position(|(name, _)| same_name(name, group))?;
        let entries = &mut self.groups[index].1;
        let at = entries
            .iter()
            .position(|e| e.requirement().is_some_and(|r| r.normalized_name() == package))?;
        let removed = entries.remove(at);

        if entries.is_empty() && self.attributions.created_groups.remove(&self.groups[index].0) {
            self.groups.remove(index);
        }
        if self.groups.is_empty() && self.attributions.created_table {
            self.attributions.created_table = false;
            self.table_present = false;
        }
        Some(removed)
    }

    /// Bring the document's `[dependency-groups]` in line with this manifest.
    ///
    /// Only changed elements are touched; unchanged entries keep their
    /// formatting and comments. Returns whether anything was edited.
    pub fn write_to(&self, doc: &mut Document) -> Result<bool> {
        let table = KeyPath::root().child(DEPENDENCY_GROUPS);
        let current = doc.get_value(&table);

        if !self.table_present {
            if current.is_some() {
                doc.delete(&table)?;
                return Ok(true);
            }
            return Ok(false);
        }

        let mut changed = false;
        if let Some(Value::Mapping(existing)) = &current {
            for name in existing.keys() {
                if !self.groups.iter().any(|(group, _)| group == name) {
                    doc.delete(&table.child(name))?;
                    changed = true;
                }
            }
        }

        for (name, entries) in &self.groups {
            let path = table.child(name.as_str());
            match doc.get_value(&path) {
                Some(Value::Sequence(items)) => {
                    changed |= reconcile(doc, &path, items, entries)?;
                }
                Some(_) => {
                    let desired = entries.iter().map(GroupEntry::to_value).collect();
                    doc.replace(&path, &Value::Sequence(desired))?;
                    changed = true;
                }
                None => {
                    let desired = entries.iter().map(GroupEntry::to_value).collect();
                    doc.set(&path, &Value::Sequence(desired))?;
                    changed = true;
                }
            }
        }

        if changed {
            tracing::debug!("Wrote dependency groups");
        }
        Ok(changed)
    }
}

/// Edit one group array element by element: drop entries that are gone,
/// replace changed ones in place and append new ones.
fn reconcile(
    doc: &mut Document,
    path: &KeyPath,
    items: Vec<Value>,
    desired: &[GroupEntry],
) -> Result<bool> {
    let mut current: Vec<GroupEntry> = items.into_iter().map(GroupEntry::from_value).collect();
    let wanted: Vec<String> = desired.iter().map(GroupEntry::key).collect();
    let mut changed = false;

    for index in (0..current.len()).rev() {
        if !wanted.contains(&current[index].key()) {
            doc.delete(&path.index(index))?;
            current.remove(index);
            changed = true;
        }
    }

    for (index, entry) in current.iter().enumerate() {
        let key = entry.key();
        if let Some(target) = desired.iter().find(|d| d.key() == key)
            && target.to_value() != entry.to_value()
        {
            doc.replace(&path.index(index), &target.to_value())?;
            changed = true;
        }
    }

    let present: Vec<String> = current.iter().map(GroupEntry::key).collect();
    for entry in desired.iter().filter(|d| !present.contains(&d.key())) {
        doc.push_element(path, &entry.to_value())?;
        changed = true;
    }
    Ok(changed)
}
