//! Records of what a merge changed

use std::fmt;

use serde::{Deserialize, Serialize};
use toolfit_content::{KeyPath, Value};

/// One recorded effect of applying a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Change {
    /// A mapping that did not exist before.
    CreatedMapping { path: KeyPath },
    /// A sequence that did not exist before.
    CreatedSequence { path: KeyPath },
    /// A scalar entry added to a mapping.
    InsertedKey { path: KeyPath, value: Value },
    /// An element added to an existing or created sequence.
    InsertedElement { sequence: KeyPath, value: Value },
    /// A value overwritten by the fragment.
    Replaced {
        path: KeyPath,
        previous: Value,
        value: Value,
    },
}

impl Change {
    pub fn path(&self) -> &KeyPath {
        match self {
            Self::CreatedMapping { path }
            | Self::CreatedSequence { path }
            | Self::InsertedKey { path, .. }
            | Self::Replaced { path, .. } => path,
            Self::InsertedElement { sequence, .. } => sequence,
        }
    }
}

/// Everything one fragment application added or replaced, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliedDiff {
    pub changes: Vec<Change>,
}

impl AppliedDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn extend(&mut self, other: AppliedDiff) {
        self.changes.extend(other.changes);
    }

    /// Record a new subtree at `path`: the container itself and every
    /// entry below it. Sequence elements are recorded whole.
    pub(crate) fn record_subtree(&mut self, path: KeyPath, value: &Value) {
        match value {
            Value::Mapping(m) => {
                self.changes.push(Change::CreatedMapping { path: path.clone() });
                for (k, v) in m.iter() {
                    self.record_subtree(path.child(k), v);
                }
            }
            Value::Sequence(items) => {
                self.changes.push(Change::CreatedSequence { path: path.clone() });
                for item in items {
                    self.changes.push(Change::InsertedElement {
                        sequence: path.clone(),
                        value: item.clone(),
                    });
                }
            }
            Value::Scalar(_) => self.changes.push(Change::InsertedKey {
                path,
                value: value.clone(),
            }),
        }
    }
}

/// Something a retraction left in place because the document changed since.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RetractWarning {
    /// The value was edited after it was applied.
    Modified {
        path: KeyPath,
        expected: Value,
        found: Value,
    },
    /// A created container still holds entries added by someone else.
    ContainerKept { path: KeyPath },
}

impl fmt::Display for RetractWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modified {
                path,
                expected,
                found,
            } => write!(f, "kept '{path}': expected {expected}, found {found}"),
            Self::ContainerKept { path } => {
                write!(f, "kept '{path}': it still holds entries not added by this tool")
            }
        }
    }
}

/// Result of a retraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetractOutcome {
    /// Number of recorded changes that were undone.
    pub undone: usize,
    pub warnings: Vec<RetractWarning>,
    /// Created containers left in place because they still hold entries,
    /// in application order. Retracting this diff later removes them once
    /// they are empty.
    pub kept: AppliedDiff,
}
