//! Per-path merge annotations

use std::collections::{BTreeMap, BTreeSet};

use toolfit_content::KeyPath;

/// How a sequence in a fragment combines with an existing sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SequenceMode {
    /// The sequence is one value; any difference is a conflict.
    #[default]
    Atomic,
    /// Union by value: existing order, then new values in fragment order.
    Set,
    /// Missing values are placed next to their fragment neighbours.
    Ordered,
}

/// Merge annotations keyed by absolute document path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeRules {
    overridable: BTreeSet<KeyPath>,
    sequences: BTreeMap<KeyPath, SequenceMode>,
    placement: BTreeMap<KeyPath, String>,
}

impl MergeRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the fragment win over a differing value at `path`.
    pub fn overridable(mut self, path: KeyPath) -> Self {
        self.overridable.insert(path);
        self
    }

    /// Treat the sequence at `path` as a set.
    pub fn set(mut self, path: KeyPath) -> Self {
        self.sequences.insert(path, SequenceMode::Set);
        self
    }

    /// Treat the sequence at `path` as an ordered list.
    pub fn ordered(mut self, path: KeyPath) -> Self {
        self.sequences.insert(path, SequenceMode::Ordered);
        self
    }

    /// Insert the key at `path`, when new, directly after sibling `key`.
    pub fn place_after(mut self, path: KeyPath, key: impl Into<String>) -> Self {
        self.placement.insert(path, key.into());
        self
    }

    pub fn is_overridable(&self, path: &KeyPath) -> bool {
        self.overridable.contains(path)
    }

    pub fn sequence_mode(&self, path: &KeyPath) -> SequenceMode {
        self.sequences.get(path).copied().unwrap_or_default()
    }

    pub fn placement(&self, path: &KeyPath) -> Option<&str> {
        self.placement.get(path).map(String::as_str)
    }
}
