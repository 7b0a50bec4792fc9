//! Fragment application and retraction

use toolfit_content::{Document, KeyPath, PathSegment, Value};

use crate::diff::{AppliedDiff, Change, RetractOutcome, RetractWarning};
use crate::error::{Error, Result};
use crate::rules::{MergeRules, SequenceMode};

/// A format-free piece of configuration with its merge annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub value: Value,
    pub rules: MergeRules,
}

impl Fragment {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            rules: MergeRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: MergeRules) -> Self {
        self.rules = rules;
        self
    }
}

/// A primitive document edit produced by planning.
#[derive(Debug, Clone)]
enum Edit {
    InsertKey {
        parent: KeyPath,
        key: String,
        value: Value,
        after: Option<String>,
    },
    InsertElement {
        sequence: KeyPath,
        index: usize,
        value: Value,
    },
    Replace {
        path: KeyPath,
        value: Value,
    },
}

#[derive(Debug, Default)]
struct Plan {
    edits: Vec<Edit>,
    diff: AppliedDiff,
}

impl Plan {
    fn insert_key(&mut self, parent: &KeyPath, key: &str, value: &Value, after: Option<&str>) {
        self.diff.record_subtree(parent.child(key), value);
        self.edits.push(Edit::InsertKey {
            parent: parent.clone(),
            key: key.to_string(),
            value: value.clone(),
            after: after.map(str::to_string),
        });
    }

    fn insert_element(&mut self, sequence: &KeyPath, index: usize, value: &Value) {
        self.diff.changes.push(Change::InsertedElement {
            sequence: sequence.clone(),
            value: value.clone(),
        });
        self.edits.push(Edit::InsertElement {
            sequence: sequence.clone(),
            index,
            value: value.clone(),
        });
    }

    fn replace(&mut self, path: &KeyPath, previous: &Value, value: &Value) {
        self.diff.changes.push(Change::Replaced {
            path: path.clone(),
            previous: previous.clone(),
            value: value.clone(),
        });
        self.edits.push(Edit::Replace {
            path: path.clone(),
            value: value.clone(),
        });
    }
}

/// Merges fragments into documents and undoes recorded merges.
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentMerger;

impl FragmentMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge `fragment` at `path`.
    ///
    /// The whole merge is planned against the current document before any
    /// edit is made, so a conflict leaves the document untouched. Applying
    /// a fragment that is already present returns an empty diff.
    pub fn apply(&self, doc: &mut Document, path: &KeyPath, fragment: &Fragment) -> Result<AppliedDiff> {
        let mut plan = Plan::default();
        match doc.get_value(path) {
            Some(current) => plan_value(path, &current, &fragment.value, &fragment.rules, &mut plan)?,
            None => plan_missing(doc, path, &fragment.value, &fragment.rules, &mut plan)?,
        }

        if plan.edits.is_empty() {
            tracing::debug!(path = %path, "Fragment already applied");
            return Ok(plan.diff);
        }

        let snapshot = doc.serialize();
        if let Err(e) = execute(doc, &plan.edits) {
            doc.reset_to(&snapshot)?;
            return Err(e);
        }

        tracing::debug!(path = %path, changes = plan.diff.len(), "Applied fragment");
        Ok(plan.diff)
    }

    /// Undo a diff previously returned by [`apply`](Self::apply).
    ///
    /// Changes are undone newest first. A value that no longer matches what
    /// was applied is kept and reported; one that is already gone is
    /// skipped silently.
    pub fn retract(&self, doc: &mut Document, diff: &AppliedDiff) -> Result<RetractOutcome> {
        let mut outcome = RetractOutcome::default();

        for change in diff.changes.iter().rev() {
            match change {
                Change::InsertedKey { path, value } => match doc.get_value(path) {
                    None => {}
                    Some(found) if &found == value => {
                        doc.delete(path)?;
                        outcome.undone += 1;
                    }
                    Some(found) => outcome.warnings.push(RetractWarning::Modified {
                        path: path.clone(),
                        expected: value.clone(),
                        found,
                    }),
                },
                Change::InsertedElement { sequence, value } => {
                    let position = doc
                        .get_value(sequence)
                        .and_then(|v| v.as_sequence().and_then(|items| items.iter().rposition(|i| i == value)));
                    if let Some(index) = position {
                        doc.delete(&sequence.index(index))?;
                        outcome.undone += 1;
                    }
                }
                Change::CreatedMapping { path } | Change::CreatedSequence { path } => {
                    match doc.get_value(path) {
                        None => {}
                        Some(found) if is_empty_container(&found) => {
                            doc.delete(path)?;
                            outcome.undone += 1;
                        }
                        Some(_) => {
                            outcome
                                .warnings
                                .push(RetractWarning::ContainerKept { path: path.clone() });
                            outcome.kept.changes.push(change.clone());
                        }
                    }
                }
                Change::Replaced {
                    path,
                    previous,
                    value,
                } => match doc.get_value(path) {
                    None => {}
                    Some(found) if &found == value => {
                        doc.replace(path, previous)?;
                        outcome.undone += 1;
                    }
                    Some(found) => outcome.warnings.push(RetractWarning::Modified {
                        path: path.clone(),
                        expected: value.clone(),
                        found,
                    }),
                },
            }
        }

        outcome.kept.changes.reverse();
        tracing::debug!(
            undone = outcome.undone,
            warnings = outcome.warnings.len(),
            "Retracted fragment"
        );
        Ok(outcome)
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Mapping(m) => m.is_empty(),
        Value::Sequence(items) => items.is_empty(),
        Value::Scalar(_) => false,
    }
}

fn execute(doc: &mut Document, edits: &[Edit]) -> Result<()> {
    for edit in edits {
        match edit {
            Edit::InsertKey {
                parent,
                key,
                value,
                after,
            } => doc.insert_key(parent, key, value, after.as_deref())?,
            Edit::InsertElement {
                sequence,
                index,
                value,
            } => doc.insert_element(sequence, *index, value)?,
            Edit::Replace { path, value } => doc.replace(path, value)?,
        }
    }
    Ok(())
}

/// Plan a merge whose target does not exist yet by merging a wrapped
/// fragment into the deepest existing ancestor.
fn plan_missing(doc: &Document, path: &KeyPath, value: &Value, rules: &MergeRules, plan: &mut Plan) -> Result<()> {
    let mut depth = path.len().saturating_sub(1);
    while depth > 0 && !doc.contains(&path.prefix(depth)) {
        depth -= 1;
    }
    let ancestor = path.prefix(depth);
    let missing = &path.segments()[depth..];

    let mut wrapped = value.clone();
    for segment in missing.iter().rev() {
        let PathSegment::Key(key) = segment else {
            return Err(Error::InvalidTarget {
                path: path.clone(),
                reason: "missing sequence elements cannot be created".to_string(),
            });
        };
        let mut mapping = toolfit_content::Mapping::new();
        mapping.insert(key.clone(), wrapped);
        wrapped = Value::Mapping(mapping);
    }

    let current = doc.get_value(&ancestor).ok_or_else(|| Error::InvalidTarget {
        path: path.clone(),
        reason: "document has no root mapping".to_string(),
    })?;
    plan_value(&ancestor, &current, &wrapped, rules, plan)
}

fn plan_value(path: &KeyPath, current: &Value, fragment: &Value, rules: &MergeRules, plan: &mut Plan) -> Result<()> {
    if current.is_null() && !fragment.is_null() {
        // An empty YAML value is a vacancy, not a conflicting value.
        plan.replace(path, current, fragment);
        return Ok(());
    }

    match (current, fragment) {
        (Value::Mapping(existing), Value::Mapping(wanted)) => {
            for (key, value) in wanted.iter() {
                let child = path.child(key);
                match existing.get(key) {
                    Some(present) => plan_value(&child, present, value, rules, plan)?,
                    None => plan.insert_key(path, key, value, rules.placement(&child)),
                }
            }
            Ok(())
        }
        (Value::Sequence(existing), Value::Sequence(wanted))
            if rules.sequence_mode(path) != SequenceMode::Atomic =>
        {
            plan_sequence(path, existing, wanted, rules.sequence_mode(path), plan);
            Ok(())
        }
        _ if current == fragment => Ok(()),
        _ if rules.is_overridable(path) => {
            plan.replace(path, current, fragment);
            Ok(())
        }
        _ => Err(Error::MergeConflict {
            path: path.clone(),
            existing: current.clone(),
            requested: fragment.clone(),
        }),
    }
}

fn plan_sequence(path: &KeyPath, existing: &[Value], wanted: &[Value], mode: SequenceMode, plan: &mut Plan) {
    let mut working = existing.to_vec();

    for (i, value) in wanted.iter().enumerate() {
        if working.contains(value) {
            continue;
        }
        let index = match mode {
            SequenceMode::Ordered => ordered_position(&working, &wanted[..i], &wanted[i + 1..]),
            _ => working.len(),
        };
        working.insert(index, value.clone());
        plan.insert_element(path, index, value);
    }
}

/// After the nearest preceding fragment element already present, else
/// before the nearest following one, else at the end.
fn ordered_position(working: &[Value], before: &[Value], after: &[Value]) -> usize {
    let position_of = |needle: &Value| working.iter().position(|w| w == needle);
    before
        .iter()
        .rev()
        .find_map(|v| position_of(v).map(|p| p + 1))
        .or_else(|| after.iter().find_map(position_of))
        .unwrap_or(working.len())
}
