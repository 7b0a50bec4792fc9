//! Nodes returned from document reads

use crate::value::{Mapping, Scalar, Value, ValueKind};

/// Source formatting captured when a node was read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Formatting {
    /// The node's text exactly as written in the source (quotes included).
    pub repr: Option<String>,
    /// Trailing same-line comment, including the `#`.
    pub comment: Option<String>,
}

/// A document node: a value tree with formatting attached at every level.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar {
        value: Scalar,
        formatting: Formatting,
    },
    Sequence {
        items: Vec<Node>,
        formatting: Formatting,
    },
    Mapping {
        entries: Vec<(String, Node)>,
        formatting: Formatting,
    },
}

impl Node {
    pub fn kind(&self) -> ValueKind {
        match self {
            Node::Scalar { .. } => ValueKind::Scalar,
            Node::Sequence { .. } => ValueKind::Sequence,
            Node::Mapping { .. } => ValueKind::Mapping,
        }
    }

    pub fn formatting(&self) -> &Formatting {
        match self {
            Node::Scalar { formatting, .. }
            | Node::Sequence { formatting, .. }
            | Node::Mapping { formatting, .. } => formatting,
        }
    }

    /// Strip formatting, leaving the plain value tree.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Scalar { value, .. } => Value::Scalar(value.clone()),
            Node::Sequence { items, .. } => {
                Value::Sequence(items.iter().map(Node::to_value).collect())
            }
            Node::Mapping { entries, .. } => Value::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<Mapping>(),
            ),
        }
    }

    /// Number of entries or items; zero for scalars.
    pub fn len(&self) -> usize {
        match self {
            Node::Scalar { .. } => 0,
            Node::Sequence { items, .. } => items.len(),
            Node::Mapping { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Node::Scalar {
                value: Scalar::Null,
                ..
            }
        )
    }
}
