//! YAML format handler
//!
//! serde_yaml discards comments, so edits go through a lossless syntax tree
//! (see [`cst`]) that records byte spans. Each edit is a set of text splices
//! followed by a reparse; a splice that would produce invalid YAML is
//! rejected and the document is left as it was.

mod cst;
mod emit;
mod scalar;

use std::ops::Range;

use self::cst::{Kind, Tree, YNode};
use crate::error::{Error, Result};
use crate::format::{Format, FormatHandler};
use crate::node::{Formatting, Node};
use crate::path::{KeyPath, PathSegment};
use crate::value::{Mapping, Scalar, Value};

/// Handler for YAML files
#[derive(Debug, Clone)]
pub struct YamlHandler {
    source: String,
    tree: Tree,
}

/// Where a node sits relative to its parent.
#[derive(Debug, Clone, Copy)]
enum Located {
    Root,
    Entry(usize),
    Item(usize),
    FlowEntry(usize),
    FlowItem(usize),
}

type Edit = (Range<usize>, String);

fn locate<'t>(root: &'t YNode, path: &KeyPath) -> Option<(Option<&'t YNode>, Located, &'t YNode)> {
    let mut parent = None;
    let mut located = Located::Root;
    let mut node = root;

    for segment in path.segments() {
        let (next_located, child) = match (&node.kind, segment) {
            (Kind::BlockMap { entries, .. }, PathSegment::Key(k)) => {
                let i = entries.iter().position(|e| &e.key == k)?;
                (Located::Entry(i), &entries[i].slot.value)
            }
            (Kind::FlowMap(entries), PathSegment::Key(k)) => {
                let i = entries.iter().position(|e| &e.key == k)?;
                (Located::FlowEntry(i), &entries[i].value)
            }
            (Kind::BlockSeq { items, .. }, PathSegment::Index(i)) => {
                (Located::Item(*i), &items.get(*i)?.slot.value)
            }
            (Kind::FlowSeq(items), PathSegment::Index(i)) => (Located::FlowItem(*i), items.get(*i)?),
            _ => return None,
        };
        parent = Some(node);
        located = next_located;
        node = child;
    }

    Some((parent, located, node))
}

/// A flow collection with entries; an empty `[]` or `{}` is written in
/// block style once it gains entries.
fn is_filled_flow(node: &YNode) -> bool {
    match &node.kind {
        Kind::FlowMap(entries) => !entries.is_empty(),
        Kind::FlowSeq(items) => !items.is_empty(),
        _ => false,
    }
}

fn is_block_slot(located: Located) -> bool {
    matches!(located, Located::Entry(_) | Located::Item(_))
}

fn is_collection(value: &Value) -> bool {
    match value {
        Value::Mapping(m) => !m.is_empty(),
        Value::Sequence(items) => !items.is_empty(),
        Value::Scalar(_) => false,
    }
}

/// Range removed along with a flow element, including one separator.
fn flow_removal(spans: &[Range<usize>], index: usize) -> Range<usize> {
    if index + 1 < spans.len() {
        spans[index].start..spans[index + 1].start
    } else if index > 0 {
        spans[index - 1].end..spans[index].end
    } else {
        spans[index].clone()
    }
}

impl YamlHandler {
    pub fn parse(source: &str) -> Result<Self> {
        let tree = cst::parse(source).map_err(|m| Error::parse("YAML", m))?;
        if tree.root.is_some() {
            serde_yaml::from_str::<serde_yaml::Value>(source)
                .map_err(|e| Error::parse("YAML", e.to_string()))?;
        }
        Ok(Self {
            source: source.to_string(),
            tree,
        })
    }

    fn failed(path: &KeyPath, reason: impl Into<String>) -> Error {
        Error::set_failed("YAML", path, reason)
    }

    fn root(&self, path: &KeyPath) -> Result<&YNode> {
        self.tree.root.as_ref().ok_or_else(|| Error::not_found(path))
    }

    /// Apply non-overlapping splices and reparse.
    fn splice(&mut self, path: &KeyPath, mut edits: Vec<Edit>) -> Result<()> {
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        let mut text = self.source.clone();
        for (range, replacement) in edits {
            text.replace_range(range, &replacement);
        }
        let tree = cst::parse(&text)
            .map_err(|m| Self::failed(path, format!("edit produced invalid YAML: {m}")))?;
        tracing::trace!(path = %path, "YAML splice applied");
        self.source = text;
        self.tree = tree;
        Ok(())
    }

    /// Adjust block text written at the end of a source with no final newline.
    fn fit_block(&self, range: &Range<usize>, text: String) -> String {
        let src = &self.source;
        if text.is_empty() || src.is_empty() || src.ends_with('\n') || range.end != src.len() {
            return text;
        }
        let trimmed = text.strip_suffix('\n').unwrap_or(&text);
        if range.is_empty() {
            format!("\n{trimmed}")
        } else {
            trimmed.to_string()
        }
    }

    /// Widen a whole-line removal ending at EOF so no dangling newline is left.
    fn removal_range(&self, start: usize, end: usize) -> Range<usize> {
        let src = &self.source;
        if end == src.len() && !src.ends_with('\n') && start > 0 {
            (start - 1)..end
        } else {
            start..end
        }
    }

    fn slot_edits(&self, slot: &cst::Slot, head: String, body: String) -> Vec<Edit> {
        let body = self.fit_block(&slot.body, body);
        vec![(slot.head.clone(), head), (slot.body.clone(), body)]
    }

    fn to_node(&self, node: &YNode) -> Node {
        let formatting = Formatting {
            repr: (!matches!(node.kind, Kind::Empty)).then(|| self.source[node.span.clone()].to_string()),
            comment: node.comment.clone().map(|r| self.source[r].to_string()),
        };
        match &node.kind {
            Kind::Empty => Node::Scalar {
                value: Scalar::Null,
                formatting,
            },
            Kind::Scalar(s) => Node::Scalar {
                value: s.clone(),
                formatting,
            },
            Kind::BlockMap { entries, .. } => Node::Mapping {
                entries: entries
                    .iter()
                    .map(|e| (e.key.clone(), self.to_node(&e.slot.value)))
                    .collect(),
                formatting,
            },
            Kind::FlowMap(entries) => Node::Mapping {
                entries: entries
                    .iter()
                    .map(|e| (e.key.clone(), self.to_node(&e.value)))
                    .collect(),
                formatting,
            },
            Kind::BlockSeq { items, .. } => Node::Sequence {
                items: items.iter().map(|i| self.to_node(&i.slot.value)).collect(),
                formatting,
            },
            Kind::FlowSeq(items) => Node::Sequence {
                items: items.iter().map(|i| self.to_node(i)).collect(),
                formatting,
            },
        }
    }
}

impl FormatHandler for YamlHandler {
    fn format(&self) -> Format {
        Format::Yaml
    }

    fn get(&self, path: &KeyPath) -> Option<Node> {
        match self.tree.root.as_ref() {
            None => path.is_root().then(|| Node::Mapping {
                entries: Vec::new(),
                formatting: Formatting::default(),
            }),
            Some(root) => locate(root, path).map(|(_, _, node)| self.to_node(node)),
        }
    }

    fn replace(&mut self, path: &KeyPath, value: &Value) -> Result<()> {
        let root = self.root(path)?;
        let (parent, located, _) = locate(root, path).ok_or_else(|| Error::not_found(path))?;
        let style = self.tree.style;

        let edits = match (located, parent.map(|p| &p.kind)) {
            (Located::Entry(i), Some(Kind::BlockMap { indent, entries, .. })) => {
                let slot = &entries[i].slot;
                let (head, body) = if is_filled_flow(&slot.value) && is_collection(value) {
                    (format!(" {}", emit::flow(value)), String::new())
                } else {
                    emit::entry_value(value, *indent, &style)
                };
                self.slot_edits(slot, head, body)
            }
            (Located::Item(i), Some(Kind::BlockSeq { indent, gap, items, .. })) => {
                let slot = &items[i].slot;
                let (head, body) = if is_filled_flow(&slot.value) && is_collection(value) {
                    let lead = " ".repeat((*gap).max(2) - 1);
                    (format!("{lead}{}", emit::flow(value)), String::new())
                } else {
                    emit::item_value(value, *indent, *gap, &style)
                };
                self.slot_edits(slot, head, body)
            }
            (Located::FlowEntry(i), Some(Kind::FlowMap(entries))) => {
                let target = &entries[i].value;
                let text = if matches!(target.kind, Kind::Empty) {
                    format!(": {}", emit::flow(value))
                } else {
                    emit::flow(value)
                };
                vec![(target.span.clone(), text)]
            }
            (Located::FlowItem(i), Some(Kind::FlowSeq(items))) => {
                vec![(items[i].span.clone(), emit::flow(value))]
            }
            _ => return Err(Self::failed(path, "the document root cannot be replaced")),
        };

        self.splice(path, edits)
    }

    fn insert_key(
        &mut self,
        parent: &KeyPath,
        key: &str,
        value: &Value,
        after: Option<&str>,
    ) -> Result<()> {
        let style = self.tree.style;
        let target = parent.child(key);

        let Some(root) = self.tree.root.as_ref() else {
            if !parent.is_root() {
                return Err(Error::not_found(parent));
            }
            let at = self.source.len();
            let text = self.fit_block(&(at..at), emit::block_entry(key, value, 0, &style));
            return self.splice(&target, vec![(at..at, text)]);
        };

        let (_, located, node) = locate(root, parent).ok_or_else(|| Error::not_found(parent))?;
        if let Kind::FlowMap(entries) = &node.kind
            && entries.is_empty()
            && is_block_slot(located)
        {
            let mut mapping = Mapping::new();
            mapping.insert(key, value.clone());
            return self.replace(parent, &Value::Mapping(mapping));
        }
        let edits = match &node.kind {
            Kind::BlockMap { indent, entries, .. } => {
                if entries.iter().any(|e| e.key == key) {
                    return Err(Self::failed(&target, "key already exists"));
                }
                let anchor = after
                    .and_then(|a| entries.iter().find(|e| e.key == a))
                    .or(entries.last());
                let at = anchor.map(|e| e.slot.end).unwrap_or(node.span.end);
                let text = self.fit_block(&(at..at), emit::block_entry(key, value, *indent, &style));
                vec![(at..at, text)]
            }
            Kind::FlowMap(entries) => {
                if entries.iter().any(|e| e.key == key) {
                    return Err(Self::failed(&target, "key already exists"));
                }
                let pair = format!("{}: {}", emit::flow_key(key), emit::flow(value));
                let anchor = after
                    .and_then(|a| entries.iter().find(|e| e.key == a))
                    .or(entries.last());
                match anchor {
                    Some(e) => {
                        let at = e.value.span.end.max(e.span.end);
                        vec![(at..at, format!(", {pair}"))]
                    }
                    None => {
                        let at = node.span.start + 1;
                        vec![(at..at, pair)]
                    }
                }
            }
            _ => return Err(Self::failed(&target, "parent is not a mapping")),
        };

        self.splice(&target, edits)
    }

    fn insert_element(&mut self, sequence: &KeyPath, index: usize, value: &Value) -> Result<()> {
        let style = self.tree.style;
        let root = self.root(sequence)?;
        let (_, located, node) = locate(root, sequence).ok_or_else(|| Error::not_found(sequence))?;
        let target = sequence.index(index);
        if let Kind::FlowSeq(items) = &node.kind
            && items.is_empty()
            && index == 0
            && is_block_slot(located)
        {
            return self.replace(sequence, &Value::Sequence(vec![value.clone()]));
        }

        let edits = match &node.kind {
            Kind::BlockSeq {
                indent,
                gap,
                compact,
                items,
            } => {
                if index > items.len() {
                    return Err(Self::failed(&target, "index out of range"));
                }
                let at = match items.get(index) {
                    Some(item) => item.slot.removal_start,
                    None => items.last().map(|i| i.slot.end).unwrap_or(node.span.end),
                };
                let item = emit::block_item(value, *indent, *gap, &style);
                let text = if *compact && index == 0 {
                    // Take over the outer dash line and push the old first
                    // item down to its own line.
                    format!("{}{}", &item[*indent..], " ".repeat(*indent))
                } else {
                    self.fit_block(&(at..at), item)
                };
                vec![(at..at, text)]
            }
            Kind::FlowSeq(items) => {
                if index > items.len() {
                    return Err(Self::failed(&target, "index out of range"));
                }
                let rendered = emit::flow(value);
                match (items.get(index), items.last()) {
                    (Some(next), _) => {
                        let at = next.span.start;
                        vec![(at..at, format!("{rendered}, "))]
                    }
                    (None, Some(last)) => {
                        let at = last.span.end;
                        vec![(at..at, format!(", {rendered}"))]
                    }
                    (None, None) => {
                        let at = node.span.start + 1;
                        vec![(at..at, rendered)]
                    }
                }
            }
            _ => return Err(Self::failed(&target, "parent is not a sequence")),
        };

        self.splice(&target, edits)
    }

    fn remove(&mut self, path: &KeyPath) -> Result<()> {
        let root = self.root(path)?;
        let (parent, located, _) = locate(root, path).ok_or_else(|| Error::not_found(path))?;
        let parent_path = path
            .parent()
            .ok_or_else(|| Self::failed(path, "the document root cannot be removed"))?;

        let edits = match (located, parent.map(|p| &p.kind)) {
            (Located::Entry(i), Some(Kind::BlockMap { entries, compact, .. })) => {
                if entries.len() == 1 && !parent_path.is_root() {
                    // A block mapping cannot be empty; collapse it to `{}`.
                    return self.replace(&parent_path, &Value::empty_mapping());
                }
                if i == 0 && *compact {
                    vec![(entries[0].key_span.start..entries[1].key_span.start, String::new())]
                } else {
                    let slot = &entries[i].slot;
                    let start = if entries.len() == 1 {
                        // Comments above the last key stay with the file.
                        line_start(&self.source, entries[i].key_span.start)
                    } else {
                        slot.removal_start
                    };
                    vec![(self.removal_range(start, slot.end), String::new())]
                }
            }
            (Located::Item(i), Some(Kind::BlockSeq { items, compact, .. })) => {
                if items.len() == 1 && !parent_path.is_root() {
                    return self.replace(&parent_path, &Value::Sequence(Vec::new()));
                }
                if i == 0 && *compact {
                    let dash = |item: &cst::Item| item.slot.head.start - 1;
                    vec![(dash(&items[0])..dash(&items[1]), String::new())]
                } else {
                    let slot = &items[i].slot;
                    vec![(self.removal_range(slot.removal_start, slot.end), String::new())]
                }
            }
            (Located::FlowEntry(i), Some(Kind::FlowMap(entries))) => {
                let spans: Vec<Range<usize>> = entries
                    .iter()
                    .map(|e| e.span.start..e.value.span.end.max(e.span.end))
                    .collect();
                vec![(flow_removal(&spans, i), String::new())]
            }
            (Located::FlowItem(i), Some(Kind::FlowSeq(items))) => {
                let spans: Vec<Range<usize>> = items.iter().map(|n| n.span.clone()).collect();
                vec![(flow_removal(&spans, i), String::new())]
            }
            _ => return Err(Error::not_found(path)),
        };

        self.splice(path, edits)
    }

    fn render(&self) -> String {
        self.source.clone()
    }

    fn normalize(&self) -> Result<serde_json::Value> {
        if self.tree.root.is_none() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&self.source).map_err(|e| Error::parse("YAML", e.to_string()))?;
        yaml_to_json(yaml).map_err(|m| Error::parse("YAML", m))
    }
}

fn line_start(src: &str, at: usize) -> usize {
    src[..at].rfind('\n').map_or(0, |n| n + 1)
}

fn yaml_to_json(value: serde_yaml::Value) -> std::result::Result<serde_json::Value, String> {
    use serde_yaml::Value as Y;

    Ok(match value {
        Y::Null => serde_json::Value::Null,
        Y::Bool(b) => serde_json::Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Y::String(s) => serde_json::Value::String(s),
        Y::Sequence(items) => serde_json::Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<std::result::Result<_, _>>()?,
        ),
        Y::Mapping(map) => {
            let mut object = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    Y::String(s) => s,
                    Y::Bool(b) => b.to_string(),
                    Y::Number(n) => n.to_string(),
                    Y::Null => "null".to_string(),
                    _ => return Err("mapping keys must be scalars".to_string()),
                };
                object.insert(key, yaml_to_json(v)?);
            }
            serde_json::Value::Object(object)
        }
        Y::Tagged(_) => return Err("tagged values are not supported".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn path(p: &str) -> KeyPath {
        KeyPath::parse(p).unwrap()
    }

    fn handler(src: &str) -> YamlHandler {
        YamlHandler::parse(src).unwrap()
    }

    #[test]
    fn roundtrip_is_byte_identical() {
        let src = "# banner\n\nrepos:  # list\n  - repo: local   # inline\n    hooks:\n      - id: x\n";
        assert_eq!(handler(src).render(), src);
    }

    #[test]
    fn get_reports_repr_and_comment() {
        let h = handler("name: 'demo'  # the name\n");
        let node = h.get(&path("name")).unwrap();
        assert_eq!(node.to_value(), Value::from("demo"));
        assert_eq!(node.formatting().repr.as_deref(), Some("'demo'"));
        assert_eq!(node.formatting().comment.as_deref(), Some("# the name"));
    }

    #[test]
    fn replace_scalar_keeps_comment() {
        let mut h = handler("a: 1  # keep\nb: 2\n");
        h.replace(&path("a"), &Value::from(5)).unwrap();
        assert_eq!(h.render(), "a: 5  # keep\nb: 2\n");
    }

    #[test]
    fn replace_scalar_with_mapping() {
        let mut h = handler("a: 1\nb: 2\n");
        h.replace(&path("a"), &Value::from(json!({"x": 1}))).unwrap();
        assert_eq!(h.render(), "a:\n  x: 1\nb: 2\n");
    }

    #[test]
    fn replace_null_at_eof_without_newline() {
        let mut h = handler("a: 1\nb:");
        h.replace(&path("b"), &Value::from(json!(["x"]))).unwrap();
        assert_eq!(h.render(), "a: 1\nb:\n  - x");
    }

    #[test]
    fn insert_key_after_anchor() {
        let mut h = handler("a: 1\nc: 3\n");
        h.insert_key(&KeyPath::root(), "b", &Value::from(2), Some("a"))
            .unwrap();
        assert_eq!(h.render(), "a: 1\nb: 2\nc: 3\n");
    }

    #[test]
    fn insert_key_into_empty_document() {
        let mut h = handler("# only a comment\n");
        h.insert_key(&KeyPath::root(), "a", &Value::from(json!({"b": true})), None)
            .unwrap();
        assert_eq!(h.render(), "# only a comment\na:\n  b: true\n");
    }

    #[test]
    fn delete_takes_comment_directly_above_first_key() {
        let mut h = handler("# about a\na: 1\nb: 2\n");
        h.remove(&path("a")).unwrap();
        assert_eq!(h.render(), "b: 2\n");

        let mut h = handler("# banner\n\na: 1\nb: 2\n");
        h.remove(&path("a")).unwrap();
        assert_eq!(h.render(), "# banner\n\nb: 2\n");
    }

    #[test]
    fn delete_last_key_keeps_leading_comment() {
        let mut h = handler("# only a comment\n");
        h.insert_key(&KeyPath::root(), "a", &Value::from(1), None).unwrap();
        h.remove(&path("a")).unwrap();
        assert_eq!(h.render(), "# only a comment\n");
    }

    #[test]
    fn insert_key_rejects_existing() {
        let mut h = handler("a: 1\n");
        assert!(h.insert_key(&KeyPath::root(), "a", &Value::from(2), None).is_err());
    }

    #[test]
    fn append_item_in_document_style() {
        let src = "repos:\n-   repo: a\n    rev: v1\n";
        let mut h = handler(src);
        h.insert_element(&path("repos"), 1, &Value::from(json!({"repo": "b", "rev": "v2"})))
            .unwrap();
        assert_eq!(
            h.render(),
            "repos:\n-   repo: a\n    rev: v1\n-   repo: b\n    rev: v2\n"
        );
    }

    #[test]
    fn insert_item_before_index_goes_above_its_comments() {
        let src = "l:\n  - a\n  # about b\n  - b\n";
        let mut h = handler(src);
        h.insert_element(&path("l"), 1, &Value::from("new")).unwrap();
        assert_eq!(h.render(), "l:\n  - a\n  - new\n  # about b\n  - b\n");
    }

    #[test]
    fn flow_sequence_edits() {
        let mut h = handler("types: [python, pyi]\n");
        h.insert_element(&path("types"), 2, &Value::from("jupyter"))
            .unwrap();
        assert_eq!(h.render(), "types: [python, pyi, jupyter]\n");
        h.remove(&path("types[0]")).unwrap();
        assert_eq!(h.render(), "types: [pyi, jupyter]\n");
        h.remove(&path("types[1]")).unwrap();
        assert_eq!(h.render(), "types: [pyi]\n");
    }

    #[test]
    fn empty_flow_sequence_becomes_block() {
        let mut h = handler("repos: []\n");
        h.insert_element(&path("repos"), 0, &Value::from(json!({"repo": "local"})))
            .unwrap();
        assert_eq!(h.render(), "repos:\n  - repo: local\n");
        h.remove(&path("repos[0]")).unwrap();
        assert_eq!(h.render(), "repos: []\n");
    }

    #[test]
    fn remove_entry_takes_dedicated_comments() {
        let src = "a: 1\n# about b\nb: 2\nc: 3\n";
        let mut h = handler(src);
        h.remove(&path("b")).unwrap();
        assert_eq!(h.render(), "a: 1\nc: 3\n");
    }

    #[test]
    fn remove_last_nested_entry_collapses_mapping() {
        let mut h = handler("tool:\n  x: 1\nother: 2\n");
        h.remove(&path("tool.x")).unwrap();
        assert_eq!(h.render(), "tool: {}\nother: 2\n");
    }

    #[test]
    fn remove_first_entry_of_compact_item() {
        let mut h = handler("l:\n  - id: a\n    name: b\n");
        h.remove(&path("l[0].id")).unwrap();
        assert_eq!(h.render(), "l:\n  - name: b\n");
    }

    #[test]
    fn remove_last_line_without_newline() {
        let mut h = handler("a: 1\nb: 2");
        h.remove(&path("b")).unwrap();
        assert_eq!(h.render(), "a: 1");
    }

    #[test]
    fn normalize_empty_is_empty_mapping() {
        assert_eq!(handler("").normalize().unwrap(), json!({}));
        assert_eq!(
            handler("a: [1, {b: null}]\n").normalize().unwrap(),
            json!({"a": [1, {"b": null}]})
        );
    }
}
