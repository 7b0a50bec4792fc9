//! TOML format handler using toml_edit

use toml_edit::{Array, ArrayOfTables, DocumentMut, InlineTable, Item, Key, Table};

use crate::error::{Error, Result};
use crate::format::{Format, FormatHandler};
use crate::node::{Formatting, Node};
use crate::path::{KeyPath, PathSegment};
use crate::value::{Mapping, Scalar, Value};

/// Handler for TOML files using toml_edit for format preservation
#[derive(Debug, Clone)]
pub struct TomlHandler {
    doc: DocumentMut,
    /// The source ended without a final newline
    unterminated: bool,
}

impl TomlHandler {
    pub fn parse(source: &str) -> Result<Self> {
        let doc: DocumentMut = source
            .parse()
            .map_err(|e: toml_edit::TomlError| Error::parse("TOML", e.to_string()))?;
        Ok(Self {
            doc,
            unterminated: !source.is_empty() && !source.ends_with('\n'),
        })
    }

    fn failed(path: &KeyPath, reason: impl Into<String>) -> Error {
        Error::set_failed("TOML", path, reason)
    }
}

/// Shared view of a location in the document tree.
enum Ref<'a> {
    Table(&'a Table),
    Value(&'a toml_edit::Value),
    Tables(&'a ArrayOfTables),
}

/// Mutable view of a location in the document tree.
enum RefMut<'a> {
    Table(&'a mut Table),
    Value(&'a mut toml_edit::Value),
    Tables(&'a mut ArrayOfTables),
}

fn item_ref(item: &Item) -> Option<Ref<'_>> {
    match item {
        Item::None => None,
        Item::Value(v) => Some(Ref::Value(v)),
        Item::Table(t) => Some(Ref::Table(t)),
        Item::ArrayOfTables(a) => Some(Ref::Tables(a)),
    }
}

fn item_ref_mut(item: &mut Item) -> Option<RefMut<'_>> {
    match item {
        Item::None => None,
        Item::Value(v) => Some(RefMut::Value(v)),
        Item::Table(t) => Some(RefMut::Table(t)),
        Item::ArrayOfTables(a) => Some(RefMut::Tables(a)),
    }
}

fn step<'a>(current: Ref<'a>, segment: &PathSegment) -> Option<Ref<'a>> {
    match (current, segment) {
        (Ref::Table(t), PathSegment::Key(k)) => t.get(k).and_then(item_ref),
        (Ref::Value(toml_edit::Value::InlineTable(t)), PathSegment::Key(k)) => {
            t.get(k).map(Ref::Value)
        }
        (Ref::Value(toml_edit::Value::Array(a)), PathSegment::Index(i)) => {
            a.get(*i).map(Ref::Value)
        }
        (Ref::Tables(a), PathSegment::Index(i)) => a.get(*i).map(Ref::Table),
        _ => None,
    }
}

fn step_mut<'a>(current: RefMut<'a>, segment: &PathSegment) -> Option<RefMut<'a>> {
    match (current, segment) {
        (RefMut::Table(t), PathSegment::Key(k)) => t.get_mut(k).and_then(item_ref_mut),
        (RefMut::Value(toml_edit::Value::InlineTable(t)), PathSegment::Key(k)) => {
            t.get_mut(k).map(RefMut::Value)
        }
        (RefMut::Value(toml_edit::Value::Array(a)), PathSegment::Index(i)) => {
            a.get_mut(*i).map(RefMut::Value)
        }
        (RefMut::Tables(a), PathSegment::Index(i)) => a.get_mut(*i).map(RefMut::Table),
        _ => None,
    }
}

fn lookup<'a>(root: &'a Table, path: &KeyPath) -> Option<Ref<'a>> {
    path.segments()
        .iter()
        .try_fold(Ref::Table(root), |current, segment| step(current, segment))
}

fn lookup_mut<'a>(root: &'a mut Table, path: &KeyPath) -> Option<RefMut<'a>> {
    path.segments()
        .iter()
        .try_fold(RefMut::Table(root), |current, segment| step_mut(current, segment))
}

// Reading

fn comment_of(decor: &toml_edit::Decor) -> Option<String> {
    let suffix = decor.suffix()?.as_str()?.trim();
    suffix.starts_with('#').then(|| suffix.to_string())
}

fn value_node(value: &toml_edit::Value) -> Node {
    let mut bare = value.clone();
    bare.decor_mut().clear();
    let formatting = Formatting {
        repr: Some(bare.to_string()),
        comment: comment_of(value.decor()),
    };

    match value {
        toml_edit::Value::String(s) => Node::Scalar {
            value: Scalar::String(s.value().clone()),
            formatting,
        },
        toml_edit::Value::Integer(i) => Node::Scalar {
            value: Scalar::Integer(*i.value()),
            formatting,
        },
        toml_edit::Value::Float(f) => Node::Scalar {
            value: Scalar::Float(*f.value()),
            formatting,
        },
        toml_edit::Value::Boolean(b) => Node::Scalar {
            value: Scalar::Bool(*b.value()),
            formatting,
        },
        toml_edit::Value::Datetime(d) => Node::Scalar {
            value: Scalar::String(d.value().to_string()),
            formatting,
        },
        toml_edit::Value::Array(a) => Node::Sequence {
            items: a.iter().map(value_node).collect(),
            formatting,
        },
        toml_edit::Value::InlineTable(t) => Node::Mapping {
            entries: t
                .iter()
                .map(|(k, v)| (k.to_string(), value_node(v)))
                .collect(),
            formatting,
        },
    }
}

fn table_node(table: &Table) -> Node {
    Node::Mapping {
        entries: table
            .iter()
            .filter_map(|(k, item)| item_ref(item).map(|r| (k.to_string(), ref_node(r))))
            .collect(),
        formatting: Formatting::default(),
    }
}

fn ref_node(r: Ref<'_>) -> Node {
    match r {
        Ref::Table(t) => table_node(t),
        Ref::Value(v) => value_node(v),
        Ref::Tables(a) => Node::Sequence {
            items: a.iter().map(table_node).collect(),
            formatting: Formatting::default(),
        },
    }
}

// Writing

/// Convert to an inline TOML value. TOML has no null.
fn to_toml_value(value: &Value) -> std::result::Result<toml_edit::Value, String> {
    Ok(match value {
        Value::Scalar(Scalar::Null) => return Err("TOML cannot represent null".to_string()),
        Value::Scalar(Scalar::Bool(b)) => toml_edit::Value::from(*b),
        Value::Scalar(Scalar::Integer(i)) => toml_edit::Value::from(*i),
        Value::Scalar(Scalar::Float(f)) => toml_edit::Value::from(*f),
        Value::Scalar(Scalar::String(s)) => toml_edit::Value::from(s.as_str()),
        Value::Sequence(items) => {
            let mut array = Array::new();
            for item in items {
                array.push(to_toml_value(item)?);
            }
            toml_edit::Value::Array(array)
        }
        Value::Mapping(m) => toml_edit::Value::InlineTable(to_inline_table(m)?),
    })
}

fn to_inline_table(mapping: &Mapping) -> std::result::Result<InlineTable, String> {
    let mut table = InlineTable::new();
    for (k, v) in mapping.iter() {
        table.insert(k, to_toml_value(v)?);
    }
    Ok(table)
}

fn to_table(mapping: &Mapping, dotted: bool) -> std::result::Result<Table, String> {
    let mut table = Table::new();
    // An implicit table without key-values emits no header of its own; an
    // empty one needs its header to exist at all.
    table.set_implicit(!mapping.is_empty());
    table.set_dotted(dotted);
    for (k, v) in mapping.iter() {
        table.insert(k, to_item(v, dotted)?);
    }
    Ok(table)
}

/// Convert for placement directly under a table.
///
/// Mappings become standard tables (dotted when the parent is dotted) and
/// non-empty sequences of mappings become arrays of tables.
fn to_item(value: &Value, dotted: bool) -> std::result::Result<Item, String> {
    match value {
        Value::Mapping(m) => Ok(Item::Table(to_table(m, dotted)?)),
        Value::Sequence(items)
            if !dotted && !items.is_empty() && items.iter().all(|i| i.as_mapping().is_some()) =>
        {
            let mut tables = ArrayOfTables::new();
            for item in items {
                if let Value::Mapping(m) = item {
                    tables.push(to_table(m, false)?);
                }
            }
            Ok(Item::ArrayOfTables(tables))
        }
        other => Ok(Item::Value(to_toml_value(other)?)),
    }
}

/// Insert `key` into `table`, directly after `after` when present.
///
/// Entries following the anchor are removed and re-inserted with their
/// original key formatting; sub-tables keep their document positions.
fn insert_in_table(table: &mut Table, key: &str, item: Item, after: Option<&str>) {
    let anchor = after.and_then(|a| table.iter().position(|(k, _)| k == a));
    let Some(idx) = anchor else {
        table.insert(key, item);
        return;
    };

    let trailing: Vec<String> = table
        .iter()
        .skip(idx + 1)
        .map(|(k, _)| k.to_string())
        .collect();
    let moved: Vec<(Key, Item)> = trailing
        .iter()
        .filter_map(|k| table.remove_entry(k))
        .collect();
    table.insert(key, item);
    for (k, item) in moved {
        table.insert_formatted(&k, item);
    }
}

fn insert_in_inline(table: &mut InlineTable, key: &str, value: toml_edit::Value, after: Option<&str>) {
    let anchor = after.and_then(|a| table.iter().position(|(k, _)| k == a));
    let Some(idx) = anchor else {
        table.insert(key, value);
        return;
    };

    let trailing: Vec<String> = table
        .iter()
        .skip(idx + 1)
        .map(|(k, _)| k.to_string())
        .collect();
    let moved: Vec<(Key, toml_edit::Value)> = trailing
        .iter()
        .filter_map(|k| table.remove_entry(k))
        .collect();
    table.insert(key, value);
    for (k, v) in moved {
        table.insert_formatted(&k, v);
    }
}

fn prefix_of(value: &toml_edit::Value) -> String {
    value
        .decor()
        .prefix()
        .and_then(|p| p.as_str())
        .unwrap_or("")
        .to_string()
}

fn suffix_of(value: &toml_edit::Value) -> String {
    value
        .decor()
        .suffix()
        .and_then(|s| s.as_str())
        .unwrap_or("")
        .to_string()
}

/// Split after the first newline: the part that still sits on the previous
/// element's line, and the rest.
fn split_first_line(raw: &str) -> Option<(&str, &str)> {
    raw.find('\n').map(|i| raw.split_at(i + 1))
}

/// Split after the last newline.
fn split_last_line(raw: &str) -> Option<(&str, &str)> {
    raw.rfind('\n').map(|i| raw.split_at(i + 1))
}

/// Whitespace that starts an element's own line.
fn indent_of(prefix: &str) -> &str {
    split_last_line(prefix).map_or("", |(_, indent)| indent)
}

/// Insert into an array, copying neighbour indentation so that multi-line
/// arrays stay one element per line.
///
/// Comments stay with the element they annotate: a comment after the
/// previous element's comma remains on that line, and comment lines above
/// the following element stay above it.
fn insert_in_array(array: &mut Array, index: usize, mut value: toml_edit::Value) {
    value.decor_mut().clear();
    value.decor_mut().set_suffix("");
    let len = array.len();
    let neighbour = if index < len { index } else { len.saturating_sub(1) };
    let neighbour_prefix = array.get(neighbour).map(prefix_of).unwrap_or_default();

    if !neighbour_prefix.contains('\n') {
        if index == 0 {
            value.decor_mut().set_prefix(neighbour_prefix);
            if let Some(first) = array.get_mut(0) {
                first.decor_mut().set_prefix(" ");
            }
        } else {
            value.decor_mut().set_prefix(" ");
        }
        array.insert_formatted(index, value);
        return;
    }

    let indent = indent_of(&neighbour_prefix).to_string();
    if let Some(next) = array.get_mut(index) {
        let prefix = prefix_of(next);
        match split_first_line(&prefix) {
            Some((line, rest)) => {
                value.decor_mut().set_prefix(format!("{line}{indent}"));
                next.decor_mut().set_prefix(format!("\n{rest}"));
            }
            None => value.decor_mut().set_prefix(format!("\n{indent}")),
        }
    } else if array.trailing_comma() {
        let trailing = array.trailing().as_str().unwrap_or("").to_string();
        match split_last_line(&trailing) {
            Some((comment, close)) => {
                value.decor_mut().set_prefix(format!("{comment}{indent}"));
                array.set_trailing(format!("\n{close}"));
            }
            None => value.decor_mut().set_prefix(format!("\n{indent}")),
        }
    } else if let Some(last) = array.get_mut(len - 1) {
        let suffix = suffix_of(last);
        match split_last_line(&suffix) {
            Some((comment, close)) => {
                last.decor_mut().set_suffix("");
                value.decor_mut().set_prefix(format!("{comment}{indent}"));
                value.decor_mut().set_suffix(format!("\n{close}"));
            }
            None => value.decor_mut().set_prefix(format!("\n{indent}")),
        }
    }
    array.insert_formatted(index, value);
}

/// Remove an array element, handing its same-line comment back to the
/// element or closing bracket that now follows the previous element.
fn remove_from_array(array: &mut Array, index: usize) {
    let removed = array.remove(index);
    let prefix = prefix_of(&removed);
    let line = split_first_line(&prefix).map(|(line, _)| line.to_string());

    if let Some(next) = array.get_mut(index) {
        let next_prefix = prefix_of(next);
        match (line, split_first_line(&next_prefix)) {
            (Some(line), Some((next_line, rest))) => {
                let keep = if next_line.contains('#') { next_line } else { line.as_str() };
                next.decor_mut().set_prefix(format!("{keep}{rest}"));
            }
            _ if index == 0 => next.decor_mut().set_prefix(prefix),
            _ => {}
        }
        return;
    }

    let Some(line) = line.filter(|l| l.contains('#')) else {
        if !array.trailing_comma()
            && let Some(last) = index.checked_sub(1).and_then(|i| array.get_mut(i))
        {
            last.decor_mut().set_suffix(suffix_of(&removed));
        }
        return;
    };
    if array.trailing_comma() {
        let trailing = array.trailing().as_str().unwrap_or("").to_string();
        let rest = split_first_line(&trailing).map_or("", |(_, rest)| rest);
        array.set_trailing(format!("{line}{rest}"));
    } else if let Some(last) = index.checked_sub(1).and_then(|i| array.get_mut(i)) {
        let suffix = suffix_of(&removed);
        let rest = split_first_line(&suffix).map_or("", |(_, rest)| rest);
        last.decor_mut().set_suffix(format!("{line}{rest}"));
    }
}

impl FormatHandler for TomlHandler {
    fn format(&self) -> Format {
        Format::Toml
    }

    fn get(&self, path: &KeyPath) -> Option<Node> {
        lookup(self.doc.as_table(), path).map(ref_node)
    }

    fn replace(&mut self, path: &KeyPath, value: &Value) -> Result<()> {
        let (parent_path, last) = match (path.parent(), path.last()) {
            (Some(p), Some(l)) => (p, l.clone()),
            _ => return Err(Self::failed(path, "cannot replace the document root")),
        };
        let parent = lookup_mut(self.doc.as_table_mut(), &parent_path)
            .ok_or_else(|| Error::not_found(path))?;

        match (parent, &last) {
            (RefMut::Table(table), PathSegment::Key(key)) => {
                let dotted = table.is_dotted();
                let slot = table.get_mut(key).ok_or_else(|| Error::not_found(path))?;
                match slot {
                    Item::Value(old) => {
                        let mut new = to_toml_value(value).map_err(|r| Self::failed(path, r))?;
                        *new.decor_mut() = old.decor().clone();
                        *old = new;
                    }
                    Item::Table(old) => {
                        let mut new = to_item(value, dotted).map_err(|r| Self::failed(path, r))?;
                        if let Item::Table(t) = &mut new {
                            *t.decor_mut() = old.decor().clone();
                        }
                        *slot = new;
                    }
                    _ => {
                        *slot = to_item(value, dotted).map_err(|r| Self::failed(path, r))?;
                    }
                }
            }
            (RefMut::Value(toml_edit::Value::InlineTable(table)), PathSegment::Key(key)) => {
                let old = table.get_mut(key).ok_or_else(|| Error::not_found(path))?;
                let mut new = to_toml_value(value).map_err(|r| Self::failed(path, r))?;
                *new.decor_mut() = old.decor().clone();
                *old = new;
            }
            (RefMut::Value(toml_edit::Value::Array(array)), PathSegment::Index(i)) => {
                let old = array.get_mut(*i).ok_or_else(|| Error::not_found(path))?;
                let mut new = to_toml_value(value).map_err(|r| Self::failed(path, r))?;
                *new.decor_mut() = old.decor().clone();
                *old = new;
            }
            (RefMut::Tables(tables), PathSegment::Index(i)) => {
                let Value::Mapping(m) = value else {
                    return Err(Self::failed(path, "array of tables element must be a table"));
                };
                let old = tables.get_mut(*i).ok_or_else(|| Error::not_found(path))?;
                let mut new = to_table(m, false).map_err(|r| Self::failed(path, r))?;
                new.set_implicit(false);
                *new.decor_mut() = old.decor().clone();
                *old = new;
            }
            _ => return Err(Error::not_found(path)),
        }
        Ok(())
    }

    fn insert_key(
        &mut self,
        parent: &KeyPath,
        key: &str,
        value: &Value,
        after: Option<&str>,
    ) -> Result<()> {
        let target = parent.child(key);
        let container = lookup_mut(self.doc.as_table_mut(), parent)
            .ok_or_else(|| Error::not_found(parent))?;

        match container {
            RefMut::Table(table) => {
                if table.contains_key(key) {
                    return Err(Self::failed(&target, "key already exists"));
                }
                let item = to_item(value, table.is_dotted()).map_err(|r| Self::failed(&target, r))?;
                insert_in_table(table, key, item, after);
            }
            RefMut::Value(toml_edit::Value::InlineTable(table)) => {
                if table.contains_key(key) {
                    return Err(Self::failed(&target, "key already exists"));
                }
                let new = to_toml_value(value).map_err(|r| Self::failed(&target, r))?;
                insert_in_inline(table, key, new, after);
            }
            _ => return Err(Self::failed(&target, "parent is not a table")),
        }
        tracing::trace!(path = %target, "Inserted TOML key");
        Ok(())
    }

    fn insert_element(&mut self, sequence: &KeyPath, index: usize, value: &Value) -> Result<()> {
        let container = lookup_mut(self.doc.as_table_mut(), sequence)
            .ok_or_else(|| Error::not_found(sequence))?;

        match container {
            RefMut::Value(toml_edit::Value::Array(array)) => {
                if index > array.len() {
                    return Err(Self::failed(sequence, "index out of bounds"));
                }
                let new = to_toml_value(value).map_err(|r| Self::failed(sequence, r))?;
                insert_in_array(array, index, new);
            }
            RefMut::Tables(tables) => {
                if index > tables.len() {
                    return Err(Self::failed(sequence, "index out of bounds"));
                }
                let Value::Mapping(m) = value else {
                    return Err(Self::failed(sequence, "array of tables element must be a table"));
                };
                let mut new = to_table(m, false).map_err(|r| Self::failed(sequence, r))?;
                new.set_implicit(false);

                let mut existing: Vec<Table> = tables.iter().cloned().collect();
                existing.insert(index, new);
                let mut rebuilt = ArrayOfTables::new();
                for table in existing {
                    rebuilt.push(table);
                }
                *tables = rebuilt;
            }
            _ => return Err(Self::failed(sequence, "not an array")),
        }
        Ok(())
    }

    fn remove(&mut self, path: &KeyPath) -> Result<()> {
        let (parent_path, last) = match (path.parent(), path.last()) {
            (Some(p), Some(l)) => (p, l.clone()),
            _ => return Err(Self::failed(path, "cannot remove the document root")),
        };
        let parent = lookup_mut(self.doc.as_table_mut(), &parent_path)
            .ok_or_else(|| Error::not_found(path))?;

        let removed = match (parent, &last) {
            (RefMut::Table(table), PathSegment::Key(key)) => table.remove(key).is_some(),
            (RefMut::Value(toml_edit::Value::InlineTable(table)), PathSegment::Key(key)) => {
                table.remove(key).is_some()
            }
            (RefMut::Value(toml_edit::Value::Array(array)), PathSegment::Index(i))
                if *i < array.len() =>
            {
                remove_from_array(array, *i);
                true
            }
            (RefMut::Tables(tables), PathSegment::Index(i)) if *i < tables.len() => {
                tables.remove(*i);
                true
            }
            _ => false,
        };

        if removed {
            Ok(())
        } else {
            Err(Error::not_found(path))
        }
    }

    fn render(&self) -> String {
        let mut out = self.doc.to_string();
        if self.unterminated && out.ends_with('\n') {
            out.pop();
        }
        out
    }

    fn normalize(&self) -> Result<serde_json::Value> {
        Ok(table_node(self.doc.as_table()).to_value().to_json())
    }
}
