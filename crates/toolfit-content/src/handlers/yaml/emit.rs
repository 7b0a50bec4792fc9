//! Rendering of new YAML content in the document's own indentation style

use super::cst::IndentStyle;
use super::scalar::{render_scalar, render_string};
use crate::value::{Mapping, Scalar, Value};

pub(crate) fn flow(value: &Value) -> String {
    match value {
        Value::Scalar(s) => render_scalar(s, true),
        Value::Sequence(items) => {
            let inner: Vec<String> = items.iter().map(flow).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Mapping(m) if m.is_empty() => "{}".to_string(),
        Value::Mapping(m) => {
            let inner: Vec<String> = m
                .iter()
                .map(|(k, v)| format!("{}: {}", render_string(k, true), flow(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

pub(crate) fn flow_key(key: &str) -> String {
    render_string(key, true)
}

/// Text following a mapping key's `:` as `(same line, following lines)`.
pub(crate) fn entry_value(value: &Value, indent: usize, style: &IndentStyle) -> (String, String) {
    match value {
        Value::Scalar(Scalar::Null) => (String::new(), String::new()),
        Value::Scalar(s) => (format!(" {}", render_scalar(s, false)), String::new()),
        Value::Mapping(m) if m.is_empty() => (" {}".to_string(), String::new()),
        Value::Sequence(items) if items.is_empty() => (" []".to_string(), String::new()),
        Value::Mapping(m) => (String::new(), block_map(m, indent + style.map_step, style)),
        Value::Sequence(items) => (
            String::new(),
            block_seq(items, indent + style.seq_offset, style.dash_gap, style),
        ),
    }
}

/// Text following a sequence dash as `(same line, following lines)`.
///
/// Mappings are written compactly, with their first key on the dash line.
pub(crate) fn item_value(
    value: &Value,
    dash_col: usize,
    gap: usize,
    style: &IndentStyle,
) -> (String, String) {
    let gap = gap.max(2);
    let lead = " ".repeat(gap - 1);
    match value {
        Value::Scalar(Scalar::Null) => (String::new(), String::new()),
        Value::Scalar(s) => (format!("{lead}{}", render_scalar(s, false)), String::new()),
        Value::Mapping(m) if m.is_empty() => (format!("{lead}{{}}"), String::new()),
        Value::Sequence(items) if items.is_empty() => (format!("{lead}[]"), String::new()),
        Value::Mapping(m) => {
            let content = dash_col + gap;
            let block = block_map(m, content, style);
            let trimmed = block.get(content..).unwrap_or(&block);
            match trimmed.split_once('\n') {
                Some((first, rest)) => (format!("{lead}{first}"), rest.to_string()),
                None => (format!("{lead}{trimmed}"), String::new()),
            }
        }
        Value::Sequence(items) => (
            String::new(),
            block_seq(items, dash_col + style.map_step, gap, style),
        ),
    }
}

/// A complete `key: value` entry, newline-terminated.
pub(crate) fn block_entry(key: &str, value: &Value, indent: usize, style: &IndentStyle) -> String {
    let (head, body) = entry_value(value, indent, style);
    format!(
        "{}{}:{head}\n{body}",
        " ".repeat(indent),
        render_string(key, false)
    )
}

/// A complete `- value` item, newline-terminated.
pub(crate) fn block_item(value: &Value, dash_col: usize, gap: usize, style: &IndentStyle) -> String {
    let (head, body) = item_value(value, dash_col, gap, style);
    format!("{}-{head}\n{body}", " ".repeat(dash_col))
}

fn block_map(mapping: &Mapping, indent: usize, style: &IndentStyle) -> String {
    mapping
        .iter()
        .map(|(k, v)| block_entry(k, v, indent, style))
        .collect()
}

fn block_seq(items: &[Value], indent: usize, gap: usize, style: &IndentStyle) -> String {
    items
        .iter()
        .map(|v| block_item(v, indent, gap, style))
        .collect()
}
