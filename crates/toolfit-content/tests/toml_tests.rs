//! Tests for TOML documents

use pretty_assertions::assert_eq;
use serde_json::json;
use toolfit_content::{Document, Error, Format, KeyPath, Value};

const PYPROJECT: &str = r#"[project]
name = "demo"
dependencies = [
    "requests>=2",
]

# Formatting
[tool.black]
line-length = 100
"#;

fn path(p: &str) -> KeyPath {
    KeyPath::parse(p).unwrap()
}

fn parse(src: &str) -> Document {
    Document::parse(src, Format::Toml).unwrap()
}

#[test]
fn test_unmodified_document_roundtrips() {
    let doc = parse(PYPROJECT);
    assert_eq!(doc.serialize(), PYPROJECT);
    assert!(!doc.is_modified());
}

#[test]
fn test_new_section_is_appended_as_table() {
    let mut doc = parse(PYPROJECT);
    doc.set(&path("tool.ruff.lint.select"), &Value::from(json!(["E", "F"])))
        .unwrap();
    let expected = format!("{PYPROJECT}\n[tool.ruff.lint]\nselect = [\"E\", \"F\"]\n");
    assert_eq!(doc.serialize(), expected);
}

#[test]
fn test_push_keeps_multiline_array_layout() {
    let mut doc = parse(PYPROJECT);
    doc.push_element(&path("project.dependencies"), &Value::from("rich"))
        .unwrap();
    assert!(doc
        .serialize()
        .contains("dependencies = [\n    \"requests>=2\",\n    \"rich\",\n]\n"));
}

#[test]
fn test_replace_keeps_trailing_comment() {
    let mut doc = parse("[tool.ruff]\nline-length = 88  # team default\n");
    doc.set(&path("tool.ruff.line-length"), &Value::from(100))
        .unwrap();
    assert_eq!(
        doc.serialize(),
        "[tool.ruff]\nline-length = 100  # team default\n"
    );
}

#[test]
fn test_delete_section_removes_its_comment() {
    let mut doc = parse(PYPROJECT);
    doc.delete(&path("tool.black")).unwrap();
    let out = doc.serialize();
    assert!(!out.contains("Formatting"));
    assert!(!out.contains("black"));
    assert!(out.starts_with("[project]\nname = \"demo\"\n"));
}

#[test]
fn test_null_is_rejected() {
    let mut doc = parse("[a]\nb = 1\n");
    let err = doc.set(&path("a.c"), &Value::NULL).unwrap_err();
    assert!(matches!(err, Error::PathSetFailed { .. }));
    assert!(!doc.is_modified());
}

#[test]
fn test_invalid_toml_is_a_parse_error() {
    let err = Document::parse("[project\nname = 1\n", Format::Toml).unwrap_err();
    assert!(matches!(err, Error::ParseError { .. }));
}

#[test]
fn test_normalize_ignores_layout() {
    let a = parse("[tool.x]\na = 1\nb = [1, 2]\n");
    let b = parse("tool = { x = { b = [1, 2], a = 1 } }\n");
    assert!(a.semantic_eq(&b));
}
