//! Tests for Document operations shared by both formats

use rstest::rstest;
use serde_json::json;
use toolfit_content::{Document, Format, KeyPath, Value};

fn path(p: &str) -> KeyPath {
    KeyPath::parse(p).unwrap()
}

#[rstest]
#[case(Format::Toml, "[tool]\nname = \"x\"\n")]
#[case(Format::Yaml, "tool:\n  name: x\n")]
fn test_insert_then_delete_restores_source(#[case] format: Format, #[case] source: &str) {
    let mut doc = Document::parse(source, format).unwrap();
    doc.set(&path("tool.extra"), &Value::from(json!({"a": [1, 2]})))
        .unwrap();
    assert!(doc.is_modified());
    doc.delete(&path("tool.extra")).unwrap();
    assert_eq!(doc.serialize(), source);
}

#[rstest]
#[case(Format::Toml, "[l]\nv = [1, 3]\n")]
#[case(Format::Yaml, "l:\n  v:\n    - 1\n    - 3\n")]
fn test_insert_element_in_middle(#[case] format: Format, #[case] source: &str) {
    let mut doc = Document::parse(source, format).unwrap();
    doc.insert_element(&path("l.v"), 1, &Value::from(2)).unwrap();
    assert_eq!(doc.get_value(&path("l.v")), Some(Value::from(json!([1, 2, 3]))));
}

#[rstest]
#[case(Format::Toml, "a = 1\nc = 3\n")]
#[case(Format::Yaml, "a: 1\nc: 3\n")]
fn test_set_with_places_after_sibling(#[case] format: Format, #[case] source: &str) {
    let mut doc = Document::parse(source, format).unwrap();
    doc.set_with(&path("b"), &Value::from(2), Some("a")).unwrap();
    let keys: Vec<String> = match doc.get(&KeyPath::root()).unwrap() {
        toolfit_content::Node::Mapping { entries, .. } => {
            entries.into_iter().map(|(k, _)| k).collect()
        }
        other => panic!("expected mapping, got {other:?}"),
    };
    assert_eq!(keys, vec!["a", "b", "c"]);
}

#[rstest]
#[case(Format::Toml)]
#[case(Format::Yaml)]
fn test_empty_document_accepts_keys(#[case] format: Format) {
    let mut doc = Document::empty(format).unwrap();
    doc.set(&path("tool.ruff.line-length"), &Value::from(88)).unwrap();
    assert_eq!(doc.normalize().unwrap(), json!({"tool": {"ruff": {"line-length": 88}}}));
}

#[test]
fn test_missing_paths() {
    let mut doc = Document::parse("a: 1\n", Format::Yaml).unwrap();
    assert!(!doc.contains(&path("b")));
    assert!(doc.delete(&path("b")).is_err());
    assert!(doc.push_element(&path("b"), &Value::from(1)).is_err());
    assert!(doc.set(&KeyPath::root(), &Value::from(1)).is_err());
}

#[test]
fn test_semantic_equality_across_formats() {
    let toml = Document::parse("[a]\nx = 1\n", Format::Toml).unwrap();
    let same = Document::parse("a:\n  x: 1\n", Format::Yaml).unwrap();
    let other = Document::parse("a:\n  x: 2\n", Format::Yaml).unwrap();
    assert!(toml.semantic_eq(&same));
    assert!(!toml.semantic_eq(&other));
}
