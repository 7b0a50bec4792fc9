//! Tests for YAML documents

use pretty_assertions::assert_eq;
use serde_json::json;
use toolfit_content::{Document, Format, KeyPath, Value};

const PRE_COMMIT: &str = "\
# See https://pre-commit.com for more information
repos:
-   repo: https://github.com/pre-commit/pre-commit-hooks
    rev: v4.6.0
    hooks:
    -   id: trailing-whitespace
    -   id: end-of-file-fixer  # keep newline at EOF
";

fn path(p: &str) -> KeyPath {
    KeyPath::parse(p).unwrap()
}

fn parse(src: &str) -> Document {
    Document::parse(src, Format::Yaml).unwrap()
}

#[test]
fn test_unmodified_document_roundtrips() {
    let doc = parse(PRE_COMMIT);
    assert_eq!(doc.serialize(), PRE_COMMIT);
    assert!(!doc.is_modified());
}

#[test]
fn test_read_nested_values() {
    let doc = parse(PRE_COMMIT);
    assert_eq!(
        doc.get_value(&path("repos[0].hooks[1].id")),
        Some(Value::from("end-of-file-fixer"))
    );
    let node = doc.get(&path("repos[0].hooks[1].id")).unwrap();
    assert_eq!(node.formatting().comment.as_deref(), Some("# keep newline at EOF"));
    assert!(doc.get(&path("repos[3]")).is_none());
}

#[test]
fn test_append_repo_in_document_style() {
    let mut doc = parse(PRE_COMMIT);
    let repo = Value::from(json!({
        "repo": "local",
        "hooks": [{"id": "ruff", "types_or": ["python", "pyi"]}]
    }));
    doc.push_element(&path("repos"), &repo).unwrap();

    let expected = format!(
        "{PRE_COMMIT}\
-   repo: local
    hooks:
    -   id: ruff
        types_or:
        -   python
        -   pyi
"
    );
    assert_eq!(doc.serialize(), expected);
    assert!(doc.is_modified());
}

#[test]
fn test_delete_restores_original_bytes() {
    let mut doc = parse(PRE_COMMIT);
    doc.push_element(&path("repos"), &Value::from(json!({"repo": "local", "hooks": []})))
        .unwrap();
    doc.delete(&path("repos[1]")).unwrap();
    assert_eq!(doc.serialize(), PRE_COMMIT);
}

#[test]
fn test_set_creates_missing_parents() {
    let mut doc = parse("default_stages: [pre-commit]\n");
    doc.set(&path("ci.autoupdate_schedule"), &Value::from("monthly"))
        .unwrap();
    assert_eq!(
        doc.serialize(),
        "default_stages: [pre-commit]\nci:\n  autoupdate_schedule: monthly\n"
    );
}

#[test]
fn test_set_replaces_vacant_value() {
    let mut doc = parse("ci:\nrepos: []\n");
    doc.set(&path("ci.skip"), &Value::from(json!(["ruff"]))).unwrap();
    assert_eq!(doc.serialize(), "ci:\n  skip:\n    - ruff\nrepos: []\n");
}

#[test]
fn test_strings_that_look_typed_are_quoted() {
    let mut doc = parse("a: 1\n");
    doc.set(&path("version"), &Value::from("3.12")).unwrap();
    doc.set(&path("flag"), &Value::from("yes")).unwrap();
    assert_eq!(doc.serialize(), "a: 1\nversion: '3.12'\nflag: yes\n");
    assert_eq!(doc.get_value(&path("version")), Some(Value::from("3.12")));
}

#[test]
fn test_flow_mapping_insert() {
    let mut doc = parse("args: {fix: true}\n");
    doc.insert_key(&path("args"), "show", &Value::from(false), None)
        .unwrap();
    assert_eq!(doc.serialize(), "args: {fix: true, show: false}\n");
}

#[test]
fn test_rejects_unsupported_syntax() {
    for src in [
        "a: &x 1\nb: *x\n",
        "a: !!str 1\n",
        "a: 1\n---\nb: 2\n",
        "a:\n\tb: 1\n",
    ] {
        assert!(Document::parse(src, Format::Yaml).is_err(), "{src:?}");
    }
}

#[test]
fn test_multi_line_plain_scalar_folds() {
    let src = "description: a hook that\n  spans two lines  # why\n\nnote: first\n\n  second\nnext: 1\n";
    let mut doc = parse(src);
    assert_eq!(doc.serialize(), src);
    assert_eq!(
        doc.get_value(&path("description")),
        Some(Value::from("a hook that spans two lines"))
    );
    assert_eq!(doc.get_value(&path("note")), Some(Value::from("first\nsecond")));
    assert_eq!(doc.get(&path("description")).unwrap().formatting().comment.as_deref(), Some("# why"));

    doc.set(&path("description"), &Value::from("short")).unwrap();
    assert_eq!(
        doc.serialize(),
        "description: short  # why\n\nnote: first\n\n  second\nnext: 1\n"
    );
    doc.delete(&path("note")).unwrap();
    assert_eq!(doc.serialize(), "description: short  # why\n\nnext: 1\n");
}

#[test]
fn test_plain_scalar_on_its_own_lines() {
    let doc = parse("entry:\n  uv run\n  pytest\nnext: 1\n");
    assert_eq!(doc.get_value(&path("entry")), Some(Value::from("uv run pytest")));
    assert_eq!(doc.get_value(&path("next")), Some(Value::from(1)));
}

#[test]
fn test_nested_compact_sequences() {
    let src = "matrix:\n- - a\n  - b\n- - c\n";
    let mut doc = parse(src);
    assert_eq!(doc.serialize(), src);
    assert_eq!(doc.get_value(&path("matrix")), Some(Value::from(json!([["a", "b"], ["c"]]))));

    doc.insert_element(&path("matrix[0]"), 0, &Value::from("z")).unwrap();
    assert_eq!(doc.serialize(), "matrix:\n- - z\n  - a\n  - b\n- - c\n");
    assert_eq!(doc.get_value(&path("matrix[0]")), Some(Value::from(json!(["z", "a", "b"]))));

    doc.delete(&path("matrix[0][0]")).unwrap();
    assert_eq!(doc.serialize(), src);

    doc.insert_element(&path("matrix[1]"), 1, &Value::from("d")).unwrap();
    assert_eq!(doc.serialize(), "matrix:\n- - a\n  - b\n- - c\n  - d\n");
}

#[test]
fn test_mapping_key_inside_plain_scalar_is_rejected() {
    assert!(Document::parse("a: one\n  b: two\n", Format::Yaml).is_err());
}

#[test]
fn test_semantic_equality_ignores_style() {
    let a = parse("a:\n  - 1\n  - 2\nb: x\n");
    let b = parse("b: 'x'\na: [1, 2]\n");
    assert!(a.semantic_eq(&b));
}
