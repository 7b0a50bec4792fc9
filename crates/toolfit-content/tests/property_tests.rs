//! Property tests: parse then serialize is the identity, and an insert
//! followed by its delete restores the source.

use proptest::prelude::*;
use toolfit_content::{Document, Format, KeyPath, Value};

fn key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,8}"
}

fn scalar_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9.]{0,10}",
        (0i64..10_000).prop_map(|i| i.to_string()),
        Just("true".to_string()),
        Just("'quoted # not a comment'".to_string()),
    ]
}

fn yaml_source() -> impl Strategy<Value = String> {
    prop::collection::vec(
        (key(), scalar_text(), prop::option::of("[a-z ]{0,12}"), any::<bool>()),
        1..8,
    )
    .prop_map(|entries| {
        let mut out = String::new();
        let mut seen = std::collections::HashSet::new();
        for (k, v, comment, blank) in entries {
            if !seen.insert(k.clone()) {
                continue;
            }
            if blank {
                out.push('\n');
            }
            out.push_str(&format!("{k}: {v}"));
            if let Some(c) = comment {
                out.push_str(&format!("  # {c}"));
            }
            out.push('\n');
        }
        out
    })
}

fn toml_source() -> impl Strategy<Value = String> {
    (
        prop::collection::vec((key(), 0i64..1000, any::<bool>()), 1..8),
        any::<bool>(),
    )
        .prop_map(|(entries, terminated)| {
            let mut out = String::from("# header\n[section]\n");
            let mut seen = std::collections::HashSet::new();
            for (k, v, comment) in entries {
                if !seen.insert(k.clone()) {
                    continue;
                }
                out.push_str(&format!("{k} = {v}"));
                if comment {
                    out.push_str("  # note");
                }
                out.push('\n');
            }
            // Files saved without a final newline must survive too.
            if !terminated {
                out.pop();
            }
            out
        })
}

proptest! {
    #[test]
    fn yaml_roundtrip(source in yaml_source()) {
        let doc = Document::parse(&source, Format::Yaml).unwrap();
        prop_assert_eq!(doc.serialize(), source);
    }

    #[test]
    fn toml_roundtrip(source in toml_source()) {
        let doc = Document::parse(&source, Format::Toml).unwrap();
        prop_assert_eq!(doc.serialize(), source);
    }

    #[test]
    fn yaml_insert_delete_inverse(source in yaml_source(), value in 0i64..100) {
        let mut doc = Document::parse(&source, Format::Yaml).unwrap();
        let path = KeyPath::root().child("zz_added_key");
        doc.set(&path, &Value::from(value)).unwrap();
        doc.delete(&path).unwrap();
        prop_assert_eq!(doc.serialize(), source);
    }

    #[test]
    fn toml_insert_delete_inverse(source in toml_source(), value in 0i64..100) {
        let mut doc = Document::parse(&source, Format::Toml).unwrap();
        let path = KeyPath::parse("section.zz_added_key").unwrap();
        doc.set(&path, &Value::from(value)).unwrap();
        doc.delete(&path).unwrap();
        prop_assert_eq!(doc.serialize(), source);
    }
}
