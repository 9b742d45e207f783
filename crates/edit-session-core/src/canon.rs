// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonicalizer for multi-valued associative fields.
//!
//! Servers send tags, skills and categories in three shapes: a native array
//! of primitives, a string holding a JSON-encoded array, or a list of objects
//! (`{"id": 3, "skill_name": "Color"}`). [`canonicalize`] folds all of them
//! into a [`TagCollection`]; [`serialize`] writes the collection back in the
//! field's [`WireShape`].
//!
//! Both functions are pure. Unreadable input becomes an empty collection and
//! a warning in [`Canonical::warning`]; callers decide how to surface it.

use crate::schema::{CollectionSpec, WireShape};
use crate::value::{RecordId, TagCollection, TagEntry};
use serde_json::{Map, Value};

/// Result of canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Canonical {
    /// Normalized entries.
    pub collection: TagCollection,
    /// Set when the input (or some element) could not be read.
    pub warning: Option<String>,
}

impl Canonical {
    fn malformed(reason: impl Into<String>) -> Self {
        Self {
            collection: TagCollection::new(),
            warning: Some(reason.into()),
        }
    }
}

/// Normalize a raw wire value into a canonical collection.
pub fn canonicalize(raw: &Value, spec: &CollectionSpec) -> Canonical {
    match raw {
        Value::Null => Canonical::default(),
        Value::Array(items) => from_items(items, spec),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Canonical::default();
            }
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) => from_items(&items, spec),
                Ok(_) => Canonical::malformed("encoded value is not a JSON array"),
                Err(err) => Canonical::malformed(format!("invalid JSON: {err}")),
            }
        }
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => {
            Canonical::malformed("expected an array or a JSON-encoded array")
        }
    }
}

fn from_items(items: &[Value], spec: &CollectionSpec) -> Canonical {
    let mut out = Canonical::default();
    let mut skipped = 0usize;
    for item in items {
        match entry_from(item, spec) {
            Some(Some(entry)) => {
                out.collection.push(entry);
            }
            Some(None) => {}
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        out.warning = Some(format!("skipped {skipped} unreadable element(s)"));
    }
    out
}

/// `None` = unreadable, `Some(None)` = intentionally empty, `Some(Some(_))` = entry.
fn entry_from(item: &Value, spec: &CollectionSpec) -> Option<Option<TagEntry>> {
    match item {
        Value::Null => Some(None),
        Value::String(s) => {
            let s = s.trim();
            Some((!s.is_empty()).then(|| TagEntry::plain(s)))
        }
        Value::Number(n) => Some(Some(TagEntry::plain(n.to_string()))),
        Value::Object(obj) => {
            let label = spec
                .label_key_order()
                .find_map(|k| obj.get(k).and_then(label_text))?;
            let id = spec
                .id_key_order()
                .find_map(|k| obj.get(k).and_then(RecordId::from_value));
            Some(Some(match id {
                Some(id) => TagEntry::Keyed { id, label },
                None => TagEntry::Plain(label),
            }))
        }
        Value::Bool(_) | Value::Array(_) => None,
    }
}

/// Apply the wire-input label rules to an entry built in memory: the label
/// is trimmed and an entry with a blank label is rejected.
pub fn normalize_entry(entry: TagEntry) -> Option<TagEntry> {
    match entry {
        TagEntry::Plain(label) => trimmed(label).map(TagEntry::Plain),
        TagEntry::Keyed { id, label } => trimmed(label).map(|label| TagEntry::Keyed { id, label }),
    }
}

fn trimmed(label: String) -> Option<String> {
    let t = label.trim();
    if t.is_empty() {
        None
    } else if t.len() == label.len() {
        Some(label)
    } else {
        Some(t.to_string())
    }
}

fn label_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Write a collection in the field's wire shape.
pub fn serialize(collection: &TagCollection, spec: &CollectionSpec) -> Value {
    match &spec.wire {
        WireShape::Array => collection.to_value(),
        WireShape::JsonString => {
            let encoded = serde_json::to_string(&collection.to_value())
                .unwrap_or_else(|_| "[]".to_string());
            Value::String(encoded)
        }
        WireShape::ObjectList { label_key, id_key } => Value::Array(
            collection
                .iter()
                .map(|entry| {
                    let mut obj = Map::new();
                    if let Some(id) = entry.id() {
                        obj.insert(id_key.clone(), id.to_value());
                    }
                    obj.insert(label_key.clone(), Value::String(entry.label().to_string()));
                    Value::Object(obj)
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn labels(c: &Canonical) -> Vec<&str> {
        c.collection.labels()
    }

    #[test]
    fn json_string_array_is_decoded() {
        let c = canonicalize(&json!(r#"["video","audio"]"#), &CollectionSpec::json_string());
        assert_eq!(labels(&c), vec!["video", "audio"]);
        assert!(c.warning.is_none());
    }

    #[test]
    fn json_string_round_trip_matches_wire_example() {
        let spec = CollectionSpec::json_string();
        let mut c = canonicalize(&json!(r#"["video","audio"]"#), &spec).collection;
        c.push(TagEntry::plain("color"));
        assert_eq!(serialize(&c, &spec), json!(r#"["video","audio","color"]"#));
    }

    #[test]
    fn object_list_keeps_ids() {
        let spec = CollectionSpec::object_list("skill_name");
        let raw = json!([
            {"id": 4, "skill_name": "Color Grading"},
            {"skill_name": "Editing"},
            {"id": 4, "skill_name": "dup"}
        ]);
        let c = canonicalize(&raw, &spec).collection;
        assert_eq!(
            c.entries(),
            &[TagEntry::keyed(4, "Color Grading"), TagEntry::plain("Editing")]
        );
        assert_eq!(
            serialize(&c, &spec),
            json!([{"id": 4, "skill_name": "Color Grading"}, {"skill_name": "Editing"}])
        );
    }

    #[test]
    fn malformed_json_recovers_to_empty_with_warning() {
        let c = canonicalize(&json!("[\"video\","), &CollectionSpec::json_string());
        assert!(c.collection.is_empty());
        assert!(c.warning.is_some());

        let c = canonicalize(&json!({"video": true}), &CollectionSpec::array());
        assert!(c.collection.is_empty());
        assert!(c.warning.is_some());
    }

    #[test]
    fn blank_and_null_are_empty_without_warning() {
        for raw in [json!(null), json!(""), json!("   "), json!([])] {
            let c = canonicalize(&raw, &CollectionSpec::array());
            assert_eq!(c, Canonical::default(), "raw = {raw}");
        }
    }

    #[test]
    fn unreadable_elements_are_skipped_and_reported() {
        let c = canonicalize(&json!(["a", true, [1], {"nope": 1}, null, " b "]), &CollectionSpec::array());
        assert_eq!(labels(&c), vec!["a", "b"]);
        assert_eq!(c.warning.as_deref(), Some("skipped 3 unreadable element(s)"));
    }

    #[test]
    fn numbers_become_plain_labels() {
        let c = canonicalize(&json!([2024, "2024", 7]), &CollectionSpec::array());
        assert_eq!(labels(&c), vec!["2024", "7"]);
    }

    #[test]
    fn normalize_entry_trims_and_rejects_blank_labels() {
        assert_eq!(normalize_entry(TagEntry::plain(" video ")), Some(TagEntry::plain("video")));
        assert_eq!(normalize_entry(TagEntry::keyed(3, "Color\t")), Some(TagEntry::keyed(3, "Color")));
        assert_eq!(normalize_entry(TagEntry::plain("  ")), None);
        assert_eq!(normalize_entry(TagEntry::keyed(3, "")), None);
    }

    fn raw_shapes() -> impl Strategy<Value = Value> {
        let label = "[a-z ]{0,6}";
        let element = prop_oneof![
            label.prop_map(Value::String),
            (0i64..5).prop_map(Value::from),
            (0i64..5, label).prop_map(|(id, l)| json!({"id": id, "skill_name": l})),
            label.prop_map(|l| json!({"skill_name": l})),
            Just(Value::Null),
            Just(Value::Bool(true)),
        ];
        let list = prop::collection::vec(element, 0..8);
        prop_oneof![
            list.clone().prop_map(Value::Array),
            list.prop_map(|items| Value::String(Value::Array(items).to_string())),
            "[\\[\\]a-z\",]{0,10}".prop_map(Value::String),
        ]
    }

    fn specs() -> [CollectionSpec; 3] {
        [
            CollectionSpec::array().with_label_key("skill_name"),
            CollectionSpec::json_string().with_label_key("skill_name"),
            CollectionSpec::object_list("skill_name"),
        ]
    }

    proptest! {
        #[test]
        fn canonicalize_is_idempotent(raw in raw_shapes()) {
            for spec in specs() {
                let once = canonicalize(&raw, &spec).collection;
                let twice = canonicalize(&once.to_value(), &spec).collection;
                prop_assert_eq!(&once, &twice);
            }
        }

        #[test]
        fn serialize_round_trips(raw in raw_shapes()) {
            for spec in specs() {
                let canonical = canonicalize(&raw, &spec).collection;
                let wire = serialize(&canonical, &spec);
                let back = canonicalize(&wire, &spec);
                prop_assert_eq!(&back.collection, &canonical);
                prop_assert!(back.warning.is_none());
            }
        }
    }
}
