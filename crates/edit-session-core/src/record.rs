// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Conversion between raw server records and [`FormState`].

use crate::canon::{canonicalize, serialize};
use crate::schema::{EntitySchema, FieldKind, ScalarType, UploadArity};
use crate::value::{FieldValue, FormState, RecordId, SlotStatus, UploadSlot, UploadValue};
use serde_json::{Map, Value};

/// A raw record read into form state.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    /// Form state (derived fields hold the loaded value, or `""` if absent).
    pub form: FormState,
    /// Derived fields whose value came from the record.
    pub loaded_derived: Vec<String>,
    /// `(field, reason)` for values that could not be read.
    pub warnings: Vec<(String, String)>,
    /// Entity id, if the record carries one.
    pub id: Option<RecordId>,
    /// Owner id, if the schema names an owner key and the record carries it.
    pub owner: Option<RecordId>,
}

/// Coerce a raw scalar into the field's type. Returns the accepted shape on failure.
pub fn coerce_scalar(ty: ScalarType, raw: &Value) -> Result<Value, &'static str> {
    match ty {
        ScalarType::Any => Ok(raw.clone()),
        ScalarType::Text => match raw {
            Value::Null => Ok(Value::String(String::new())),
            Value::String(_) => Ok(raw.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::Array(_) | Value::Object(_) => Err("text"),
        },
        ScalarType::Number => match raw {
            Value::Null => Ok(Value::Null),
            Value::Number(n) => match n.as_f64() {
                Some(f) if n.is_f64() => number_from_f64(f).ok_or("number"),
                _ => Ok(raw.clone()),
            },
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Ok(Value::Null)
                } else if let Ok(i) = s.parse::<i64>() {
                    Ok(Value::from(i))
                } else {
                    s.parse::<f64>().ok().and_then(number_from_f64).ok_or("number")
                }
            }
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => Err("number"),
        },
        ScalarType::Bool => match raw {
            Value::Null => Ok(Value::Bool(false)),
            Value::Bool(_) => Ok(raw.clone()),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" | "" => Ok(Value::Bool(false)),
                _ => Err("boolean"),
            },
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err("boolean"),
            },
            Value::Array(_) | Value::Object(_) => Err("boolean"),
        },
    }
}

/// Integral floats inside the exactly-representable range become integers,
/// so `"1500.0"` and `"1500"` hold the same value.
#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn number_from_f64(f: f64) -> Option<Value> {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if f.trunc() == f && f.abs() <= EXACT {
        return Some(Value::from(f as i64));
    }
    serde_json::Number::from_f64(f).map(Value::Number)
}

fn slot_from(raw: &Value) -> Option<UploadSlot> {
    let url = match raw {
        Value::String(s) => s.trim(),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str)?.trim(),
        _ => return None,
    };
    (!url.is_empty()).then(|| UploadSlot::validated(url))
}

fn upload_from(arity: UploadArity, raw: &Value) -> (Option<UploadValue>, Option<String>) {
    match (arity, raw) {
        (UploadArity::Single, Value::Null) => (Some(UploadValue::Single(UploadSlot::pending())), None),
        (UploadArity::Single, Value::String(s)) if s.trim().is_empty() => {
            (Some(UploadValue::Single(UploadSlot::pending())), None)
        }
        (UploadArity::Single, _) => match slot_from(raw) {
            Some(slot) => (Some(UploadValue::Single(slot)), None),
            None => (None, Some("expected a url".to_string())),
        },
        (UploadArity::Multi, Value::Null) => (Some(UploadValue::Multi(Vec::new())), None),
        (UploadArity::Multi, Value::Array(items)) => {
            let slots: Vec<UploadSlot> = items.iter().filter_map(slot_from).collect();
            let skipped = items.len() - slots.len();
            let warning = (skipped > 0).then(|| format!("skipped {skipped} unreadable url(s)"));
            (Some(UploadValue::Multi(slots)), warning)
        }
        (UploadArity::Multi, _) => (None, Some("expected a list of urls".to_string())),
    }
}

/// Read a raw record into form state. Values that cannot be read fall back
/// to the field default and are reported in `warnings`.
pub fn ingest(schema: &EntitySchema, raw: &Value) -> Result<Ingested, String> {
    let Value::Object(obj) = raw else {
        return Err("record is not a JSON object".to_string());
    };
    let mut out = Ingested {
        id: obj.get(schema.id_key()).and_then(RecordId::from_value),
        owner: schema
            .owner_key()
            .and_then(|k| obj.get(k))
            .and_then(RecordId::from_value),
        ..Ingested::default()
    };
    for spec in schema.fields() {
        let name = &spec.name;
        let raw = obj.get(name).unwrap_or(&Value::Null);
        let value = match &spec.kind {
            FieldKind::Scalar(ty) => match coerce_scalar(*ty, raw) {
                Ok(v) => FieldValue::Scalar(v),
                Err(expected) => {
                    out.warnings.push((name.clone(), format!("expected {expected}")));
                    spec.default_value()
                }
            },
            FieldKind::Tags(cspec) => {
                let canonical = canonicalize(raw, cspec);
                if let Some(w) = canonical.warning {
                    out.warnings.push((name.clone(), w));
                }
                FieldValue::Tags(canonical.collection)
            }
            FieldKind::Upload(arity) => {
                let (upload, warning) = upload_from(*arity, raw);
                if let Some(w) = warning {
                    out.warnings.push((name.clone(), w));
                }
                upload.map_or_else(|| spec.default_value(), FieldValue::Upload)
            }
            FieldKind::Derived(_) => match raw.as_str().map(str::trim) {
                Some(s) if !s.is_empty() => {
                    out.loaded_derived.push(name.clone());
                    FieldValue::text(s)
                }
                _ => spec.default_value(),
            },
        };
        out.form.insert(name.clone(), value);
    }
    Ok(out)
}

fn upload_wire(arity: UploadArity, value: &UploadValue) -> Value {
    let committed = |s: &UploadSlot| {
        (s.status == SlotStatus::Validated)
            .then(|| s.url.clone())
            .flatten()
    };
    match (arity, value) {
        (UploadArity::Single, UploadValue::Single(slot)) => {
            committed(slot).map_or(Value::Null, Value::String)
        }
        (_, u) => Value::Array(
            u.slots()
                .iter()
                .filter_map(committed)
                .map(Value::String)
                .collect(),
        ),
    }
}

/// Serialize form state into a wire-ready JSON object.
///
/// Upload fields carry only validated urls. Fields missing from `form` are
/// written as `null`.
pub fn payload(schema: &EntitySchema, form: &FormState, id: Option<&RecordId>) -> Value {
    let mut map = Map::new();
    if let Some(id) = id {
        map.insert(schema.id_key().to_string(), id.to_value());
    }
    for spec in schema.fields() {
        let wire = match (&spec.kind, form.get(&spec.name)) {
            (FieldKind::Tags(cspec), Some(FieldValue::Tags(tags))) => serialize(tags, cspec),
            (FieldKind::Upload(arity), Some(FieldValue::Upload(u))) => upload_wire(*arity, u),
            (_, Some(FieldValue::Scalar(v))) => v.clone(),
            _ => Value::Null,
        };
        map.insert(spec.name.clone(), wire);
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::schema::{CollectionSpec, FieldSpec, Transform};
    use crate::value::TagEntry;
    use serde_json::json;

    fn schema() -> EntitySchema {
        EntitySchema::new(
            "project",
            vec![
                FieldSpec::text("project_title"),
                FieldSpec::number("budget"),
                FieldSpec::boolean("featured"),
                FieldSpec::tags("tags", CollectionSpec::json_string()),
                FieldSpec::tags("skills", CollectionSpec::object_list("skill_name")),
                FieldSpec::upload("thumbnail"),
                FieldSpec::uploads("gallery"),
                FieldSpec::derived("url", ["project_title"], Transform::Slugify { max_len: 80 }),
            ],
        )
        .unwrap()
        .with_owner_key("client_id")
    }

    #[test]
    fn coerces_loose_scalars() {
        assert_eq!(coerce_scalar(ScalarType::Number, &json!("42")), Ok(json!(42)));
        assert_eq!(coerce_scalar(ScalarType::Number, &json!(" 2.5 ")), Ok(json!(2.5)));
        assert_eq!(coerce_scalar(ScalarType::Number, &json!("")), Ok(Value::Null));
        assert_eq!(coerce_scalar(ScalarType::Number, &json!("abc")), Err("number"));
        assert_eq!(coerce_scalar(ScalarType::Number, &json!("1500.0")), Ok(json!(1500)));
        assert_eq!(coerce_scalar(ScalarType::Number, &json!(1500.0)), Ok(json!(1500)));
        assert_eq!(coerce_scalar(ScalarType::Number, &json!("1e400")), Err("number"));
        assert_eq!(coerce_scalar(ScalarType::Bool, &json!("TRUE")), Ok(json!(true)));
        assert_eq!(coerce_scalar(ScalarType::Bool, &json!(0)), Ok(json!(false)));
        assert_eq!(coerce_scalar(ScalarType::Text, &json!(7)), Ok(json!("7")));
        assert_eq!(coerce_scalar(ScalarType::Text, &json!(null)), Ok(json!("")));
        assert_eq!(coerce_scalar(ScalarType::Text, &json!([1])), Err("text"));
    }

    #[test]
    fn ingest_reads_every_kind() {
        let raw = json!({
            "id": 12,
            "client_id": "c-9",
            "project_title": "Demo",
            "budget": "1500",
            "featured": 1,
            "tags": "[\"video\",\"audio\"]",
            "skills": [{"id": 3, "skill_name": "Editing"}],
            "thumbnail": "https://cdn/t.png",
            "gallery": ["https://cdn/a.png", {"url": "https://cdn/b.png"}],
            "url": "demo-custom"
        });
        let got = ingest(&schema(), &raw).unwrap();
        assert_eq!(got.id, Some(RecordId::Num(12)));
        assert_eq!(got.owner, Some(RecordId::Text("c-9".into())));
        assert!(got.warnings.is_empty(), "{:?}", got.warnings);
        assert_eq!(got.form["budget"], FieldValue::Scalar(json!(1500)));
        assert_eq!(got.form["featured"], FieldValue::Scalar(json!(true)));
        assert_eq!(got.form["tags"].as_tags().unwrap().labels(), vec!["video", "audio"]);
        assert_eq!(
            got.form["skills"].as_tags().unwrap().entries(),
            &[TagEntry::keyed(3, "Editing")]
        );
        assert_eq!(
            got.form["gallery"],
            FieldValue::Upload(UploadValue::Multi(vec![
                UploadSlot::validated("https://cdn/a.png"),
                UploadSlot::validated("https://cdn/b.png"),
            ]))
        );
        assert_eq!(got.loaded_derived, vec!["url".to_string()]);
    }

    #[test]
    fn unreadable_values_fall_back_with_warnings() {
        let raw = json!({
            "project_title": {"oops": 1},
            "budget": "lots",
            "tags": "not json",
            "thumbnail": 5,
            "gallery": "https://cdn/a.png"
        });
        let got = ingest(&schema(), &raw).unwrap();
        let fields: Vec<&str> = got.warnings.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(fields, vec!["project_title", "budget", "tags", "thumbnail", "gallery"]);
        assert_eq!(got.form["budget"], FieldValue::Scalar(Value::Null));
        assert!(got.form["tags"].as_tags().unwrap().is_empty());
    }

    #[test]
    fn gallery_keeps_readable_urls() {
        let raw = json!({"gallery": ["https://cdn/a.png", 7, {"url": " "}]});
        let got = ingest(&schema(), &raw).unwrap();
        assert_eq!(
            got.form["gallery"],
            FieldValue::Upload(UploadValue::Multi(vec![UploadSlot::validated("https://cdn/a.png")]))
        );
        assert_eq!(got.warnings, vec![("gallery".to_string(), "skipped 2 unreadable url(s)".to_string())]);
    }

    #[test]
    fn non_object_record_is_rejected() {
        assert!(ingest(&schema(), &json!([1, 2])).is_err());
    }

    #[test]
    fn payload_writes_wire_shapes() {
        let schema = schema();
        let got = ingest(
            &schema,
            &json!({
                "project_title": "Demo",
                "tags": ["video"],
                "skills": [{"id": 3, "skill_name": "Editing"}],
                "gallery": ["https://cdn/a.png"]
            }),
        )
        .unwrap();
        let mut form = got.form;
        form.insert(
            "thumbnail".into(),
            FieldValue::Upload(UploadValue::Single(UploadSlot {
                status: SlotStatus::Uploading,
                url: Some("https://cdn/old.png".into()),
            })),
        );
        let out = payload(&schema, &form, Some(&RecordId::Num(5)));
        assert_eq!(out["id"], json!(5));
        assert_eq!(out["tags"], json!("[\"video\"]"));
        assert_eq!(out["skills"], json!([{"id": 3, "skill_name": "Editing"}]));
        assert_eq!(out["thumbnail"], Value::Null);
        assert_eq!(out["gallery"], json!(["https://cdn/a.png"]));
        assert_eq!(out["budget"], Value::Null);
    }
}
