// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Snapshot baseline and the field-kind-aware dirty comparator.
//!
//! Dirtiness is never stored. It is recomputed from `(FormState, Snapshot)`
//! on every query, so it cannot drift from the data it describes.

use crate::schema::{EntitySchema, FieldKind};
use crate::value::{FieldValue, FormState, TagCollection, UploadValue};
use serde_json::Value;
use std::sync::Arc;

/// Immutable baseline taken at load time and after each successful save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    state: Arc<FormState>,
}

impl Snapshot {
    /// Deep copy of `form`.
    pub fn take(form: &FormState) -> Self {
        Self {
            state: Arc::new(form.clone()),
        }
    }

    /// Baseline values.
    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// Baseline value of one field.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.state.get(field)
    }
}

fn tags_equal(a: &TagCollection, b: &TagCollection) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

fn uploads_equal(a: &UploadValue, b: &UploadValue) -> bool {
    // An in-flight upload is uncommitted, whatever url it still shows.
    if a.is_uploading() || b.is_uploading() {
        return false;
    }
    let (a, b) = (a.slots(), b.slots());
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.tuple() == y.tuple())
}

/// Numbers compare by value, so `1500` and `1500.0` are equal.
#[allow(clippy::float_cmp)]
fn scalars_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_f64() || y.is_f64() => {
            x.as_f64() == y.as_f64()
        }
        _ => a == b,
    }
}

fn values_equal(kind: Option<&FieldKind>, current: &FieldValue, baseline: &FieldValue) -> bool {
    match (kind, current, baseline) {
        (
            Some(FieldKind::Scalar(_) | FieldKind::Derived(_)) | None,
            FieldValue::Scalar(a),
            FieldValue::Scalar(b),
        ) => scalars_equal(a, b),
        (Some(FieldKind::Tags(_)) | None, FieldValue::Tags(a), FieldValue::Tags(b)) => {
            tags_equal(a, b)
        }
        (Some(FieldKind::Upload(_)) | None, FieldValue::Upload(a), FieldValue::Upload(b)) => {
            uploads_equal(a, b)
        }
        // Value shape disagrees with the schema or with the baseline.
        _ => false,
    }
}

/// Whether one field differs from its baseline. A field missing on either
/// side counts as a difference.
pub fn field_differs(
    schema: &EntitySchema,
    field: &str,
    current: Option<&FieldValue>,
    baseline: Option<&FieldValue>,
) -> bool {
    match (current, baseline) {
        (Some(c), Some(b)) => !values_equal(schema.field(field).map(|f| &f.kind), c, b),
        (None, None) => false,
        _ => true,
    }
}

/// Names of fields that differ from the snapshot: schema fields first, in
/// declaration order, then any extra names in sorted order.
pub fn dirty_fields(form: &FormState, snapshot: &Snapshot, schema: &EntitySchema) -> Vec<String> {
    let mut out: Vec<String> = schema
        .fields()
        .iter()
        .filter(|f| field_differs(schema, &f.name, form.get(&f.name), snapshot.get(&f.name)))
        .map(|f| f.name.clone())
        .collect();

    let extras = form
        .keys()
        .chain(snapshot.state().keys())
        .filter(|name| schema.field(name).is_none());
    let mut extras: Vec<&String> = extras.collect();
    extras.sort();
    extras.dedup();
    for name in extras {
        if field_differs(schema, name, form.get(name), snapshot.get(name)) {
            out.push(name.clone());
        }
    }
    out
}

/// True iff `form` is not structurally equal to `snapshot`.
pub fn is_dirty(form: &FormState, snapshot: &Snapshot, schema: &EntitySchema) -> bool {
    let names = form.keys().chain(snapshot.state().keys());
    for name in names {
        if field_differs(schema, name, form.get(name), snapshot.get(name)) {
            return true;
        }
    }
    false
}
