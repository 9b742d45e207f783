// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Upload slot tracker.
//!
//! Each slot moves `Pending -> Uploading -> Validated`. A `Failed` report
//! reverts the slot to `Pending`; the failure itself is returned to the host
//! and never stored in the form.
//!
//! Multi-file fields grow by addressing `index == len`.

use crate::error::SessionError;
use crate::schema::{EntitySchema, FieldKind, UploadArity};
use crate::value::{FieldValue, FormState, SlotStatus, UploadSlot, UploadValue};

/// What a slot update did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    /// Slot now holds the requested status.
    Updated,
    /// Upload failed; slot was reset to `Pending`.
    Reverted,
}

fn upload_arity(schema: &EntitySchema, field: &str) -> Result<UploadArity, SessionError> {
    match schema.field(field) {
        Some(spec) => match spec.kind {
            FieldKind::Upload(arity) => Ok(arity),
            _ => Err(SessionError::TypeMismatch {
                field: field.to_string(),
                expected: "upload-slot field",
            }),
        },
        None => Err(SessionError::UnknownField(field.to_string())),
    }
}

fn upload_mut<'a>(
    form: &'a mut FormState,
    schema: &EntitySchema,
    field: &str,
) -> Result<&'a mut UploadValue, SessionError> {
    let arity = upload_arity(schema, field)?;
    let entry = form.entry(field.to_string()).or_insert_with(|| {
        FieldValue::Upload(match arity {
            UploadArity::Single => UploadValue::Single(UploadSlot::pending()),
            UploadArity::Multi => UploadValue::Multi(Vec::new()),
        })
    });
    match entry {
        FieldValue::Upload(u) => Ok(u),
        _ => Err(SessionError::TypeMismatch {
            field: field.to_string(),
            expected: "upload-slot value",
        }),
    }
}

fn next_slot(
    current: &UploadSlot,
    field: &str,
    index: usize,
    status: SlotStatus,
    url: Option<String>,
) -> Result<UploadSlot, SessionError> {
    use SlotStatus::{Failed, Pending, Uploading, Validated};
    let invalid = || SessionError::InvalidTransition {
        field: field.to_string(),
        index,
        from: current.status,
        to: status,
    };
    let url = url.filter(|u| !u.trim().is_empty());
    match (current.status, status) {
        (_, Pending) | (Uploading, Failed) => Ok(UploadSlot::pending()),
        // Keep the last committed url while the replacement is in flight.
        (Pending | Validated, Uploading) => Ok(UploadSlot {
            status: Uploading,
            url: url.or_else(|| current.url.clone()),
        }),
        (_, Validated) => match url {
            Some(url) => Ok(UploadSlot::validated(url)),
            None => Err(invalid()),
        },
        (Uploading, Uploading) | (Pending | Validated | Failed, Failed) | (Failed, Uploading) => {
            Err(invalid())
        }
    }
}

/// Move slot `index` of `field` to `status`.
pub fn set_slot(
    form: &mut FormState,
    schema: &EntitySchema,
    field: &str,
    index: usize,
    status: SlotStatus,
    url: Option<String>,
) -> Result<SlotOutcome, SessionError> {
    let value = upload_mut(form, schema, field)?;
    let out_of_range = || SessionError::SlotOutOfRange {
        field: field.to_string(),
        index,
    };
    let slot = match value {
        UploadValue::Single(slot) if index == 0 => slot,
        UploadValue::Single(_) => return Err(out_of_range()),
        UploadValue::Multi(slots) => {
            if index == slots.len() {
                // Appending: validate against a virtual pending slot first.
                let next = next_slot(&UploadSlot::pending(), field, index, status, url)?;
                slots.push(next);
                return Ok(SlotOutcome::Updated);
            }
            slots.get_mut(index).ok_or_else(out_of_range)?
        }
    };
    *slot = next_slot(slot, field, index, status, url)?;
    Ok(if status == SlotStatus::Failed {
        SlotOutcome::Reverted
    } else {
        SlotOutcome::Updated
    })
}

/// Append an empty slot to a multi-file field. Returns its index.
pub fn push_slot(form: &mut FormState, schema: &EntitySchema, field: &str) -> Result<usize, SessionError> {
    match upload_mut(form, schema, field)? {
        UploadValue::Multi(slots) => {
            slots.push(UploadSlot::pending());
            Ok(slots.len() - 1)
        }
        UploadValue::Single(_) => Err(SessionError::SlotOutOfRange {
            field: field.to_string(),
            index: 1,
        }),
    }
}

/// Remove slot `index` from a multi-file field, or clear a single-file field.
pub fn remove_slot(
    form: &mut FormState,
    schema: &EntitySchema,
    field: &str,
    index: usize,
) -> Result<UploadSlot, SessionError> {
    let out_of_range = || SessionError::SlotOutOfRange {
        field: field.to_string(),
        index,
    };
    match upload_mut(form, schema, field)? {
        UploadValue::Multi(slots) if index < slots.len() => Ok(slots.remove(index)),
        UploadValue::Single(slot) if index == 0 => Ok(std::mem::take(slot)),
        UploadValue::Multi(_) | UploadValue::Single(_) => Err(out_of_range()),
    }
}

/// True when every slot of `field` is validated. Unknown or non-upload fields are never validated.
pub fn is_field_validated(form: &FormState, field: &str) -> bool {
    form.get(field)
        .and_then(FieldValue::as_upload)
        .is_some_and(UploadValue::is_validated)
}

/// Upload fields that still have a transfer in flight, in schema order.
pub fn uploading_fields(form: &FormState, schema: &EntitySchema) -> Vec<String> {
    schema
        .fields()
        .iter()
        .filter(|f| {
            form.get(&f.name)
                .and_then(FieldValue::as_upload)
                .is_some_and(UploadValue::is_uploading)
        })
        .map(|f| f.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::schema::FieldSpec;

    fn schema() -> EntitySchema {
        EntitySchema::new(
            "project",
            vec![
                FieldSpec::text("project_title"),
                FieldSpec::upload("thumbnail"),
                FieldSpec::uploads("gallery"),
            ],
        )
        .unwrap()
    }

    fn slot(form: &FormState, field: &str, index: usize) -> UploadSlot {
        form[field].as_upload().unwrap().slots()[index].clone()
    }

    #[test]
    fn single_slot_happy_path() {
        let schema = schema();
        let mut form = schema.default_state();
        set_slot(&mut form, &schema, "thumbnail", 0, SlotStatus::Uploading, None).unwrap();
        assert_eq!(slot(&form, "thumbnail", 0).status, SlotStatus::Uploading);
        assert!(!is_field_validated(&form, "thumbnail"));
        assert_eq!(uploading_fields(&form, &schema), vec!["thumbnail".to_string()]);

        set_slot(
            &mut form,
            &schema,
            "thumbnail",
            0,
            SlotStatus::Validated,
            Some("https://cdn/x.png".into()),
        )
        .unwrap();
        assert!(is_field_validated(&form, "thumbnail"));
        assert!(uploading_fields(&form, &schema).is_empty());
    }

    #[test]
    fn failure_reverts_to_pending() {
        let schema = schema();
        let mut form = schema.default_state();
        set_slot(&mut form, &schema, "thumbnail", 0, SlotStatus::Validated, Some("a".into())).unwrap();
        set_slot(&mut form, &schema, "thumbnail", 0, SlotStatus::Uploading, None).unwrap();
        assert_eq!(slot(&form, "thumbnail", 0).url.as_deref(), Some("a"));

        let out = set_slot(&mut form, &schema, "thumbnail", 0, SlotStatus::Failed, None).unwrap();
        assert_eq!(out, SlotOutcome::Reverted);
        assert_eq!(slot(&form, "thumbnail", 0), UploadSlot::pending());
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let schema = schema();
        let mut form = schema.default_state();
        let err = set_slot(&mut form, &schema, "thumbnail", 0, SlotStatus::Failed, None);
        assert!(matches!(err, Err(SessionError::InvalidTransition { .. })));

        let err = set_slot(&mut form, &schema, "thumbnail", 0, SlotStatus::Validated, Some("  ".into()));
        assert!(matches!(err, Err(SessionError::InvalidTransition { .. })));

        set_slot(&mut form, &schema, "thumbnail", 0, SlotStatus::Uploading, None).unwrap();
        let err = set_slot(&mut form, &schema, "thumbnail", 0, SlotStatus::Uploading, None);
        assert!(matches!(err, Err(SessionError::InvalidTransition { .. })));
    }

    #[test]
    fn multi_slots_grow_and_shrink() {
        let schema = schema();
        let mut form = schema.default_state();
        set_slot(&mut form, &schema, "gallery", 0, SlotStatus::Uploading, None).unwrap();
        set_slot(&mut form, &schema, "gallery", 1, SlotStatus::Validated, Some("b".into())).unwrap();
        let err = set_slot(&mut form, &schema, "gallery", 5, SlotStatus::Uploading, None);
        assert!(matches!(err, Err(SessionError::SlotOutOfRange { index: 5, .. })));
        assert!(!is_field_validated(&form, "gallery"));

        set_slot(&mut form, &schema, "gallery", 0, SlotStatus::Validated, Some("a".into())).unwrap();
        assert!(is_field_validated(&form, "gallery"));

        assert_eq!(push_slot(&mut form, &schema, "gallery").unwrap(), 2);
        assert!(!is_field_validated(&form, "gallery"));
        let removed = remove_slot(&mut form, &schema, "gallery", 2).unwrap();
        assert_eq!(removed, UploadSlot::pending());
        assert!(is_field_validated(&form, "gallery"));
    }

    #[test]
    fn single_slot_index_must_be_zero() {
        let schema = schema();
        let mut form = schema.default_state();
        let err = set_slot(&mut form, &schema, "thumbnail", 1, SlotStatus::Uploading, None);
        assert!(matches!(err, Err(SessionError::SlotOutOfRange { .. })));
        assert!(push_slot(&mut form, &schema, "thumbnail").is_err());
    }

    #[test]
    fn non_upload_fields_are_rejected() {
        let schema = schema();
        let mut form = schema.default_state();
        let err = set_slot(&mut form, &schema, "project_title", 0, SlotStatus::Uploading, None);
        assert!(matches!(err, Err(SessionError::TypeMismatch { .. })));
        let err = set_slot(&mut form, &schema, "nope", 0, SlotStatus::Uploading, None);
        assert_eq!(err, Err(SessionError::UnknownField("nope".into())));
        assert!(!is_field_validated(&form, "project_title"));
    }
}
