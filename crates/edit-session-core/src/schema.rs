// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Field specifications and per-entity schemas.
//!
//! An [`EntitySchema`] is the one place an editor screen declares its fields.
//! Everything else (canonicalization, derivation, dirty comparison, payload
//! serialization) dispatches on [`FieldKind`].

use crate::error::SchemaError;
use crate::value::{FieldValue, FormState, TagCollection, UploadSlot, UploadValue};
use serde_json::Value;
use std::collections::BTreeMap;

/// Accepted shape of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    /// String; missing/null becomes `""`.
    Text,
    /// Number; numeric strings are coerced, blank becomes `null`.
    Number,
    /// Boolean; `"true"`/`"false"`/`0`/`1` are coerced, missing becomes `false`.
    Bool,
    /// Any JSON scalar, stored as-is.
    Any,
}

/// Wire representation produced when a tag collection is serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireShape {
    /// JSON array of strings / `{id, label}` objects.
    Array,
    /// The same array, JSON-encoded into a string (`'["a","b"]'`).
    JsonString,
    /// Array of objects keyed by `label_key` (and `id_key` when the entry has an id).
    ObjectList {
        /// Label property (e.g. `skill_name`).
        label_key: String,
        /// Id property.
        id_key: String,
    },
}

/// How a tag-collection field is read from and written to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Shape written by serialization.
    pub wire: WireShape,
    /// Extra object properties recognized as the label, in priority order.
    pub label_keys: Vec<String>,
    /// Extra object properties recognized as the id, in priority order.
    pub id_keys: Vec<String>,
}

const BUILTIN_LABEL_KEYS: [&str; 2] = ["label", "name"];
const BUILTIN_ID_KEYS: [&str; 1] = ["id"];

impl CollectionSpec {
    /// Native array on the wire.
    pub fn array() -> Self {
        Self {
            wire: WireShape::Array,
            label_keys: Vec::new(),
            id_keys: Vec::new(),
        }
    }

    /// JSON-encoded string on the wire.
    pub fn json_string() -> Self {
        Self {
            wire: WireShape::JsonString,
            ..Self::array()
        }
    }

    /// Object list on the wire, labels under `label_key`, ids under `id`.
    pub fn object_list(label_key: impl Into<String>) -> Self {
        let label_key = label_key.into();
        Self {
            wire: WireShape::ObjectList {
                label_key: label_key.clone(),
                id_key: "id".to_string(),
            },
            label_keys: vec![label_key],
            id_keys: Vec::new(),
        }
    }

    /// Also accept `key` as a label property when reading.
    pub fn with_label_key(mut self, key: impl Into<String>) -> Self {
        self.label_keys.push(key.into());
        self
    }

    /// Also accept `key` as an id property when reading. For object-list wire
    /// shapes the first custom id key is also the one written.
    pub fn with_id_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if let WireShape::ObjectList { id_key, .. } = &mut self.wire {
            if self.id_keys.is_empty() {
                id_key.clone_from(&key);
            }
        }
        self.id_keys.push(key);
        self
    }

    /// Label properties in lookup order: configured first, then built-ins.
    pub fn label_key_order(&self) -> impl Iterator<Item = &str> {
        self.label_keys
            .iter()
            .map(String::as_str)
            .chain(BUILTIN_LABEL_KEYS)
    }

    /// Id properties in lookup order: configured first, then built-ins.
    pub fn id_key_order(&self) -> impl Iterator<Item = &str> {
        self.id_keys
            .iter()
            .map(String::as_str)
            .chain(BUILTIN_ID_KEYS)
    }
}

/// Number of files an upload field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadArity {
    /// Exactly one slot.
    Single,
    /// Ordered list of slots.
    Multi,
}

/// Pure function from source values to a derived value.
#[derive(Debug, Clone, Copy)]
pub enum Transform {
    /// URL slug of the joined sources.
    Slugify {
        /// Maximum slug length in bytes (ASCII only).
        max_len: usize,
    },
    /// Lower-cased joined sources.
    Lowercase,
    /// Whitespace-collapsed sources cut to `max_chars`.
    Truncate {
        /// Maximum characters.
        max_chars: usize,
    },
    /// Like `Truncate`, with markup tags stripped first (rich-text bodies).
    Excerpt {
        /// Maximum characters.
        max_chars: usize,
    },
    /// Host-supplied pure function.
    Custom(fn(&[&FieldValue]) -> String),
}

/// Sources and transform of a derived field.
#[derive(Debug, Clone)]
pub struct DerivedSpec {
    /// Source field names, in the order handed to the transform.
    pub sources: Vec<String>,
    /// Transform applied to the sources.
    pub transform: Transform,
}

/// Kind of a field, with whatever the kind needs to be interpreted.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Plain value.
    Scalar(ScalarType),
    /// Multi-valued associative field (tags, skills, categories).
    Tags(CollectionSpec),
    /// Attached file(s).
    Upload(UploadArity),
    /// Computed from other fields until touched.
    Derived(DerivedSpec),
}

impl FieldKind {
    /// Short name for diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Tags(_) => "tag-collection",
            Self::Upload(_) => "upload-slot",
            Self::Derived(_) => "derived",
        }
    }
}

/// One form field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name, also the wire key.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
    /// Must be non-empty before submit.
    pub required: bool,
}

impl FieldSpec {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }

    /// Text scalar.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Text))
    }

    /// Numeric scalar.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Number))
    }

    /// Boolean scalar.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Bool))
    }

    /// Untyped scalar.
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar(ScalarType::Any))
    }

    /// Tag collection.
    pub fn tags(name: impl Into<String>, spec: CollectionSpec) -> Self {
        Self::new(name, FieldKind::Tags(spec))
    }

    /// Single-file upload.
    pub fn upload(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Upload(UploadArity::Single))
    }

    /// Multi-file upload.
    pub fn uploads(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Upload(UploadArity::Multi))
    }

    /// Derived field.
    pub fn derived<I, S>(name: impl Into<String>, sources: I, transform: Transform) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::Derived(DerivedSpec {
                sources: sources.into_iter().map(Into::into).collect(),
                transform,
            }),
        )
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value of this field in a freshly opened "new entity" session.
    pub fn default_value(&self) -> FieldValue {
        match &self.kind {
            FieldKind::Scalar(ScalarType::Text) | FieldKind::Derived(_) => FieldValue::text(""),
            FieldKind::Scalar(ScalarType::Bool) => FieldValue::Scalar(Value::Bool(false)),
            FieldKind::Scalar(ScalarType::Number | ScalarType::Any) => {
                FieldValue::Scalar(Value::Null)
            }
            FieldKind::Tags(_) => FieldValue::Tags(TagCollection::new()),
            FieldKind::Upload(UploadArity::Single) => {
                FieldValue::Upload(UploadValue::Single(UploadSlot::pending()))
            }
            FieldKind::Upload(UploadArity::Multi) => FieldValue::Upload(UploadValue::Multi(vec![])),
        }
    }
}

/// Field list for one entity type, validated on construction.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    entity: String,
    id_key: String,
    owner_key: Option<String>,
    fields: Vec<FieldSpec>,
    index: BTreeMap<String, usize>,
}

impl EntitySchema {
    /// Build and check a schema.
    ///
    /// Derived fields must name at least one existing, non-derived,
    /// non-upload source, so a single derivation pass always reaches a
    /// fixed point.
    pub fn new(entity: impl Into<String>, fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let mut index = BTreeMap::new();
        for (i, f) in fields.iter().enumerate() {
            if index.insert(f.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateField(f.name.clone()));
            }
        }
        for f in &fields {
            let FieldKind::Derived(d) = &f.kind else {
                continue;
            };
            if d.sources.is_empty() {
                return Err(SchemaError::NoSources(f.name.clone()));
            }
            for src in &d.sources {
                let Some(&i) = index.get(src) else {
                    return Err(SchemaError::UnknownSource {
                        field: f.name.clone(),
                        missing: src.clone(),
                    });
                };
                match fields[i].kind {
                    FieldKind::Derived(_) => {
                        return Err(SchemaError::DerivedSource {
                            field: f.name.clone(),
                            other: src.clone(),
                        })
                    }
                    FieldKind::Upload(_) => {
                        return Err(SchemaError::UploadSource {
                            field: f.name.clone(),
                            other: src.clone(),
                        })
                    }
                    FieldKind::Scalar(_) | FieldKind::Tags(_) => {}
                }
            }
        }
        Ok(Self {
            entity: entity.into(),
            id_key: "id".to_string(),
            owner_key: None,
            fields,
            index,
        })
    }

    /// Record property holding the entity id (default `id`).
    pub fn with_id_key(mut self, key: impl Into<String>) -> Self {
        self.id_key = key.into();
        self
    }

    /// Record property holding the owning user's id.
    pub fn with_owner_key(mut self, key: impl Into<String>) -> Self {
        self.owner_key = Some(key.into());
        self
    }

    /// Entity type name (`project`, `client`, ...).
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Id property name.
    pub fn id_key(&self) -> &str {
        &self.id_key
    }

    /// Owner property name.
    pub fn owner_key(&self) -> Option<&str> {
        self.owner_key.as_deref()
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Derived fields with their specs, in declaration order.
    pub fn derived(&self) -> impl Iterator<Item = (&FieldSpec, &DerivedSpec)> {
        self.fields.iter().filter_map(|f| match &f.kind {
            FieldKind::Derived(d) => Some((f, d)),
            _ => None,
        })
    }

    /// Default form state (before derivation).
    pub fn default_state(&self) -> FormState {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.default_value()))
            .collect()
    }
}
