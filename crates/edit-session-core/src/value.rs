// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory form values: scalars, canonical tag collections and upload slots.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Working state of an edit session, keyed by field name.
pub type FormState = BTreeMap<String, FieldValue>;

/// Identifier carried by server records and keyed tag entries.
///
/// Servers hand back both numeric and string ids; the original shape is kept
/// so payloads round-trip without changing type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Integer id (`42`).
    Num(i64),
    /// String id (`"b7f1"`).
    Text(String),
}

impl RecordId {
    /// Read an id from a raw JSON value. Empty strings and non-integers yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Num),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    Some(Self::Text(s.to_string()))
                }
            }
            _ => None,
        }
    }

    /// JSON form of the id.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Num(n) => Value::from(*n),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// One normalized entry of a tag collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagEntry {
    /// Entry that came with a server id (skills, categories).
    Keyed {
        /// Server id.
        id: RecordId,
        /// Display label.
        label: String,
    },
    /// Free-form label.
    Plain(String),
}

/// Dedupe key of a tag entry: keyed entries by id, plain entries by label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKey<'a> {
    /// Keyed entry.
    Id(&'a RecordId),
    /// Plain entry.
    Label(&'a str),
}

impl TagEntry {
    /// Build a plain entry.
    pub fn plain(label: impl Into<String>) -> Self {
        Self::Plain(label.into())
    }

    /// Build a keyed entry.
    pub fn keyed(id: impl Into<RecordId>, label: impl Into<String>) -> Self {
        Self::Keyed {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Display label.
    pub fn label(&self) -> &str {
        match self {
            Self::Keyed { label, .. } | Self::Plain(label) => label,
        }
    }

    /// Server id, if the entry carries one.
    pub fn id(&self) -> Option<&RecordId> {
        match self {
            Self::Keyed { id, .. } => Some(id),
            Self::Plain(_) => None,
        }
    }

    /// Key used to reject duplicates.
    pub fn key(&self) -> TagKey<'_> {
        match self {
            Self::Keyed { id, .. } => TagKey::Id(id),
            Self::Plain(label) => TagKey::Label(label),
        }
    }
}

/// Ordered set of tag entries. Insertion order is kept; duplicate keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TagEntry>", into = "Vec<TagEntry>")]
pub struct TagCollection {
    entries: Vec<TagEntry>,
}

impl TagCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry unless its key is already present. Returns `true` when inserted.
    pub fn push(&mut self, entry: TagEntry) -> bool {
        if self.contains_key(entry.key()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Remove the entry with `key`. Returns the removed entry.
    pub fn remove(&mut self, key: TagKey<'_>) -> Option<TagEntry> {
        let pos = self.entries.iter().position(|e| e.key() == key)?;
        Some(self.entries.remove(pos))
    }

    /// Whether an entry with `key` exists.
    pub fn contains_key(&self, key: TagKey<'_>) -> bool {
        self.entries.iter().any(|e| e.key() == key)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, TagEntry> {
        self.entries.iter()
    }

    /// Labels in insertion order.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(TagEntry::label).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Native JSON form: plain entries as strings, keyed entries as `{id, label}`.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|e| match e {
                    TagEntry::Plain(label) => Value::String(label.clone()),
                    TagEntry::Keyed { id, label } => serde_json::json!({
                        "id": id.to_value(),
                        "label": label,
                    }),
                })
                .collect(),
        )
    }
}

impl From<Vec<TagEntry>> for TagCollection {
    fn from(entries: Vec<TagEntry>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<TagCollection> for Vec<TagEntry> {
    fn from(c: TagCollection) -> Self {
        c.entries
    }
}

impl FromIterator<TagEntry> for TagCollection {
    fn from_iter<I: IntoIterator<Item = TagEntry>>(iter: I) -> Self {
        let mut out = Self::new();
        for entry in iter {
            out.push(entry);
        }
        out
    }
}

impl<'a> IntoIterator for &'a TagCollection {
    type Item = &'a TagEntry;
    type IntoIter = std::slice::Iter<'a, TagEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Lifecycle state of one attached file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// No file chosen.
    Pending,
    /// Transport in flight.
    Uploading,
    /// Upload finished; `url` is usable.
    Validated,
    /// Transport error. Never stored: the slot reverts to `Pending`.
    Failed,
}

/// One attached-file slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSlot {
    /// Current status.
    pub status: SlotStatus,
    /// Committed or last-known url.
    pub url: Option<String>,
}

impl UploadSlot {
    /// Empty slot.
    pub fn pending() -> Self {
        Self {
            status: SlotStatus::Pending,
            url: None,
        }
    }

    /// Slot holding an already-uploaded file.
    pub fn validated(url: impl Into<String>) -> Self {
        Self {
            status: SlotStatus::Validated,
            url: Some(url.into()),
        }
    }

    /// `(status, url)` tuple used for comparison.
    pub fn tuple(&self) -> (SlotStatus, Option<&str>) {
        (self.status, self.url.as_deref())
    }
}

impl Default for UploadSlot {
    fn default() -> Self {
        Self::pending()
    }
}

/// Value of an upload field: one slot, or an ordered list of slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadValue {
    /// Single-file field.
    Single(UploadSlot),
    /// Multi-file field.
    Multi(Vec<UploadSlot>),
}

impl UploadValue {
    /// All slots in order.
    pub fn slots(&self) -> &[UploadSlot] {
        match self {
            Self::Single(slot) => std::slice::from_ref(slot),
            Self::Multi(slots) => slots,
        }
    }

    /// True if any slot is still uploading.
    pub fn is_uploading(&self) -> bool {
        self.slots()
            .iter()
            .any(|s| s.status == SlotStatus::Uploading)
    }

    /// Every slot is validated.
    pub fn is_validated(&self) -> bool {
        self.slots()
            .iter()
            .all(|s| s.status == SlotStatus::Validated)
    }
}

/// Current value of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Scalar JSON value (text, number, bool, null). Derived fields are scalars too.
    Scalar(Value),
    /// Canonical tag collection.
    Tags(TagCollection),
    /// Upload slot(s).
    Upload(UploadValue),
}

impl FieldValue {
    /// Text scalar.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Scalar(Value::String(s.into()))
    }

    /// Borrow the scalar string, if this is a text scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Borrow the scalar JSON value.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the tag collection.
    pub fn as_tags(&self) -> Option<&TagCollection> {
        match self {
            Self::Tags(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow the upload value.
    pub fn as_upload(&self) -> Option<&UploadValue> {
        match self {
            Self::Upload(u) => Some(u),
            _ => None,
        }
    }

    /// Text rendering used by derived transforms.
    pub fn as_source_text(&self) -> String {
        match self {
            Self::Scalar(Value::String(s)) => s.clone(),
            Self::Scalar(Value::Null) => String::new(),
            Self::Scalar(v) => v.to_string(),
            Self::Tags(t) => t.labels().join(" "),
            Self::Upload(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_rejects_duplicate_keys_and_keeps_order() {
        let mut tags = TagCollection::new();
        assert!(tags.push(TagEntry::plain("video")));
        assert!(tags.push(TagEntry::plain("audio")));
        assert!(!tags.push(TagEntry::plain("video")));
        assert!(tags.push(TagEntry::keyed(7, "video")));
        assert!(!tags.push(TagEntry::keyed(7, "renamed")));
        assert_eq!(tags.labels(), vec!["video", "audio", "video"]);
    }

    #[test]
    fn remove_by_key() {
        let mut tags: TagCollection = vec![TagEntry::plain("a"), TagEntry::keyed("x1", "b")].into();
        let removed = tags.remove(TagKey::Id(&RecordId::from("x1")));
        assert_eq!(removed, Some(TagEntry::keyed("x1", "b")));
        assert_eq!(tags.len(), 1);
        assert!(tags.remove(TagKey::Label("zzz")).is_none());
    }

    #[test]
    fn record_id_from_value() {
        assert_eq!(RecordId::from_value(&serde_json::json!(3)), Some(RecordId::Num(3)));
        assert_eq!(
            RecordId::from_value(&serde_json::json!(" ab ")),
            Some(RecordId::Text("ab".into()))
        );
        assert_eq!(RecordId::from_value(&serde_json::json!("")), None);
        assert_eq!(RecordId::from_value(&serde_json::json!(1.5)), None);
    }

    #[test]
    fn upload_value_completeness() {
        let multi = UploadValue::Multi(vec![UploadSlot::validated("a"), UploadSlot::pending()]);
        assert!(!multi.is_validated());
        assert!(!multi.is_uploading());
        assert!(UploadValue::Multi(vec![]).is_validated());
    }
}
