// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Derived field engine: slugs and SEO fields that follow their sources
//! until the user edits them directly.

use crate::schema::{DerivedSpec, EntitySchema, Transform};
use crate::value::{FieldValue, FormState};
use std::collections::BTreeSet;

/// Fields the user has edited directly. Append-only between resets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchedSet {
    names: BTreeSet<String>,
}

impl TouchedSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name`. Returns `true` if it was not already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    /// Whether `name` was touched.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Touched names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of touched fields.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when nothing was touched.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Compute the value a derived field would take from the current form.
pub fn derive_value(spec: &DerivedSpec, form: &FormState) -> FieldValue {
    let sources: Vec<&FieldValue> = spec.sources.iter().filter_map(|s| form.get(s)).collect();
    let joined = || {
        sources
            .iter()
            .map(|v| v.as_source_text())
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    };
    let out = match spec.transform {
        Transform::Slugify { max_len } => slugify(&joined(), max_len),
        Transform::Lowercase => joined().to_lowercase(),
        Transform::Truncate { max_chars } => truncate_chars(&collapse_ws(&joined()), max_chars),
        Transform::Excerpt { max_chars } => {
            truncate_chars(&collapse_ws(&strip_markup(&joined())), max_chars)
        }
        Transform::Custom(f) => f(&sources),
    };
    FieldValue::text(out)
}

/// Recompute every untouched derived field. Fields whose value would not
/// change are left alone. Returns the names that changed.
///
/// Never marks anything touched.
pub fn recompute(form: &mut FormState, touched: &TouchedSet, schema: &EntitySchema) -> Vec<String> {
    let mut changed = Vec::new();
    for (field, spec) in schema.derived() {
        if touched.contains(&field.name) {
            continue;
        }
        let next = derive_value(spec, form);
        if form.get(&field.name) != Some(&next) {
            form.insert(field.name.clone(), next);
            changed.push(field.name.clone());
        }
    }
    changed
}

/// Lower-case ASCII slug: runs of anything but `[a-z0-9]` become one `-`,
/// no leading or trailing `-`, at most `max_len` bytes.
pub fn slugify(input: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_len));
    let mut pending_dash = false;
    for ch in input.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                if out.len() + 2 > max_len {
                    break;
                }
                out.push('-');
            }
            if out.len() + 1 > max_len {
                break;
            }
            pending_dash = false;
            out.push(ch);
        } else if ch != '\'' {
            pending_dash = true;
        }
    }
    out
}

fn collapse_ws(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((cut, _)) => input[..cut].trim_end().to_string(),
        None => input.to_string(),
    }
}

/// Drop `<...>` tags, keeping a space where each tag was.
fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
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
                FieldSpec::text("description"),
                FieldSpec::derived("url", ["project_title"], Transform::Slugify { max_len: 80 }),
                FieldSpec::derived(
                    "seo_description",
                    ["description"],
                    Transform::Excerpt { max_chars: 12 },
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn slugify_cases() {
        assert_eq!(slugify("Demo", 80), "demo");
        assert_eq!(slugify("Demo Two", 80), "demo-two");
        assert_eq!(slugify("  Hello,   World!! ", 80), "hello-world");
        assert_eq!(slugify("Client's Reel 2024", 80), "clients-reel-2024");
        assert_eq!(slugify("Café au lait", 80), "caf-au-lait");
        assert_eq!(slugify("---", 80), "");
        assert_eq!(slugify("alpha beta gamma", 10), "alpha-beta");
        assert_eq!(slugify("alpha beta", 6), "alpha");
    }

    #[test]
    fn excerpt_strips_tags_and_truncates() {
        let spec = DerivedSpec {
            sources: vec!["body".into()],
            transform: Transform::Excerpt { max_chars: 11 },
        };
        let mut form = FormState::new();
        form.insert("body".into(), FieldValue::text("<p>Hello</p><p>brave   new world</p>"));
        assert_eq!(derive_value(&spec, &form), FieldValue::text("Hello brave"));
    }

    #[test]
    fn recompute_follows_untouched_sources_only() {
        let schema = schema();
        let mut form = schema.default_state();
        form.insert("project_title".into(), FieldValue::text("Demo Two"));
        form.insert("description".into(), FieldValue::text("A short film about rivers"));

        let mut touched = TouchedSet::new();
        touched.insert("seo_description");
        let changed = recompute(&mut form, &touched, &schema);

        assert_eq!(changed, vec!["url".to_string()]);
        assert_eq!(form["url"], FieldValue::text("demo-two"));
        assert_eq!(form["seo_description"], FieldValue::text(""));
        assert_eq!(touched.len(), 1);
    }

    #[test]
    fn recompute_is_quiet_when_nothing_changes() {
        let schema = schema();
        let mut form = schema.default_state();
        form.insert("project_title".into(), FieldValue::text("Demo"));
        let touched = TouchedSet::new();
        assert_eq!(recompute(&mut form, &touched, &schema).len(), 1);
        assert!(recompute(&mut form, &touched, &schema).is_empty());
    }

    #[test]
    fn custom_transform_receives_sources_in_order() {
        fn initials(values: &[&FieldValue]) -> String {
            values
                .iter()
                .filter_map(|v| v.as_str().and_then(|s| s.chars().next()))
                .collect()
        }
        let spec = DerivedSpec {
            sources: vec!["first".into(), "last".into()],
            transform: Transform::Custom(initials),
        };
        let mut form = FormState::new();
        form.insert("first".into(), FieldValue::text("Ada"));
        form.insert("last".into(), FieldValue::text("Lovelace"));
        assert_eq!(derive_value(&spec, &form), FieldValue::text("AL"));
    }
}
