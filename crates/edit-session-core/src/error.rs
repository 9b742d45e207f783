// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for edit sessions and entity schemas.

use crate::value::SlotStatus;
use std::fmt;
use thiserror::Error;

/// Why a field failed local validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// Required field is empty.
    Missing,
    /// An upload is still in flight.
    UploadInProgress,
    /// Required upload field has slots that are not validated.
    UploadIncomplete,
}

/// One offending field reported by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Field name.
    pub field: String,
    /// Problem found.
    pub kind: IssueKind,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            IssueKind::Missing => "required",
            IssueKind::UploadInProgress => "upload in progress",
            IssueKind::UploadIncomplete => "upload incomplete",
        };
        write!(f, "{} ({what})", self.field)
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Recoverable errors returned to the host. None of these leave the session unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The actor may not edit this entity.
    #[error("unauthorized: session is read-only")]
    Unauthorized,
    /// Local validation rejected the form before submission.
    #[error("validation failed: {}", join_issues(.0))]
    ValidationFailed(Vec<FieldIssue>),
    /// A load response was superseded by a newer load or by user edits.
    #[error("stale load response (generation {ticket}, current {current})")]
    LoadStale {
        /// Generation of the ticket that was presented.
        ticket: u64,
        /// Generation the session currently accepts, if any.
        current: u64,
    },
    /// Host transport (load, save, delete, lookup) failed.
    #[error("transport failed: {0}")]
    TransportFailed(String),
    /// Raw record could not be interpreted.
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// No field with this name in the schema.
    #[error("unknown field: {0}")]
    UnknownField(String),
    /// Value shape does not match the field kind.
    #[error("type mismatch for `{field}`: expected {expected}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Accepted shape.
        expected: &'static str,
    },
    /// Upload slot cannot move between these states.
    #[error("invalid transition for `{field}`[{index}]: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Field name.
        field: String,
        /// Slot index.
        index: usize,
        /// Current status.
        from: SlotStatus,
        /// Requested status.
        to: SlotStatus,
    },
    /// Slot index outside the field's slots.
    #[error("slot {index} out of range for `{field}`")]
    SlotOutOfRange {
        /// Field name.
        field: String,
        /// Requested index.
        index: usize,
    },
    /// Operation needs a persisted entity id.
    #[error("entity has not been saved yet")]
    NotPersisted,
}

/// Programmer errors detected while building an [`crate::schema::EntitySchema`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two fields share a name.
    #[error("duplicate field `{0}`")]
    DuplicateField(String),
    /// Derived field has no sources.
    #[error("derived field `{0}` has no sources")]
    NoSources(String),
    /// Derived field names a source that does not exist.
    #[error("derived field `{field}` references unknown field `{missing}`")]
    UnknownSource {
        /// Derived field.
        field: String,
        /// Missing source name.
        missing: String,
    },
    /// Derived field reads another derived field (or itself).
    #[error("derived field `{field}` reads derived field `{other}`")]
    DerivedSource {
        /// Derived field.
        field: String,
        /// Offending source.
        other: String,
    },
    /// Upload field used as a derived source.
    #[error("derived field `{field}` reads upload field `{other}`")]
    UploadSource {
        /// Derived field.
        field: String,
        /// Offending source.
        other: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_fields() {
        let err = SessionError::ValidationFailed(vec![
            FieldIssue {
                field: "project_title".into(),
                kind: IssueKind::Missing,
            },
            FieldIssue {
                field: "gallery".into(),
                kind: IssueKind::UploadInProgress,
            },
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: project_title (required), gallery (upload in progress)"
        );
    }
}
