// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Navigation guard and confirmation state machines.
//!
//! Leave intents go `Requested -> ConfirmedSave | ConfirmedDiscard | Cancelled`.
//! Destructive actions go `Requested -> Confirmed | Cancelled`. Resolution is
//! delegated to the host through [`crate::ports::ConfirmPort`].

use crate::error::SessionError;
use crate::value::RecordId;

/// Guard state, derived from the dirty flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Form equals its snapshot.
    Clean,
    /// Form has unsaved edits.
    Dirty,
}

impl GuardState {
    /// State for a given dirty flag.
    pub fn from_dirty(dirty: bool) -> Self {
        if dirty {
            Self::Dirty
        } else {
            Self::Clean
        }
    }
}

/// The user's answer to a leave prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveChoice {
    /// Save, then leave if the save succeeds.
    SaveAndLeave,
    /// Drop edits and leave.
    Discard,
    /// Stay.
    Cancel,
}

/// Lifecycle of a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentState {
    /// Waiting for the host's answer.
    Requested,
    /// User chose save-and-leave.
    ConfirmedSave,
    /// User chose discard.
    ConfirmedDiscard,
    /// User chose to stay.
    Cancelled,
}

/// A pending request to leave the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationIntent {
    target: String,
    state: IntentState,
}

impl NavigationIntent {
    /// New intent in `Requested`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            state: IntentState::Requested,
        }
    }

    /// Route the host wants to reach.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Current lifecycle state.
    pub fn state(&self) -> IntentState {
        self.state
    }

    /// Apply the user's choice. Only a `Requested` intent can be resolved;
    /// returns `false` if it was already resolved.
    pub fn resolve(&mut self, choice: LeaveChoice) -> bool {
        if self.state != IntentState::Requested {
            return false;
        }
        self.state = match choice {
            LeaveChoice::SaveAndLeave => IntentState::ConfirmedSave,
            LeaveChoice::Discard => IntentState::ConfirmedDiscard,
            LeaveChoice::Cancel => IntentState::Cancelled,
        };
        true
    }

    /// Consume the intent, returning its target.
    pub fn into_target(self) -> String {
        self.target
    }
}

/// Whether a leave request needs the user's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Leave immediately.
    Proceed,
    /// Ask the host to confirm.
    Confirm,
}

/// Clean sessions and read-only sessions leave without asking.
pub fn decide(dirty: bool, can_mutate: bool) -> GuardDecision {
    if dirty && can_mutate {
        GuardDecision::Confirm
    } else {
        GuardDecision::Proceed
    }
}

/// What the host shows in its leave dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeavePrompt {
    /// Entity type.
    pub entity: String,
    /// Destination route.
    pub target: String,
    /// Fields with unsaved changes.
    pub dirty_fields: Vec<String>,
}

/// How a leave request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing to guard (clean or read-only).
    Unguarded,
    /// Saved, then left.
    Saved,
    /// Edits dropped, then left.
    Discarded,
    /// User chose to stay.
    Cancelled,
    /// Save-and-leave failed; the session stays dirty.
    SaveFailed(SessionError),
}

/// Result of [`crate::session::EditSession::request_navigate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOutcome {
    /// Destination route.
    pub target: String,
    /// How the request ended.
    pub resolution: Resolution,
}

impl NavigationOutcome {
    /// Whether the host may navigate.
    pub fn allowed(&self) -> bool {
        matches!(
            self.resolution,
            Resolution::Unguarded | Resolution::Saved | Resolution::Discarded
        )
    }
}

/// Lifecycle of a destructive-action confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmState {
    /// Waiting for the host's answer.
    Requested,
    /// User confirmed.
    Confirmed,
    /// User declined.
    Cancelled,
}

impl ConfirmState {
    /// Resolve a `Requested` confirmation. Resolved states are final.
    pub fn resolve(self, confirmed: bool) -> Self {
        match self {
            Self::Requested if confirmed => Self::Confirmed,
            Self::Requested => Self::Cancelled,
            done => done,
        }
    }
}

/// What the host shows in its delete dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePrompt {
    /// Entity type.
    pub entity: String,
    /// Entity id.
    pub id: RecordId,
}

/// Result of [`crate::session::EditSession::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Entity deleted; the session is now read-only.
    Deleted,
    /// User declined; nothing happened.
    Cancelled,
}
