// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-facing ports: entity transport and user confirmation.
//!
//! The engine awaits these but never implements them; the host wires them to
//! its HTTP client and dialog layer. Sessions run on one cooperative loop, so
//! the futures carry no `Send` bound.
#![allow(async_fn_in_trait)]

use crate::guard::{DeletePrompt, LeaveChoice, LeavePrompt};
use crate::value::{RecordId, TagEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server answer to a save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveReceipt {
    /// Id assigned (create) or echoed (update).
    pub id: Option<RecordId>,
}

/// One entry of a lookup list (categories, skills).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOption {
    /// Server id.
    pub id: RecordId,
    /// Display label.
    pub label: String,
}

impl From<LookupOption> for TagEntry {
    fn from(opt: LookupOption) -> Self {
        Self::Keyed {
            id: opt.id,
            label: opt.label,
        }
    }
}

/// Entity transport supplied by the host.
pub trait EntityPort {
    /// Fetch the raw record for `id`.
    async fn load_entity(&self, id: &RecordId) -> anyhow::Result<Value>;
    /// Create or update from a wire-ready payload.
    async fn save_entity(&self, payload: &Value) -> anyhow::Result<SaveReceipt>;
    /// Delete the entity.
    async fn delete_entity(&self, id: &RecordId) -> anyhow::Result<()>;
    /// Fetch choices for a tag/category picker.
    async fn load_lookup_options(&self, kind: &str) -> anyhow::Result<Vec<LookupOption>>;
}

/// Confirmation dialogs supplied by the host.
pub trait ConfirmPort {
    /// Ask save / discard / cancel before leaving a dirty session.
    async fn choose_leave(&self, prompt: &LeavePrompt) -> LeaveChoice;
    /// Ask before a destructive delete. `true` confirms.
    async fn confirm_delete(&self, prompt: &DeletePrompt) -> bool;
}
