// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Authorization gate consulted by every session mutator.

use crate::value::RecordId;
use serde::{Deserialize, Serialize};

/// Dashboard role of the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access to every entity.
    Admin,
    /// May edit entities they own, and create new ones.
    Editor,
    /// Read-only.
    Viewer,
}

/// The user driving a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User id, compared against the entity owner.
    pub id: RecordId,
    /// Role.
    pub role: Role,
}

impl Actor {
    /// Build an actor.
    pub fn new(id: impl Into<RecordId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Ownership facts read from the loaded record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ownership {
    /// Owner id; `None` for new or unowned entities.
    pub owner: Option<RecordId>,
}

/// Decides whether an actor may edit an entity.
pub trait AccessPolicy {
    /// Evaluated once per load; the answer is cached by the session.
    fn can_mutate(&self, actor: &Actor, ownership: &Ownership) -> bool;
}

/// Admins edit everything; editors edit what they own or what has no owner
/// yet; viewers edit nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl AccessPolicy for RolePolicy {
    fn can_mutate(&self, actor: &Actor, ownership: &Ownership) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Editor => ownership.owner.as_ref().is_none_or(|owner| owner == &actor.id),
            Role::Viewer => false,
        }
    }
}

/// Denial returned by [`Gate::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denied {
    /// True only for the first denial since the gate was evaluated.
    pub first: bool,
}

/// Cached authorization decision for one session.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    allowed: bool,
    denial_reported: bool,
}

impl Gate {
    /// Evaluate `policy` for `actor` and cache the answer.
    pub fn evaluate(policy: &dyn AccessPolicy, actor: &Actor, ownership: &Ownership) -> Self {
        Self {
            allowed: policy.can_mutate(actor, ownership),
            denial_reported: false,
        }
    }

    /// Cached decision.
    pub fn can_mutate(&self) -> bool {
        self.allowed
    }

    /// Permit the mutation, or deny it and say whether this is the first denial.
    pub fn check(&mut self) -> Result<(), Denied> {
        if self.allowed {
            return Ok(());
        }
        let first = !self.denial_reported;
        self.denial_reported = true;
        Err(Denied { first })
    }

    /// Make the session read-only (after the entity is deleted).
    pub fn revoke(&mut self) {
        self.allowed = false;
    }
}
