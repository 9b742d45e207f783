// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The edit session: one entity's form state, baseline and guard.
//!
//! All field mutation, canonicalization, derivation and dirty computation
//! runs synchronously on the caller's turn. Only [`EditSession::load`],
//! [`EditSession::save`], [`EditSession::delete`],
//! [`EditSession::request_navigate`] and [`EditSession::lookup_options`]
//! suspend, and they hold `&mut self` across the await so a second save
//! cannot start while one is in flight.
//!
//! Sessions live on one cooperative loop; their futures are not `Send`.
#![allow(clippy::future_not_send)]

use crate::auth::{AccessPolicy, Actor, Denied, Gate, Ownership, RolePolicy};
use crate::canon::{canonicalize, normalize_entry};
use crate::derive::{derive_value, recompute, TouchedSet};
use crate::error::{FieldIssue, IssueKind, SessionError};
use crate::guard::{
    decide, ConfirmState, DeleteOutcome, DeletePrompt, GuardDecision, GuardState, IntentState,
    LeavePrompt, NavigationIntent, NavigationOutcome, Resolution,
};
use crate::notice::{Notice, NoticeKind, NoticeQueue, NoticeTopic};
use crate::ports::{ConfirmPort, EntityPort, LookupOption, SaveReceipt};
use crate::record::{self, coerce_scalar, Ingested};
use crate::schema::{EntitySchema, FieldKind, ScalarType};
use crate::settings::SessionConfig;
use crate::snapshot::{self, Snapshot};
use crate::upload::{self, SlotOutcome};
use crate::value::{
    FieldValue, FormState, RecordId, SlotStatus, TagCollection, TagEntry, TagKey, UploadSlot,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Generation token issued by [`EditSession::begin_load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    /// Generation this ticket was issued for.
    pub fn generation(self) -> u64 {
        self.generation
    }
}

/// Editing state for one entity.
pub struct EditSession {
    schema: Arc<EntitySchema>,
    config: SessionConfig,
    actor: Actor,
    policy: Box<dyn AccessPolicy>,
    ownership: Ownership,
    gate: Gate,
    entity_id: Option<RecordId>,
    form: FormState,
    snapshot: Snapshot,
    touched: TouchedSet,
    baseline_touched: TouchedSet,
    notices: NoticeQueue,
    generation: u64,
    pending_load: Option<u64>,
}

impl fmt::Debug for EditSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("entity", &self.schema.entity())
            .field("entity_id", &self.entity_id)
            .field("actor", &self.actor)
            .field("can_mutate", &self.gate.can_mutate())
            .field("touched", &self.touched)
            .field("generation", &self.generation)
            .field("pending_load", &self.pending_load)
            .finish_non_exhaustive()
    }
}

impl EditSession {
    /// Blank session with schema defaults, derived fields computed and the
    /// snapshot taken. Use [`EditSession::load`] to fill it from the server.
    pub fn new(schema: impl Into<Arc<EntitySchema>>, actor: Actor, config: SessionConfig) -> Self {
        let schema = schema.into();
        let policy: Box<dyn AccessPolicy> = Box::new(RolePolicy);
        let ownership = Ownership::default();
        let gate = Gate::evaluate(policy.as_ref(), &actor, &ownership);
        let notices = NoticeQueue::new(config.notice_capacity, config.notice_dedupe_window());
        let mut form = schema.default_state();
        recompute(&mut form, &TouchedSet::new(), &schema);
        Self {
            snapshot: Snapshot::take(&form),
            schema,
            config,
            actor,
            policy,
            ownership,
            gate,
            entity_id: None,
            form,
            touched: TouchedSet::new(),
            baseline_touched: TouchedSet::new(),
            notices,
            generation: 0,
            pending_load: None,
        }
    }

    /// Session for an entity that does not exist yet, seeded from `defaults`
    /// (a JSON object in record shape, or `null`). An id in `defaults` is ignored.
    pub fn new_entity(
        schema: impl Into<Arc<EntitySchema>>,
        actor: Actor,
        config: SessionConfig,
        defaults: &Value,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(schema, actor, config);
        if !defaults.is_null() {
            let mut ingested =
                record::ingest(&session.schema, defaults).map_err(SessionError::MalformedInput)?;
            ingested.id = None;
            session.apply_record(ingested);
        }
        Ok(session)
    }

    /// Replace the access policy and re-evaluate the gate for the current entity.
    pub fn with_policy(mut self, policy: impl AccessPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self.gate = Gate::evaluate(self.policy.as_ref(), &self.actor, &self.ownership);
        self
    }

    // ---------------------------------------------------------------------
    // Loading

    /// Start a load. Any earlier ticket becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.pending_load = Some(self.generation);
        debug!(generation = self.generation, "load started");
        LoadTicket {
            generation: self.generation,
        }
    }

    /// Apply a load response. Responses for superseded tickets, or arriving
    /// after the user started editing, are dropped with `LoadStale`.
    pub fn finish_load(&mut self, ticket: LoadTicket, raw: &Value) -> Result<(), SessionError> {
        if self.pending_load != Some(ticket.generation) {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale load response"
            );
            return Err(SessionError::LoadStale {
                ticket: ticket.generation,
                current: self.generation,
            });
        }
        self.pending_load = None;
        let ingested = record::ingest(&self.schema, raw).map_err(|reason| {
            warn!(entity = self.schema.entity(), %reason, "unreadable record");
            SessionError::MalformedInput(reason)
        })?;
        self.apply_record(ingested);
        debug!(entity = self.schema.entity(), id = ?self.entity_id, "load applied");
        Ok(())
    }

    /// Fetch `id` through `port` and apply it.
    #[instrument(skip_all, fields(entity = %self.schema.entity(), %id))]
    pub async fn load<P: EntityPort>(&mut self, port: &P, id: &RecordId) -> Result<(), SessionError> {
        let ticket = self.begin_load();
        match port.load_entity(id).await {
            Ok(raw) => self.finish_load(ticket, &raw),
            Err(err) => {
                if self.pending_load == Some(ticket.generation) {
                    self.pending_load = None;
                }
                Err(self.transport_failed("Could not load", &err))
            }
        }
    }

    fn apply_record(&mut self, ingested: Ingested) {
        let Ingested {
            mut form,
            loaded_derived,
            warnings,
            id,
            owner,
        } = ingested;

        for (field, reason) in warnings {
            warn!(entity = self.schema.entity(), %field, %reason, "unreadable value; using default");
            self.notify(
                NoticeKind::Warn,
                NoticeTopic::MalformedInput {
                    field: field.clone(),
                },
                format!("Could not read `{field}`"),
                Some(reason),
            );
        }

        // A saved derived value that disagrees with its sources is an earlier override.
        let mut touched = TouchedSet::new();
        for name in loaded_derived {
            let Some(FieldKind::Derived(spec)) = self.schema.field(&name).map(|f| &f.kind) else {
                continue;
            };
            if form.get(&name) != Some(&derive_value(spec, &form)) {
                touched.insert(name);
            }
        }
        recompute(&mut form, &touched, &self.schema);

        self.entity_id = id;
        self.ownership = Ownership { owner };
        self.gate = Gate::evaluate(self.policy.as_ref(), &self.actor, &self.ownership);
        self.snapshot = Snapshot::take(&form);
        self.form = form;
        self.baseline_touched = touched.clone();
        self.touched = touched;
    }

    // ---------------------------------------------------------------------
    // Mutation

    fn check_gate(&mut self) -> Result<(), SessionError> {
        match self.gate.check() {
            Ok(()) => Ok(()),
            Err(Denied { first }) => {
                if first {
                    warn!(
                        entity = self.schema.entity(),
                        actor = %self.actor.id,
                        "edit rejected: session is read-only"
                    );
                    self.notify(
                        NoticeKind::Warn,
                        NoticeTopic::AccessDenied,
                        "You can view this entity but not edit it",
                        None,
                    );
                }
                Err(SessionError::Unauthorized)
            }
        }
    }

    fn note_edit(&mut self) {
        if let Some(generation) = self.pending_load.take() {
            debug!(generation, "edit supersedes pending load");
        }
    }

    fn field_kind(&self, name: &str) -> Result<FieldKind, SessionError> {
        self.schema
            .field(name)
            .map(|f| f.kind.clone())
            .ok_or_else(|| SessionError::UnknownField(name.to_string()))
    }

    /// Set a scalar, tag or derived field from a raw JSON value.
    ///
    /// Setting a derived field marks it touched first, so it stops following
    /// its sources. Upload fields go through [`EditSession::set_slot`].
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), SessionError> {
        self.check_gate()?;
        let kind = self.field_kind(name)?;
        let mismatch = |expected| SessionError::TypeMismatch {
            field: name.to_string(),
            expected,
        };
        let next = match &kind {
            FieldKind::Scalar(ty) => FieldValue::Scalar(coerce_scalar(*ty, &value).map_err(mismatch)?),
            FieldKind::Derived(_) => {
                FieldValue::Scalar(coerce_scalar(ScalarType::Text, &value).map_err(mismatch)?)
            }
            FieldKind::Tags(spec) => {
                let canonical = canonicalize(&value, spec);
                if let Some(reason) = canonical.warning {
                    warn!(field = name, %reason, "unreadable tag input");
                    self.notify(
                        NoticeKind::Warn,
                        NoticeTopic::MalformedInput {
                            field: name.to_string(),
                        },
                        format!("Could not read `{name}`"),
                        Some(reason),
                    );
                }
                FieldValue::Tags(canonical.collection)
            }
            FieldKind::Upload(_) => return Err(mismatch("upload slots (use set_slot)")),
        };
        self.note_edit();
        if matches!(kind, FieldKind::Derived(_)) {
            self.touched.insert(name);
            self.form.insert(name.to_string(), next);
        } else {
            self.form.insert(name.to_string(), next);
            recompute(&mut self.form, &self.touched, &self.schema);
        }
        Ok(())
    }

    fn tags_mut(&mut self, name: &str) -> Result<&mut TagCollection, SessionError> {
        let FieldKind::Tags(_) = self.field_kind(name)? else {
            return Err(SessionError::TypeMismatch {
                field: name.to_string(),
                expected: "tag field",
            });
        };
        let entry = self
            .form
            .entry(name.to_string())
            .or_insert_with(|| FieldValue::Tags(TagCollection::new()));
        match entry {
            FieldValue::Tags(tags) => Ok(tags),
            _ => Err(SessionError::TypeMismatch {
                field: name.to_string(),
                expected: "tag collection",
            }),
        }
    }

    /// Append a tag. The label is trimmed the way loaded tags are; a blank
    /// label is a `TypeMismatch`. Returns `false` if an entry with the same
    /// key exists.
    pub fn add_tag(&mut self, name: &str, entry: TagEntry) -> Result<bool, SessionError> {
        self.check_gate()?;
        let tags = self.tags_mut(name)?;
        let entry = normalize_entry(entry).ok_or_else(|| SessionError::TypeMismatch {
            field: name.to_string(),
            expected: "non-blank tag label",
        })?;
        let added = tags.push(entry);
        if added {
            self.note_edit();
            recompute(&mut self.form, &self.touched, &self.schema);
        }
        Ok(added)
    }

    /// Remove the tag with `key`, returning it.
    pub fn remove_tag(&mut self, name: &str, key: TagKey<'_>) -> Result<Option<TagEntry>, SessionError> {
        self.check_gate()?;
        let removed = self.tags_mut(name)?.remove(key);
        if removed.is_some() {
            self.note_edit();
            recompute(&mut self.form, &self.touched, &self.schema);
        }
        Ok(removed)
    }

    /// Stop recomputing `name` from its sources until the next load.
    /// Returns `false` if it was already touched.
    pub fn mark_touched(&mut self, name: &str) -> Result<bool, SessionError> {
        self.check_gate()?;
        self.field_kind(name)?;
        self.note_edit();
        Ok(self.touched.insert(name))
    }

    /// Move slot `index` of `field` to `status`. `Validated` needs a url.
    pub fn set_slot(
        &mut self,
        field: &str,
        index: usize,
        status: SlotStatus,
        url: Option<String>,
    ) -> Result<SlotOutcome, SessionError> {
        self.check_gate()?;
        let outcome = upload::set_slot(&mut self.form, &self.schema, field, index, status, url)?;
        self.note_edit();
        Ok(outcome)
    }

    /// Report a failed upload: the slot reverts to `Pending` and `reason` is
    /// queued as a notice.
    pub fn fail_slot(
        &mut self,
        field: &str,
        index: usize,
        reason: impl Into<String>,
    ) -> Result<SlotOutcome, SessionError> {
        let outcome = self.set_slot(field, index, SlotStatus::Failed, None)?;
        let reason = reason.into();
        warn!(%field, index, %reason, "upload failed");
        self.notify(
            NoticeKind::Error,
            NoticeTopic::Upload {
                field: field.to_string(),
            },
            format!("Upload failed for `{field}`"),
            Some(reason),
        );
        Ok(outcome)
    }

    /// Append a pending slot to a multi-file field. Returns its index.
    pub fn push_slot(&mut self, field: &str) -> Result<usize, SessionError> {
        self.check_gate()?;
        let index = upload::push_slot(&mut self.form, &self.schema, field)?;
        self.note_edit();
        Ok(index)
    }

    /// Remove a slot from a multi-file field, or clear a single-file field.
    pub fn remove_slot(&mut self, field: &str, index: usize) -> Result<UploadSlot, SessionError> {
        self.check_gate()?;
        let slot = upload::remove_slot(&mut self.form, &self.schema, field, index)?;
        self.note_edit();
        Ok(slot)
    }

    /// Restore the snapshot and the touched set it was taken with.
    pub fn discard(&mut self) {
        self.form = self.snapshot.state().clone();
        self.touched = self.baseline_touched.clone();
        debug!(entity = self.schema.entity(), "edits discarded");
    }

    // ---------------------------------------------------------------------
    // Queries

    /// Current form state.
    pub fn form_state(&self) -> &FormState {
        &self.form
    }

    /// Current value of one field.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.form.get(name)
    }

    /// Whether every slot of an upload field is validated.
    pub fn is_field_validated(&self, field: &str) -> bool {
        upload::is_field_validated(&self.form, field)
    }

    /// Form differs from the snapshot.
    pub fn is_dirty(&self) -> bool {
        snapshot::is_dirty(&self.form, &self.snapshot, &self.schema)
    }

    /// Fields that differ from the snapshot.
    pub fn dirty_fields(&self) -> Vec<String> {
        snapshot::dirty_fields(&self.form, &self.snapshot, &self.schema)
    }

    /// Clean or Dirty.
    pub fn guard_state(&self) -> GuardState {
        GuardState::from_dirty(self.is_dirty())
    }

    /// Synchronous answer for the host's unload prompt. Read-only sessions
    /// never have unsaved changes.
    pub fn has_unsaved_changes(&self) -> bool {
        self.gate.can_mutate() && self.is_dirty()
    }

    /// Wire-ready payload of the current form.
    pub fn payload(&self) -> Value {
        record::payload(&self.schema, &self.form, self.entity_id.as_ref())
    }

    /// Check required fields and in-flight uploads.
    pub fn validate(&self) -> Result<(), SessionError> {
        let mut issues = Vec::new();
        for spec in self.schema.fields() {
            let value = self.form.get(&spec.name);
            let issue = match (&spec.kind, value) {
                (FieldKind::Upload(_), Some(FieldValue::Upload(u))) if u.is_uploading() => {
                    Some(IssueKind::UploadInProgress)
                }
                _ if !spec.required => None,
                (FieldKind::Upload(_), Some(FieldValue::Upload(u))) => {
                    let slots = u.slots();
                    if slots.iter().all(|s| s.status == SlotStatus::Pending) {
                        Some(IssueKind::Missing)
                    } else if u.is_validated() {
                        None
                    } else {
                        Some(IssueKind::UploadIncomplete)
                    }
                }
                (FieldKind::Tags(_), Some(FieldValue::Tags(t))) => t.is_empty().then_some(IssueKind::Missing),
                (_, Some(FieldValue::Scalar(v))) => match v {
                    Value::Null => Some(IssueKind::Missing),
                    Value::String(s) if s.trim().is_empty() => Some(IssueKind::Missing),
                    _ => None,
                },
                _ => Some(IssueKind::Missing),
            };
            if let Some(kind) = issue {
                issues.push(FieldIssue {
                    field: spec.name.clone(),
                    kind,
                });
            }
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(SessionError::ValidationFailed(issues))
        }
    }

    /// Whether the actor may edit.
    pub fn can_mutate(&self) -> bool {
        self.gate.can_mutate()
    }

    /// Server id, once loaded or saved.
    pub fn entity_id(&self) -> Option<&RecordId> {
        self.entity_id.as_ref()
    }

    /// Fields the user has edited directly.
    pub fn touched(&self) -> &TouchedSet {
        &self.touched
    }

    /// Current baseline.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Schema this session edits.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Tunables in effect.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Notices not yet drained.
    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.pending()
    }

    /// Take every pending notice.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    fn notify(&mut self, kind: NoticeKind, topic: NoticeTopic, title: impl Into<String>, body: Option<String>) {
        self.notices.push(kind, topic, title, body, Instant::now());
    }

    fn transport_failed(&mut self, title: &str, err: &anyhow::Error) -> SessionError {
        let message = format!("{err:#}");
        warn!(entity = self.schema.entity(), error = %message, "{title}");
        self.notify(NoticeKind::Error, NoticeTopic::Transport, title, Some(message.clone()));
        SessionError::TransportFailed(message)
    }

    // ---------------------------------------------------------------------
    // Submission and navigation

    /// Validate, submit the payload and, on success, take a new snapshot.
    /// On failure the form and snapshot are left as they were.
    #[instrument(skip_all, fields(entity = %self.schema.entity()))]
    pub async fn save<P: EntityPort>(&mut self, port: &P) -> Result<SaveReceipt, SessionError> {
        self.check_gate()?;
        if let Err(err) = self.validate() {
            warn!(%err, "save blocked by validation");
            self.notify(
                NoticeKind::Warn,
                NoticeTopic::Validation,
                "Some fields need attention",
                Some(err.to_string()),
            );
            return Err(err);
        }
        let payload = self.payload();
        let receipt = match port.save_entity(&payload).await {
            Ok(receipt) => receipt,
            Err(err) => return Err(self.transport_failed("Save failed", &err)),
        };
        if let Some(id) = &receipt.id {
            self.entity_id = Some(id.clone());
        }
        self.snapshot = Snapshot::take(&self.form);
        self.baseline_touched = self.touched.clone();
        // A load issued before the save would replace the saved baseline.
        self.pending_load = None;
        info!(id = ?self.entity_id, "entity saved");
        self.notify(NoticeKind::Info, NoticeTopic::Saved, "Saved", None);
        Ok(receipt)
    }

    /// Resolve a leave request. Clean or read-only sessions leave at once;
    /// otherwise the host is asked to save, discard or cancel.
    #[instrument(skip_all, fields(entity = %self.schema.entity()))]
    pub async fn request_navigate<P, C>(
        &mut self,
        target: impl Into<String>,
        port: &P,
        confirm: &C,
    ) -> NavigationOutcome
    where
        P: EntityPort,
        C: ConfirmPort,
    {
        let mut intent = NavigationIntent::new(target);
        if decide(self.is_dirty(), self.gate.can_mutate()) == GuardDecision::Proceed {
            return NavigationOutcome {
                target: intent.into_target(),
                resolution: Resolution::Unguarded,
            };
        }
        let prompt = LeavePrompt {
            entity: self.schema.entity().to_string(),
            target: intent.target().to_string(),
            dirty_fields: self.dirty_fields(),
        };
        let choice = confirm.choose_leave(&prompt).await;
        intent.resolve(choice);
        debug!(to = intent.target(), ?choice, "leave prompt answered");
        let resolution = match intent.state() {
            IntentState::ConfirmedSave => match self.save(port).await {
                Ok(_) => Resolution::Saved,
                Err(err) => Resolution::SaveFailed(err),
            },
            IntentState::ConfirmedDiscard => {
                self.discard();
                Resolution::Discarded
            }
            IntentState::Cancelled | IntentState::Requested => Resolution::Cancelled,
        };
        NavigationOutcome {
            target: intent.into_target(),
            resolution,
        }
    }

    /// Delete the persisted entity after the host confirms. A deleted
    /// session becomes read-only.
    #[instrument(skip_all, fields(entity = %self.schema.entity()))]
    pub async fn delete<P, C>(&mut self, port: &P, confirm: &C) -> Result<DeleteOutcome, SessionError>
    where
        P: EntityPort,
        C: ConfirmPort,
    {
        self.check_gate()?;
        let id = self.entity_id.clone().ok_or(SessionError::NotPersisted)?;
        let prompt = DeletePrompt {
            entity: self.schema.entity().to_string(),
            id: id.clone(),
        };
        let state = ConfirmState::Requested.resolve(confirm.confirm_delete(&prompt).await);
        if state != ConfirmState::Confirmed {
            debug!(%id, "delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }
        if let Err(err) = port.delete_entity(&id).await {
            return Err(self.transport_failed("Delete failed", &err));
        }
        self.gate.revoke();
        info!(%id, "entity deleted");
        self.notify(NoticeKind::Info, NoticeTopic::Saved, "Deleted", None);
        Ok(DeleteOutcome::Deleted)
    }

    /// Choices for a tag/category picker.
    #[instrument(skip_all, fields(entity = %self.schema.entity(), kind = %kind))]
    pub async fn lookup_options<P: EntityPort>(
        &mut self,
        port: &P,
        kind: &str,
    ) -> Result<Vec<LookupOption>, SessionError> {
        match port.load_lookup_options(kind).await {
            Ok(options) => {
                debug!(count = options.len(), "lookup options loaded");
                Ok(options)
            }
            Err(err) => Err(self.transport_failed("Could not load choices", &err)),
        }
    }
}
