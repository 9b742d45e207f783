// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory entity backend implementing [`EntityPort`].

use anyhow::{anyhow, bail};
use edit_session_core::ports::{EntityPort, LookupOption, SaveReceipt};
use edit_session_core::value::RecordId;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Fake server for entity records and lookup lists.
///
/// Saves without an `id` get the next id from 1000 upward. Every call is
/// counted, including ones made to fail with the `set_fail_on_*` toggles.
#[derive(Debug, Clone, Default)]
pub struct FakeEntityPort {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<String, Value>,
    lookups: BTreeMap<String, Vec<LookupOption>>,
    last_assigned: i64,
    payloads: Vec<Value>,
    deleted: Vec<RecordId>,
    load_count: usize,
    save_count: usize,
    delete_count: usize,
    lookup_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
    fail_on_delete: bool,
    fail_on_lookup: bool,
}

impl FakeEntityPort {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add (or replace) the record served for `id`.
    pub fn with_record(self, id: impl Into<RecordId>, record: Value) -> Self {
        self.lock().records.insert(id.into().to_string(), record);
        self
    }

    /// Serve `options` for lookup `kind`.
    pub fn with_lookup(self, kind: &str, options: Vec<LookupOption>) -> Self {
        self.lock().lookups.insert(kind.to_string(), options);
        self
    }

    /// Make `load_entity` fail.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Make `save_entity` fail.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// Make `delete_entity` fail.
    pub fn set_fail_on_delete(&self, fail: bool) {
        self.lock().fail_on_delete = fail;
    }

    /// Make `load_lookup_options` fail.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.lock().fail_on_lookup = fail;
    }

    /// `load_entity` attempts.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// `save_entity` attempts.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// `delete_entity` attempts.
    pub fn delete_count(&self) -> usize {
        self.lock().delete_count
    }

    /// `load_lookup_options` attempts.
    pub fn lookup_count(&self) -> usize {
        self.lock().lookup_count
    }

    /// Most recent payload accepted by `save_entity`.
    pub fn last_payload(&self) -> Option<Value> {
        self.lock().payloads.last().cloned()
    }

    /// Every payload accepted by `save_entity`, oldest first.
    pub fn payloads(&self) -> Vec<Value> {
        self.lock().payloads.clone()
    }

    /// Record currently stored for `id`.
    pub fn record(&self, id: &RecordId) -> Option<Value> {
        self.lock().records.get(&id.to_string()).cloned()
    }

    /// Ids deleted so far.
    pub fn deleted(&self) -> Vec<RecordId> {
        self.lock().deleted.clone()
    }
}

impl EntityPort for FakeEntityPort {
    async fn load_entity(&self, id: &RecordId) -> anyhow::Result<Value> {
        let mut inner = self.lock();
        inner.load_count += 1;
        if inner.fail_on_load {
            bail!("simulated load failure");
        }
        inner
            .records
            .get(&id.to_string())
            .cloned()
            .ok_or_else(|| anyhow!("no entity {id}"))
    }

    async fn save_entity(&self, payload: &Value) -> anyhow::Result<SaveReceipt> {
        let mut inner = self.lock();
        inner.save_count += 1;
        if inner.fail_on_save {
            bail!("simulated save failure (503)");
        }
        let Value::Object(map) = payload else {
            bail!("payload is not an object");
        };
        let id = match map.get("id").and_then(RecordId::from_value) {
            Some(id) => id,
            None => {
                inner.last_assigned = inner.last_assigned.max(999) + 1;
                RecordId::Num(inner.last_assigned)
            }
        };
        let mut stored = map.clone();
        stored.insert("id".to_string(), id.to_value());
        inner.records.insert(id.to_string(), Value::Object(stored));
        inner.payloads.push(payload.clone());
        Ok(SaveReceipt { id: Some(id) })
    }

    async fn delete_entity(&self, id: &RecordId) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner.delete_count += 1;
        if inner.fail_on_delete {
            bail!("simulated delete failure");
        }
        if inner.records.remove(&id.to_string()).is_none() {
            bail!("no entity {id}");
        }
        inner.deleted.push(id.clone());
        Ok(())
    }

    async fn load_lookup_options(&self, kind: &str) -> anyhow::Result<Vec<LookupOption>> {
        let mut inner = self.lock();
        inner.lookup_count += 1;
        if inner.fail_on_lookup {
            bail!("simulated lookup failure");
        }
        Ok(inner.lookups.get(kind).cloned().unwrap_or_default())
    }
}
