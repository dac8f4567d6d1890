//! In-memory implementations of the host traits.
//!
//! Used by the test suites and the replay harness.

use std::{
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use super::{
    EntryApi, EntryQuery, EntrySys, FieldApi, FieldDefinition, FindManyQuery, FoundEntry,
    Subscription, ValueListener, value_to_text,
};
use crate::{error::QueryError, util::lock};

#[derive(Default)]
struct FieldSlot {
    value: Option<Value>,
    invalid: bool,
    writes: usize,
    next_listener: u64,
    listeners: Vec<(u64, ValueListener)>,
}

pub struct MemoryField {
    definition: FieldDefinition,
    this: Weak<MemoryField>,
    slot: Mutex<FieldSlot>,
}

impl MemoryField {
    pub fn new(definition: FieldDefinition, value: Option<Value>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            definition,
            this: this.clone(),
            slot: Mutex::new(FieldSlot {
                value,
                ..FieldSlot::default()
            }),
        })
    }

    pub fn is_invalid(&self) -> bool {
        lock(&self.slot).invalid
    }

    /// Number of `set_value` calls received so far.
    pub fn write_count(&self) -> usize {
        lock(&self.slot).writes
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.slot).listeners.len()
    }
}

impl FieldApi for MemoryField {
    fn definition(&self) -> &FieldDefinition {
        &self.definition
    }

    fn get_value(&self) -> Option<Value> {
        lock(&self.slot).value.clone()
    }

    fn set_value(&self, value: Option<Value>) {
        let listeners: Vec<ValueListener> = {
            let mut slot = lock(&self.slot);
            slot.value = value.clone();
            slot.writes += 1;
            slot.listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener(value.as_ref());
        }
    }

    fn set_invalid(&self, invalid: bool) {
        lock(&self.slot).invalid = invalid;
    }

    fn on_value_changed(&self, listener: ValueListener) -> Subscription {
        let id = {
            let mut slot = lock(&self.slot);
            let id = slot.next_listener;
            slot.next_listener += 1;
            slot.listeners.push((id, listener));
            id
        };
        let this = self.this.clone();
        Subscription::new(move || {
            if let Some(field) = this.upgrade() {
                lock(&field.slot)
                    .listeners
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }
}

/// An entry whose fields live in memory.
pub struct MemoryEntry {
    sys: EntrySys,
    fields: IndexMap<String, Arc<MemoryField>>,
}

impl MemoryEntry {
    pub fn new(id: impl Into<String>, content_type_id: impl Into<String>) -> Self {
        Self {
            sys: EntrySys {
                id: id.into(),
                content_type_id: content_type_id.into(),
            },
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, definition: FieldDefinition, value: Option<Value>) -> Self {
        self.insert_field(definition, value);
        self
    }

    pub fn insert_field(&mut self, definition: FieldDefinition, value: Option<Value>) {
        let id = definition.id.clone();
        self.fields.insert(id, MemoryField::new(definition, value));
    }

    pub fn memory_field(&self, id: &str) -> Option<Arc<MemoryField>> {
        self.fields.get(id).cloned()
    }
}

impl EntryApi for MemoryEntry {
    fn sys(&self) -> EntrySys {
        self.sys.clone()
    }

    fn field(&self, id: &str) -> Option<Arc<dyn FieldApi>> {
        self.fields
            .get(id)
            .map(|field| Arc::clone(field) as Arc<dyn FieldApi>)
    }
}

/// A record held by [`MemoryQuery`].
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub content_type_id: String,
    pub archived: bool,
    pub entry: FoundEntry,
}

impl StoredEntry {
    pub fn new(content_type_id: impl Into<String>, entry: FoundEntry) -> Self {
        Self {
            content_type_id: content_type_id.into(),
            archived: false,
            entry,
        }
    }

    pub fn archived(mut self) -> Self {
        self.archived = true;
        self
    }
}

#[derive(Default)]
struct QueryState {
    entries: Vec<StoredEntry>,
    calls: Vec<FindManyQuery>,
    failure: Option<QueryError>,
    latency: Duration,
}

/// Entry store answering [`FindManyQuery`] from a fixed list.
///
/// The text query matches any localized string value containing it,
/// case-insensitively, so results are a superset of exact matches.
#[derive(Default)]
pub struct MemoryQuery {
    state: Mutex<QueryState>,
}

impl MemoryQuery {
    pub fn new(entries: Vec<StoredEntry>) -> Self {
        Self {
            state: Mutex::new(QueryState {
                entries,
                ..QueryState::default()
            }),
        }
    }

    pub fn push(&self, entry: StoredEntry) {
        lock(&self.state).entries.push(entry);
    }

    /// Makes every subsequent query fail with `error`; `None` restores success.
    pub fn fail_with(&self, error: Option<QueryError>) {
        lock(&self.state).failure = error;
    }

    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    pub fn calls(&self) -> Vec<FindManyQuery> {
        lock(&self.state).calls.clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.state).calls.len()
    }
}

#[async_trait]
impl EntryQuery for MemoryQuery {
    async fn find_many(&self, query: &FindManyQuery) -> Result<Vec<FoundEntry>, QueryError> {
        let latency = {
            let mut state = lock(&self.state);
            state.calls.push(query.clone());
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let state = lock(&self.state);
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        let needle = query.text_query.to_lowercase();
        Ok(state
            .entries
            .iter()
            .filter(|stored| query.content_type_in.contains(&stored.content_type_id))
            .filter(|stored| stored.entry.id != query.exclude_id)
            .filter(|stored| !(query.exclude_archived && stored.archived))
            .filter(|stored| needle.is_empty() || mentions(&stored.entry, &needle))
            .map(|stored| stored.entry.clone())
            .collect())
    }
}

fn mentions(entry: &FoundEntry, needle: &str) -> bool {
    entry
        .fields
        .values()
        .flat_map(|locales| locales.values())
        .filter(|value| value.is_string() || value.is_number())
        .any(|value| value_to_text(value).to_lowercase().contains(needle))
}
