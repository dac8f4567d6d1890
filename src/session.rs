//! One editing session per open entry.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tracing::debug;

use crate::{
    config::{EngineOptions, FieldInstanceConfig},
    editor::{FieldEditor, FieldReport},
    error::EntryGuardError,
    host::{EntryApi, EntryQuery},
    store::ValidationStore,
    util::lock,
    validators::FieldContext,
};

/// Owns the validation store of one open entry and every mounted field.
///
/// Closing (or dropping) the session cancels pending checks, unsubscribes all
/// listeners, and discards the in-memory validation state without touching
/// what was persisted on the entry.
pub struct EntrySession {
    entry: Arc<dyn EntryApi>,
    query: Arc<dyn EntryQuery>,
    options: Arc<EngineOptions>,
    store: ValidationStore,
    runtime: Handle,
    editors: Mutex<IndexMap<String, FieldEditor>>,
}

impl EntrySession {
    /// Opens a session on the current tokio runtime.
    pub fn open(
        entry: Arc<dyn EntryApi>,
        query: Arc<dyn EntryQuery>,
        options: EngineOptions,
    ) -> Result<Self, EntryGuardError> {
        let runtime = Handle::try_current().map_err(|_| EntryGuardError::NoRuntime)?;
        Ok(Self::with_runtime(entry, query, options, runtime))
    }

    pub fn with_runtime(
        entry: Arc<dyn EntryApi>,
        query: Arc<dyn EntryQuery>,
        options: EngineOptions,
        runtime: Handle,
    ) -> Self {
        let store = ValidationStore::new();
        match entry.field(&options.status_field_id) {
            Some(status_field) => store.bind(status_field),
            None => debug!(
                status_field = %options.status_field_id,
                "entry has no status field; validation state stays local"
            ),
        }
        Self {
            entry,
            query,
            options: Arc::new(options),
            store,
            runtime,
            editors: Mutex::new(IndexMap::new()),
        }
    }

    pub fn store(&self) -> &ValidationStore {
        &self.store
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Mounts (or remounts) the editor for `field_id`.
    pub fn mount_field(
        &self,
        field_id: &str,
        config: FieldInstanceConfig,
    ) -> Result<FieldEditor, EntryGuardError> {
        let field = self
            .entry
            .field(field_id)
            .ok_or_else(|| EntryGuardError::UnknownField(field_id.to_string()))?;
        let ctx = FieldContext::new(field, self.store.clone(), Arc::clone(&self.options));
        let editor = FieldEditor::mount(
            ctx,
            config,
            Arc::clone(&self.entry),
            Arc::clone(&self.query),
            self.runtime.clone(),
        );
        let previous = lock(&self.editors).insert(field_id.to_string(), editor.clone());
        if let Some(previous) = previous {
            previous.teardown();
        }
        Ok(editor)
    }

    pub fn editor(&self, field_id: &str) -> Option<FieldEditor> {
        lock(&self.editors).get(field_id).cloned()
    }

    pub fn unmount_field(&self, field_id: &str) {
        let removed = lock(&self.editors).shift_remove(field_id);
        if let Some(editor) = removed {
            editor.teardown();
        }
    }

    /// The blob persisted on the entry for the current state.
    pub fn status(&self) -> Map<String, Value> {
        self.store.snapshot().projection()
    }

    pub fn reports(&self) -> Vec<FieldReport> {
        let editors: Vec<FieldEditor> = lock(&self.editors).values().cloned().collect();
        editors.iter().map(FieldEditor::report).collect()
    }

    pub fn close(&self) {
        let editors: Vec<FieldEditor> = lock(&self.editors).drain(..).map(|(_, editor)| editor).collect();
        debug!(fields = editors.len(), "closing entry session");
        for editor in editors {
            editor.teardown();
        }
        self.store.unbind();
        self.store.clear_all_errors();
    }
}

impl Drop for EntrySession {
    fn drop(&mut self) {
        self.close();
    }
}
