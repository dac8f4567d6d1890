//! Per-entry validation state shared by every field validator.
//!
//! The store is a cheaply clonable handle. Each open entry gets its own
//! instance, and every mutation is mirrored onto the entry's status field
//! when (and only when) the persisted projection actually changes.
//!
//! Every mutation bumps a generation counter. A sync that finds the counter
//! moved while it was writing goes round again, so concurrent callers always
//! leave the blob matching the newest state.

mod key;
mod state;

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{host::FieldApi, util::lock};

pub use key::{ValidationKey, belongs_to};
pub use state::ValidationState;

#[derive(Clone)]
pub struct ValidationStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: watch::Sender<ValidationState>,
    generation: AtomicU64,
    status: Mutex<StatusBinding>,
}

#[derive(Default)]
struct StatusBinding {
    field: Option<Arc<dyn FieldApi>>,
    hydrated: bool,
}

impl Default for ValidationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ValidationState::default());
        Self {
            inner: Arc::new(StoreInner {
                state,
                generation: AtomicU64::new(0),
                status: Mutex::new(StatusBinding::default()),
            }),
        }
    }

    /// Binds the entry's status field, hydrating from its persisted value.
    ///
    /// Hydration happens once per store; rebinding only swaps the sync target.
    pub fn bind(&self, status_field: Arc<dyn FieldApi>) {
        let hydrate = {
            let mut binding = lock(&self.inner.status);
            binding.field = Some(Arc::clone(&status_field));
            !std::mem::replace(&mut binding.hydrated, true)
        };
        if hydrate {
            let persisted = status_field.get_value();
            let initial = ValidationState::from_persisted(persisted.as_ref());
            debug!(entries = initial.len(), "hydrating validation state from entry");
            self.mutate(|state| *state = initial);
        } else {
            warn!(
                field = status_field.id(),
                "status field rebound; keeping existing validation state"
            );
        }
        self.sync();
    }

    /// Stops syncing to the status field; local state is kept.
    pub fn unbind(&self) {
        lock(&self.inner.status).field = None;
    }

    pub fn set_field_error(
        &self,
        field_id: &str,
        message: impl Into<String>,
        validation_type: Option<&str>,
    ) {
        let key = ValidationKey::new(field_id, validation_type).to_string();
        let message = message.into();
        debug!(%key, %message, "set field error");
        self.mutate(|state| state.insert(key, message));
    }

    pub fn clear_field_error(&self, field_id: &str, validation_type: Option<&str>) {
        let key = ValidationKey::new(field_id, validation_type).to_string();
        debug!(%key, "clear field error");
        self.mutate(|state| {
            state.remove(&key);
        });
    }

    pub fn clear_all_field_errors(&self, field_id: &str) {
        self.mutate(|state| {
            let removed = state.remove_field(field_id);
            debug!(field_id, ?removed, "clear all field errors");
        });
    }

    pub fn clear_all_errors(&self) {
        debug!("clear all errors");
        self.mutate(ValidationState::clear);
    }

    pub fn is_field_valid(&self, field_id: &str) -> bool {
        self.inner.state.borrow().is_field_valid(field_id)
    }

    pub fn has_field_error(&self, field_id: &str, validation_type: Option<&str>) -> bool {
        let key = ValidationKey::new(field_id, validation_type).to_string();
        self.inner.state.borrow().has_error(&key)
    }

    pub fn field_error(&self, field_id: &str, validation_type: Option<&str>) -> Option<String> {
        let key = ValidationKey::new(field_id, validation_type).to_string();
        self.inner
            .state
            .borrow()
            .get(&key)
            .filter(|message| state::is_error_message(message))
            .map(str::to_string)
    }

    pub fn snapshot(&self) -> ValidationState {
        self.inner.state.borrow().clone()
    }

    /// Observes every mutation; each store call produces one notification.
    pub fn subscribe(&self) -> watch::Receiver<ValidationState> {
        self.inner.state.subscribe()
    }

    fn mutate(&self, change: impl FnOnce(&mut ValidationState)) {
        self.inner.state.send_modify(|state| {
            change(state);
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        });
        self.sync();
    }

    /// Writes the projection to the status field if it differs from what is
    /// already persisted. Called without holding any store lock so that
    /// status-field listeners may re-enter the store.
    ///
    /// Returns once a pass finishes with no mutation having landed since it
    /// read the state. A caller that wrote a stale projection therefore
    /// always repairs it.
    fn sync(&self) {
        loop {
            let Some(field) = lock(&self.inner.status).field.clone() else {
                return;
            };
            let (projection, generation) = {
                let state = self.inner.state.borrow();
                (
                    Value::Object(state.projection()),
                    self.inner.generation.load(Ordering::SeqCst),
                )
            };
            let current = field
                .get_value()
                .unwrap_or_else(|| Value::Object(Default::default()));
            if current != projection {
                debug!(status = %projection, generation, "syncing validation status to entry");
                field.set_value(Some(projection));
            }
            if self.inner.generation.load(Ordering::SeqCst) == generation {
                return;
            }
            debug!(generation, "validation state moved during sync; syncing again");
        }
    }
}
