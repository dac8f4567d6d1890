//! Show/hide state of a conditional field.

use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    condition::ConditionDescriptor,
    host::{EntryApi, FieldApi, Subscription},
    store::ValidationStore,
    util::lock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn from_flag(visible: bool) -> Self {
        if visible {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }

    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}

/// Called on every visibility transition. Runs before the hidden-state side
/// effects and after the visible-state ones.
pub type TransitionHook = Arc<dyn Fn(Visibility) + Send + Sync>;

struct Shared {
    field: Arc<dyn FieldApi>,
    store: ValidationStore,
    condition: ConditionDescriptor,
    state: Mutex<Visibility>,
    hook: Mutex<Option<TransitionHook>>,
}

pub struct VisibilityController {
    field_id: String,
    shared: Option<Arc<Shared>>,
    _subscription: Option<Subscription>,
}

impl VisibilityController {
    /// Evaluates the condition against the source field's current value and
    /// starts following it. Fields without a condition, or whose source field
    /// does not exist, stay visible for good.
    pub fn mount(
        field: Arc<dyn FieldApi>,
        entry: &dyn EntryApi,
        condition: Option<ConditionDescriptor>,
        store: ValidationStore,
    ) -> Self {
        let field_id = field.id().to_string();
        let Some(condition) = condition else {
            return Self::always_visible(field_id);
        };
        let Some(source) = entry.field(&condition.source_field_id) else {
            debug!(
                %field_id,
                source = %condition.source_field_id,
                "condition source missing; field stays visible"
            );
            return Self::always_visible(field_id);
        };

        let initial = Visibility::from_flag(condition.should_show(source.get_value().as_ref()));
        debug!(%field_id, ?initial, "visibility at mount");
        let shared = Arc::new(Shared {
            field,
            store,
            condition,
            state: Mutex::new(initial),
            hook: Mutex::new(None),
        });
        if initial == Visibility::Hidden {
            shared.enter_hidden();
        }

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let subscription = source.on_value_changed(Arc::new(move |value| {
            if let Some(shared) = weak.upgrade() {
                shared.on_source_changed(value);
            }
        }));

        Self {
            field_id,
            shared: Some(shared),
            _subscription: Some(subscription),
        }
    }

    fn always_visible(field_id: String) -> Self {
        Self {
            field_id,
            shared: None,
            _subscription: None,
        }
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn is_conditional(&self) -> bool {
        self.shared.is_some()
    }

    pub fn visibility(&self) -> Visibility {
        self.shared
            .as_ref()
            .map_or(Visibility::Visible, |shared| *lock(&shared.state))
    }

    pub fn is_visible(&self) -> bool {
        self.visibility().is_visible()
    }

    pub fn on_transition(&self, hook: TransitionHook) {
        if let Some(shared) = &self.shared {
            *lock(&shared.hook) = Some(hook);
        }
    }
}

impl Shared {
    fn on_source_changed(&self, value: Option<&Value>) {
        let next = Visibility::from_flag(self.condition.should_show(value));
        let previous = std::mem::replace(&mut *lock(&self.state), next);
        if previous == next {
            return;
        }
        debug!(field_id = self.field.id(), ?previous, ?next, "visibility changed");
        let hook = lock(&self.hook).clone();
        match next {
            Visibility::Hidden => {
                if let Some(hook) = hook {
                    hook(next);
                }
                self.enter_hidden();
            }
            Visibility::Visible => {
                self.store.clear_all_field_errors(self.field.id());
                self.field.set_invalid(false);
                if let Some(hook) = hook {
                    hook(next);
                }
            }
        }
    }

    fn enter_hidden(&self) {
        self.store.clear_all_field_errors(self.field.id());
        self.field.set_invalid(false);
        self.field.set_value(None);
    }
}
