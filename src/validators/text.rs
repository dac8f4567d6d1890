use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use super::{FieldContext, LadderOutcome, text_of};
use crate::{
    condition::is_empty,
    config::FieldInstanceConfig,
    host::{EntryApi, EntryQuery, Subscription},
    uniqueness::UniquenessChecker,
    util::lock,
};

struct TextState {
    draft: String,
    venture: Option<Value>,
    visible: bool,
    message: Option<String>,
}

struct TextInner {
    ctx: FieldContext,
    required: bool,
    derived: bool,
    checker: Option<UniquenessChecker>,
    state: Mutex<TextState>,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// Single-line text with optional required and unique-per-venture rules.
///
/// The general (`Required.`) key and the duplicate keys are independent:
/// clearing one never touches the other.
#[derive(Clone)]
pub struct TextValidator {
    inner: Arc<TextInner>,
}

impl TextValidator {
    pub fn mount(
        ctx: FieldContext,
        config: &FieldInstanceConfig,
        entry: &dyn EntryApi,
        query: Arc<dyn EntryQuery>,
        runtime: Handle,
    ) -> Self {
        let options = Arc::clone(&ctx.options);
        let derived = ctx.field_id() == options.view_all.field_id;
        let venture_field = entry.field(&options.venture_field_id);
        let venture = venture_field
            .as_ref()
            .and_then(|field| field.get_value())
            .filter(|value| !is_empty(Some(value)));
        let checker = config.is_unique_per_venture.then(|| {
            UniquenessChecker::new(
                Arc::clone(&ctx.field),
                ctx.store.clone(),
                query,
                entry.sys(),
                Arc::clone(&options),
                runtime,
            )
        });
        let draft = text_of(ctx.field.get_value().as_ref()).unwrap_or_default();

        let inner = Arc::new(TextInner {
            ctx,
            required: config.is_required && !derived,
            derived,
            checker,
            state: Mutex::new(TextState {
                draft,
                venture,
                visible: true,
                message: None,
            }),
            subscriptions: Mutex::new(Vec::new()),
        });

        inner.check_unique();
        inner.validate();

        let mut subscriptions = Vec::new();
        if inner.checker.is_some() {
            if let Some(venture_field) = venture_field {
                let weak = Arc::downgrade(&inner);
                subscriptions.push(venture_field.on_value_changed(Arc::new(move |value| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_venture_changed(value);
                    }
                })));
            }
        }
        if derived {
            if let Some(kind_field) = entry.field(&options.view_all.type_field_id) {
                inner.apply_derived(kind_field.get_value().as_ref());
                let weak: Weak<TextInner> = Arc::downgrade(&inner);
                subscriptions.push(kind_field.on_value_changed(Arc::new(move |value| {
                    if let Some(inner) = weak.upgrade() {
                        inner.apply_derived(value);
                    }
                })));
            }
        }
        *lock(&inner.subscriptions) = subscriptions;

        Self { inner }
    }

    pub fn draft(&self) -> String {
        lock(&self.inner.state).draft.clone()
    }

    /// The required-ness message, or the duplicate message from the last check.
    pub fn error_message(&self) -> Option<String> {
        lock(&self.inner.state).message.clone().or_else(|| {
            self.inner
                .checker
                .as_ref()
                .and_then(UniquenessChecker::error_message)
        })
    }

    pub fn is_checking(&self) -> bool {
        self.inner
            .checker
            .as_ref()
            .is_some_and(UniquenessChecker::is_checking)
    }

    /// Unique-per-venture input stays locked until a venture is chosen.
    pub fn is_disabled(&self) -> bool {
        self.inner.checker.is_some() && lock(&self.inner.state).venture.is_none()
    }

    /// User typed `text` into the input.
    pub fn edit(&self, text: &str) {
        debug!(field_id = self.inner.ctx.field_id(), %text, "text edited");
        {
            let mut state = lock(&self.inner.state);
            state.message = None;
            state.draft = text.to_string();
        }
        self.inner.ctx.clear_general();
        if self.inner.checker.is_none() {
            let value = (!text.is_empty()).then(|| Value::String(text.to_string()));
            self.inner.ctx.field.set_value(value);
        }
        self.inner.check_unique();
        self.inner.validate();
    }

    /// Cancels pending checks and stops listening to sibling fields.
    pub fn detach(&self) {
        if let Some(checker) = &self.inner.checker {
            checker.cancel();
        }
        lock(&self.inner.subscriptions).clear();
    }

    /// Marks the field hidden, drops any pending duplicate check and reruns
    /// the ladder, which clears its errors.
    pub fn hide(&self) {
        lock(&self.inner.state).visible = false;
        if let Some(checker) = &self.inner.checker {
            checker.cancel();
        }
        self.inner.validate();
    }
}

impl TextInner {
    fn validate(&self) {
        let (visible, empty) = {
            let state = lock(&self.state);
            (state.visible, state.draft.is_empty())
        };
        let outcome = LadderOutcome::evaluate(visible, self.required, empty);
        let message = self.ctx.apply(outcome, true);
        lock(&self.state).message = message;
    }

    fn check_unique(&self) {
        let Some(checker) = &self.checker else {
            return;
        };
        let (visible, draft, venture) = {
            let state = lock(&self.state);
            (state.visible, state.draft.clone(), state.venture.clone())
        };
        if visible {
            checker.request(&draft, venture.as_ref());
        }
    }

    fn on_venture_changed(&self, value: Option<&Value>) {
        let venture = value.filter(|value| !is_empty(Some(*value))).cloned();
        debug!(field_id = self.ctx.field_id(), ?venture, "venture changed");
        let cleared = venture.is_none();
        {
            let mut state = lock(&self.state);
            state.venture = venture;
            if cleared {
                state.draft.clear();
            }
        }
        if cleared {
            self.ctx.store.clear_field_error(self.ctx.field_id(), None);
        }
        self.check_unique();
        self.validate();
    }

    fn apply_derived(&self, kind: Option<&Value>) {
        let text = self.ctx.options.view_all.label_for(kind).to_string();
        debug!(field_id = self.ctx.field_id(), %text, "derived text applied");
        {
            let mut state = lock(&self.state);
            state.draft = text.clone();
            state.message = None;
        }
        self.ctx.field.set_value(Some(Value::String(text)));
        self.ctx.clear_general();
        self.check_unique();
        self.validate();
    }
}
