use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;

use super::{FieldContext, LadderOutcome};
use crate::{
    condition::is_empty, config::REFERENCE_REQUIRED_FALLBACK, host::Subscription, util::lock,
};

struct ReferenceState {
    visible: bool,
    message: Option<String>,
}

struct ReferenceInner {
    ctx: FieldContext,
    required: bool,
    state: Mutex<ReferenceState>,
    subscription: Mutex<Option<Subscription>>,
}

/// Single entry link; only required-ness is checked.
#[derive(Clone)]
pub struct ReferenceValidator {
    inner: Arc<ReferenceInner>,
}

impl ReferenceValidator {
    pub fn mount(ctx: FieldContext, required: bool) -> Self {
        let inner = Arc::new(ReferenceInner {
            ctx,
            required,
            state: Mutex::new(ReferenceState {
                visible: true,
                message: None,
            }),
            subscription: Mutex::new(None),
        });
        let current = inner.ctx.field.get_value();
        inner.handle_value(current.as_ref());

        let weak: Weak<ReferenceInner> = Arc::downgrade(&inner);
        let subscription = inner.ctx.field.on_value_changed(Arc::new(move |value| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_value(value);
            }
        }));
        *lock(&inner.subscription) = Some(subscription);
        Self { inner }
    }

    pub fn error_message(&self) -> Option<String> {
        lock(&self.inner.state).message.clone()
    }

    /// Message to render under the picker, falling back to a generic notice
    /// when the store holds an error this validator did not raise.
    pub fn display_message(&self) -> Option<String> {
        self.error_message().or_else(|| {
            (!self.inner.ctx.store.is_field_valid(self.inner.ctx.field_id()))
                .then(|| REFERENCE_REQUIRED_FALLBACK.to_string())
        })
    }

    pub fn detach(&self) {
        lock(&self.inner.subscription).take();
    }

    /// Marks the field hidden and reruns the ladder, which clears its errors.
    pub fn hide(&self) {
        lock(&self.inner.state).visible = false;
        let current = self.inner.ctx.field.get_value();
        self.inner.handle_value(current.as_ref());
    }
}

impl ReferenceInner {
    fn handle_value(&self, value: Option<&Value>) {
        let visible = lock(&self.state).visible;
        let outcome = LadderOutcome::evaluate(visible, self.required, is_empty(value));
        let message = self.ctx.apply(outcome, false);
        lock(&self.state).message = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EngineOptions,
        host::{FieldApi, FieldDefinition, FieldType, memory::MemoryField},
        store::ValidationStore,
    };
    use serde_json::json;

    #[test]
    fn follows_link_changes() {
        let field = MemoryField::new(FieldDefinition::new("hero", FieldType::Link), None);
        let store = ValidationStore::new();
        let ctx = FieldContext::new(field.clone(), store.clone(), Arc::new(EngineOptions::default()));
        let validator = ReferenceValidator::mount(ctx, true);
        assert_eq!(validator.error_message().as_deref(), Some("Required."));
        assert!(field.is_invalid());

        field.set_value(Some(json!({"sys": {"id": "E1"}})));
        assert!(store.is_field_valid("hero"));
        assert_eq!(validator.display_message(), None);

        field.set_value(Some(Value::Null));
        assert!(!store.is_field_valid("hero"));
        assert_eq!(field.write_count(), 2, "validator never writes its own value");
    }

    #[test]
    fn falls_back_to_generic_message_for_foreign_errors() {
        let field = MemoryField::new(
            FieldDefinition::new("hero", FieldType::Link),
            Some(json!({"sys": {"id": "E1"}})),
        );
        let store = ValidationStore::new();
        let ctx = FieldContext::new(field, store.clone(), Arc::new(EngineOptions::default()));
        let validator = ReferenceValidator::mount(ctx, false);
        store.set_field_error("hero", "elsewhere", Some("custom"));
        assert_eq!(
            validator.display_message().as_deref(),
            Some("This field is required.")
        );
    }

    #[test]
    fn unmounting_unsubscribes() {
        let field = MemoryField::new(FieldDefinition::new("hero", FieldType::Link), None);
        let ctx = FieldContext::new(
            field.clone(),
            ValidationStore::new(),
            Arc::new(EngineOptions::default()),
        );
        let validator = ReferenceValidator::mount(ctx, true);
        assert_eq!(field.listener_count(), 1);
        drop(validator);
        assert_eq!(field.listener_count(), 0);
    }
}
