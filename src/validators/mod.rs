//! Per-archetype field validators sharing one required-ness ladder.

mod choice;
mod reference;
mod text;

use std::sync::Arc;

use serde_json::Value;

use crate::{config::EngineOptions, host::FieldApi, store::ValidationStore};

pub use choice::{ChoiceValidator, parse_value};
pub use reference::ReferenceValidator;
pub use text::TextValidator;

/// First applicable rung of the required-ness ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderOutcome {
    Hidden,
    NotRequired,
    Missing,
    Accepted,
}

impl LadderOutcome {
    pub fn evaluate(visible: bool, required: bool, empty: bool) -> Self {
        if !visible {
            LadderOutcome::Hidden
        } else if !required {
            LadderOutcome::NotRequired
        } else if empty {
            LadderOutcome::Missing
        } else {
            LadderOutcome::Accepted
        }
    }
}

/// Everything a validator needs to talk to its field and the shared store.
#[derive(Clone)]
pub struct FieldContext {
    pub field: Arc<dyn FieldApi>,
    pub store: ValidationStore,
    pub options: Arc<EngineOptions>,
}

impl FieldContext {
    pub fn new(
        field: Arc<dyn FieldApi>,
        store: ValidationStore,
        options: Arc<EngineOptions>,
    ) -> Self {
        Self {
            field,
            store,
            options,
        }
    }

    pub fn field_id(&self) -> &str {
        self.field.id()
    }

    /// Applies `outcome` to the field and store; returns the message the
    /// validator should display.
    ///
    /// `clear_value_on_missing` is off for validators listening to their own
    /// field, where writing would re-enter them.
    fn apply(&self, outcome: LadderOutcome, clear_value_on_missing: bool) -> Option<String> {
        match outcome {
            LadderOutcome::Hidden => {
                self.store.clear_all_field_errors(self.field_id());
                self.field.set_invalid(false);
                None
            }
            LadderOutcome::NotRequired | LadderOutcome::Accepted => {
                self.clear_general();
                None
            }
            LadderOutcome::Missing => {
                if clear_value_on_missing {
                    self.field.set_value(None);
                }
                self.field.set_invalid(true);
                let message = self.options.required_message.clone();
                self.store
                    .set_field_error(self.field_id(), message.clone(), None);
                Some(message)
            }
        }
    }

    fn clear_general(&self) {
        self.field.set_invalid(false);
        self.store.clear_field_error(self.field_id(), None);
    }
}

pub(crate) fn text_of(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) if text.is_empty() => None,
        Some(other) => Some(crate::host::value_to_text(other)),
    }
}
