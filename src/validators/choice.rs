use std::sync::{Arc, Mutex};

use serde_json::{Number, Value};
use tracing::debug;

use super::{FieldContext, LadderOutcome, text_of};
use crate::{error::Misconfiguration, host::FieldType, util::lock};

/// Converts a raw selection into the value stored for a field of `field_type`.
/// Empty input and unparsable numbers become absent.
pub fn parse_value(raw: &str, field_type: FieldType) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    if !field_type.is_numeric() {
        return Some(Value::String(raw.to_string()));
    }
    let trimmed = raw.trim();
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Some(Value::from(integer));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

struct ChoiceState {
    draft: Option<String>,
    visible: bool,
    message: Option<String>,
}

struct ChoiceInner {
    ctx: FieldContext,
    required: bool,
    options: Vec<String>,
    state: Mutex<ChoiceState>,
}

/// Single choice out of the field's predefined values.
#[derive(Clone)]
pub struct ChoiceValidator {
    inner: Arc<ChoiceInner>,
}

impl ChoiceValidator {
    pub fn mount(ctx: FieldContext, required: bool) -> Result<Self, Misconfiguration> {
        let definition = ctx.field.definition();
        let options: Vec<String> = definition
            .predefined_values()
            .iter()
            .filter_map(|raw| parse_value(raw, definition.field_type))
            .map(|value| crate::host::value_to_text(&value))
            .collect();
        if options.is_empty() {
            debug!(field_id = ctx.field_id(), "choice field has no predefined values");
            return Err(Misconfiguration::EmptyPredefinedValues {
                field_id: ctx.field_id().to_string(),
            });
        }

        let draft = text_of(ctx.field.get_value().as_ref());
        let validator = Self {
            inner: Arc::new(ChoiceInner {
                ctx,
                required,
                options,
                state: Mutex::new(ChoiceState {
                    draft,
                    visible: true,
                    message: None,
                }),
            }),
        };
        validator.validate();
        Ok(validator)
    }

    pub fn options(&self) -> &[String] {
        &self.inner.options
    }

    pub fn draft(&self) -> Option<String> {
        lock(&self.inner.state).draft.clone()
    }

    pub fn error_message(&self) -> Option<String> {
        lock(&self.inner.state).message.clone()
    }

    /// Whether the selector should render as invalid.
    pub fn is_invalid(&self) -> bool {
        self.error_message().is_some() || !self.inner.ctx.store.is_field_valid(self.inner.ctx.field_id())
    }

    /// User picked `raw` (empty string for the placeholder option).
    pub fn select(&self, raw: &str) {
        let ctx = &self.inner.ctx;
        {
            let mut state = lock(&self.inner.state);
            state.message = None;
            state.draft = (!raw.is_empty()).then(|| raw.to_string());
        }
        ctx.clear_general();
        ctx.field
            .set_value(parse_value(raw, ctx.field.definition().field_type));
        self.validate();
    }

    pub fn hide(&self) {
        lock(&self.inner.state).visible = false;
        self.validate();
    }

    fn validate(&self) {
        let (visible, empty) = {
            let state = lock(&self.inner.state);
            (state.visible, state.draft.is_none())
        };
        let outcome = LadderOutcome::evaluate(visible, self.inner.required, empty);
        let message = self.inner.ctx.apply(outcome, true);
        lock(&self.inner.state).message = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EngineOptions,
        host::{FieldApi, FieldDefinition, memory::MemoryField},
        store::ValidationStore,
    };
    use serde_json::json;

    fn context(definition: FieldDefinition, value: Option<Value>) -> (FieldContext, Arc<MemoryField>) {
        let field = MemoryField::new(definition, value);
        let ctx = FieldContext::new(
            field.clone(),
            ValidationStore::new(),
            Arc::new(EngineOptions::default()),
        );
        (ctx, field)
    }

    #[test]
    fn parses_by_declared_type() {
        assert_eq!(parse_value("", FieldType::Symbol), None);
        assert_eq!(parse_value("7", FieldType::Symbol), Some(json!("7")));
        assert_eq!(parse_value("7", FieldType::Integer), Some(json!(7)));
        assert_eq!(parse_value("2.5", FieldType::Number), Some(json!(2.5)));
        assert_eq!(parse_value("seven", FieldType::Integer), None);
    }

    #[test]
    fn empty_option_set_is_a_misconfiguration() {
        let definition = FieldDefinition::new("size", FieldType::Symbol)
            .with_predefined_values(Vec::<Value>::new());
        let (ctx, _) = context(definition, None);
        let store = ctx.store.clone();
        let err = ChoiceValidator::mount(ctx, true).err().expect("misconfigured");
        assert_eq!(
            err,
            Misconfiguration::EmptyPredefinedValues {
                field_id: "size".to_string()
            }
        );
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn required_choice_flags_missing_value_until_selected() {
        let definition =
            FieldDefinition::new("size", FieldType::Integer).with_predefined_values([1, 2, 3]);
        let (ctx, field) = context(definition, None);
        let store = ctx.store.clone();
        let validator = ChoiceValidator::mount(ctx, true).expect("mount");
        assert_eq!(validator.options(), ["1", "2", "3"]);
        assert_eq!(store.field_error("size", None).as_deref(), Some("Required."));
        assert!(field.is_invalid());

        validator.select("2");
        assert_eq!(field.get_value(), Some(json!(2)));
        assert!(store.is_field_valid("size"));
        assert!(!validator.is_invalid());

        validator.select("");
        assert_eq!(field.get_value(), None);
        assert_eq!(validator.error_message().as_deref(), Some("Required."));
    }

    #[test]
    fn optional_choice_accepts_empty() {
        let definition =
            FieldDefinition::new("tone", FieldType::Symbol).with_predefined_values(["a", "b"]);
        let (ctx, field) = context(definition, Some(json!("a")));
        let store = ctx.store.clone();
        let validator = ChoiceValidator::mount(ctx, false).expect("mount");
        assert_eq!(validator.draft().as_deref(), Some("a"));
        validator.select("");
        assert!(store.is_field_valid("tone"));
        assert!(!field.is_invalid());
    }
}
