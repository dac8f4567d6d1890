//! Declarative show/hide conditions over another field's value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::host::value_to_text;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Contains,
    IsEmpty,
    IsNotEmpty,
    Unknown(String),
}

impl Operator {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "equal" => Operator::Equal,
            "notEqual" => Operator::NotEqual,
            "contains" => Operator::Contains,
            "isEmpty" => Operator::IsEmpty,
            "isNotEmpty" => Operator::IsNotEmpty,
            other => Operator::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionAction {
    Show,
    Hide,
}

impl ConditionAction {
    /// `show` keeps the condition; anything else inverts it.
    pub fn parse(raw: &str) -> Self {
        if raw == "show" {
            ConditionAction::Show
        } else {
            ConditionAction::Hide
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionDescriptor {
    pub source_field_id: String,
    pub operator: Operator,
    pub trigger_value: Value,
    pub action: ConditionAction,
}

impl ConditionDescriptor {
    pub fn should_show(&self, source_value: Option<&Value>) -> bool {
        let matched = evaluate(source_value, &self.operator, Some(&self.trigger_value));
        match self.action {
            ConditionAction::Show => matched,
            ConditionAction::Hide => !matched,
        }
    }
}

/// Evaluates `operator` against a field value. Total: unknown operators and
/// unsupported value shapes yield `false`.
pub fn evaluate(field_value: Option<&Value>, operator: &Operator, trigger: Option<&Value>) -> bool {
    match operator {
        Operator::Equal => field_value == trigger,
        Operator::NotEqual => field_value != trigger,
        Operator::Contains => contains(field_value, trigger),
        Operator::IsEmpty => is_empty(field_value),
        Operator::IsNotEmpty => !is_empty(field_value),
        Operator::Unknown(_) => false,
    }
}

fn contains(field_value: Option<&Value>, trigger: Option<&Value>) -> bool {
    match (field_value, trigger) {
        (Some(Value::Array(items)), Some(trigger)) => items.contains(trigger),
        (Some(Value::String(text)), Some(trigger @ (Value::String(_) | Value::Number(_) | Value::Bool(_)))) => {
            text.contains(value_to_text(trigger).as_str())
        }
        _ => false,
    }
}

pub(crate) fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(value: Option<Value>, op: &str, trigger: Value) -> bool {
        evaluate(value.as_ref(), &Operator::parse(op), Some(&trigger))
    }

    #[test]
    fn equality_is_strict() {
        assert!(eval(Some(json!("promo")), "equal", json!("promo")));
        assert!(!eval(Some(json!(5)), "equal", json!("5")));
        assert!(eval(Some(json!(5)), "notEqual", json!("5")));
        assert!(eval(None, "notEqual", json!("x")));
    }

    #[test]
    fn contains_handles_arrays_and_strings_only() {
        assert!(eval(Some(json!(["a", "b"])), "contains", json!("b")));
        assert!(!eval(Some(json!(["a", "b"])), "contains", json!("c")));
        assert!(eval(Some(json!("abc")), "contains", json!("b")));
        assert!(eval(Some(json!("a5c")), "contains", json!(5)));
        assert!(!eval(Some(json!(5)), "contains", json!(5)));
        assert!(!eval(None, "contains", json!("a")));
        assert!(!eval(Some(json!({"a": 1})), "contains", json!("a")));
    }

    #[test]
    fn emptiness_treats_absent_null_and_blank_alike() {
        for value in [None, Some(Value::Null), Some(json!(""))] {
            assert!(eval(value.clone(), "isEmpty", json!("ignored")));
            assert!(!eval(value, "isNotEmpty", json!("ignored")));
        }
        assert!(eval(Some(json!(" ")), "isNotEmpty", Value::Null));
        assert!(eval(Some(json!(0)), "isNotEmpty", Value::Null));
        assert!(eval(Some(json!([])), "isNotEmpty", Value::Null));
    }

    #[test]
    fn unknown_operator_is_false() {
        assert!(!eval(Some(json!("x")), "startsWith", json!("x")));
        assert!(!eval(None, "", json!("")));
    }

    #[test]
    fn hide_action_inverts_condition() {
        let mut descriptor = ConditionDescriptor {
            source_field_id: "type".to_string(),
            operator: Operator::Equal,
            trigger_value: json!("auto"),
            action: ConditionAction::Show,
        };
        assert!(descriptor.should_show(Some(&json!("auto"))));
        descriptor.action = ConditionAction::parse("hide");
        assert!(!descriptor.should_show(Some(&json!("auto"))));
        assert!(descriptor.should_show(None));
    }
}
