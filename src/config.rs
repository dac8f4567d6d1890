use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    condition::{ConditionAction, ConditionDescriptor, Operator},
    domain::DomainConfig,
    error::EntryGuardError,
};

pub const REQUIRED_MESSAGE: &str = "Required.";
pub const REFERENCE_REQUIRED_FALLBACK: &str = "This field is required.";

/// Engine-wide settings shared by every field of a session.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub quiet_period: Duration,
    pub status_field_id: String,
    pub venture_field_id: String,
    pub default_locale: String,
    pub required_message: String,
    pub domains: DomainConfig,
    pub view_all: ViewAllText,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(500),
            status_field_id: "validationStatus".to_string(),
            venture_field_id: "venture".to_string(),
            default_locale: "en-US".to_string(),
            required_message: REQUIRED_MESSAGE.to_string(),
            domains: DomainConfig::default(),
            view_all: ViewAllText::default(),
        }
    }
}

impl EngineOptions {
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn with_status_field(mut self, field_id: impl Into<String>) -> Self {
        self.status_field_id = field_id.into();
        self
    }

    pub fn with_venture_field(mut self, field_id: impl Into<String>) -> Self {
        self.venture_field_id = field_id.into();
        self
    }

    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    pub fn with_required_message(mut self, message: impl Into<String>) -> Self {
        self.required_message = message.into();
        self
    }

    pub fn with_domains(mut self, domains: DomainConfig) -> Self {
        self.domains = domains;
        self
    }

    pub fn with_view_all(mut self, view_all: ViewAllText) -> Self {
        self.view_all = view_all;
        self
    }
}

/// A text field whose content is derived from a sibling "type" field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewAllText {
    pub field_id: String,
    pub type_field_id: String,
    pub labels: Vec<(String, String)>,
}

impl Default for ViewAllText {
    fn default() -> Self {
        Self {
            field_id: "viewAllActionText".to_string(),
            type_field_id: "viewAllType".to_string(),
            labels: vec![
                ("auto".to_string(), "View All".to_string()),
                ("view".to_string(), "Go to".to_string()),
            ],
        }
    }
}

impl ViewAllText {
    pub fn label_for(&self, kind: Option<&Value>) -> &str {
        let Some(kind) = kind.and_then(Value::as_str) else {
            return "";
        };
        self.labels
            .iter()
            .find(|(candidate, _)| candidate == kind)
            .map_or("", |(_, label)| label.as_str())
    }
}

/// Per-field parameters configured on the editor instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldInstanceConfig {
    pub condition_source_field_id: Option<String>,
    pub condition_operator: Option<String>,
    pub condition_trigger_value: Option<Value>,
    pub condition_action: Option<String>,
    pub is_required: bool,
    pub is_unique_per_venture: bool,
    pub is_unique_reference_list: bool,
}

impl FieldInstanceConfig {
    pub fn from_parameters(field_id: &str, parameters: &Value) -> Result<Self, EntryGuardError> {
        if parameters.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(parameters.clone()).map_err(|err| EntryGuardError::InstanceConfig {
            field_id: field_id.to_string(),
            message: err.to_string(),
        })
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn unique_per_venture(mut self) -> Self {
        self.is_unique_per_venture = true;
        self
    }

    pub fn shown_when(
        mut self,
        source_field_id: impl Into<String>,
        operator: impl Into<String>,
        trigger_value: impl Into<Value>,
        action: impl Into<String>,
    ) -> Self {
        self.condition_source_field_id = Some(source_field_id.into());
        self.condition_operator = Some(operator.into());
        self.condition_trigger_value = Some(trigger_value.into());
        self.condition_action = Some(action.into());
        self
    }

    pub fn is_custom_validated(&self) -> bool {
        self.is_required || self.is_unique_per_venture || self.is_unique_reference_list
    }

    /// The visibility condition, present only when all four parts are set.
    pub fn condition(&self) -> Option<ConditionDescriptor> {
        let source_field_id = self.condition_source_field_id.as_deref().filter(|id| !id.is_empty())?;
        let operator = self.condition_operator.as_deref().filter(|op| !op.is_empty())?;
        let trigger_value = self.condition_trigger_value.as_ref().filter(|value| is_truthy(value))?;
        let action = self.condition_action.as_deref().filter(|action| !action.is_empty())?;
        Some(ConditionDescriptor {
            source_field_id: source_field_id.to_string(),
            operator: Operator::parse(operator),
            trigger_value: trigger_value.clone(),
            action: ConditionAction::parse(action),
        })
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(num) => num.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_camel_case_parameters() {
        let params = json!({
            "conditionSourceFieldId": "type",
            "conditionOperator": "equal",
            "conditionTriggerValue": "grid",
            "conditionAction": "show",
            "isRequired": true
        });
        let config = FieldInstanceConfig::from_parameters("slug", &params).expect("config");
        assert!(config.is_custom_validated());
        let condition = config.condition().expect("condition");
        assert_eq!(condition.source_field_id, "type");
        assert_eq!(condition.operator, Operator::Equal);
        assert_eq!(condition.action, ConditionAction::Show);
    }

    #[test]
    fn condition_needs_all_four_parts() {
        let config = FieldInstanceConfig::default().shown_when("type", "equal", "", "show");
        assert!(config.condition().is_none());
        let mut config = FieldInstanceConfig::default().shown_when("type", "isEmpty", "x", "hide");
        assert!(config.condition().is_some());
        config.condition_action = None;
        assert!(config.condition().is_none());
        assert!(!config.is_custom_validated());
    }

    #[test]
    fn rejects_malformed_parameters() {
        let err = FieldInstanceConfig::from_parameters("slug", &json!({"isRequired": "yes"}))
            .expect_err("string flag");
        assert!(err.to_string().contains("slug"));
    }

    #[test]
    fn view_all_labels_map_known_types() {
        let view_all = ViewAllText::default();
        assert_eq!(view_all.label_for(Some(&json!("auto"))), "View All");
        assert_eq!(view_all.label_for(Some(&json!("view"))), "Go to");
        assert_eq!(view_all.label_for(Some(&json!("other"))), "");
        assert_eq!(view_all.label_for(None), "");
    }
}
