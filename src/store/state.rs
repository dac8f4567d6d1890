use std::sync::LazyLock;

use indexmap::IndexMap;
use jsonschema::{Validator, validator_for};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::warn;

use super::key::belongs_to;

/// Shape of the persisted status blob: an object of non-empty messages.
static STATUS_SCHEMA: LazyLock<Option<Validator>> = LazyLock::new(|| {
    validator_for(&json!({
        "type": "object",
        "additionalProperties": {"type": "string", "minLength": 1}
    }))
    .ok()
});

/// Validation key to error message, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationState {
    entries: IndexMap<String, String>,
}

impl ValidationState {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, message)| (key.as_str(), message.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_error(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_error_message)
    }

    pub fn is_field_valid(&self, field_id: &str) -> bool {
        !self
            .entries
            .iter()
            .any(|(key, message)| belongs_to(key, field_id) && is_error_message(message))
    }

    pub(crate) fn insert(&mut self, key: String, message: String) {
        self.entries.insert(key, message);
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    pub(crate) fn remove_field(&mut self, field_id: &str) -> Vec<String> {
        let removed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| belongs_to(key, field_id))
            .cloned()
            .collect();
        self.entries.retain(|key, _| !belongs_to(key, field_id));
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries carrying an actual message, as stored on the entry.
    pub fn projection(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .filter(|(_, message)| is_error_message(message))
            .map(|(key, message)| (key.clone(), Value::String(message.clone())))
            .collect()
    }

    /// Rebuilds state from a persisted status blob. Non-string entries are
    /// dropped; a non-object blob yields an empty state.
    pub fn from_persisted(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        if let Some(validator) = STATUS_SCHEMA.as_ref() {
            for error in validator.iter_errors(value) {
                warn!(
                    pointer = %error.instance_path,
                    "persisted validation status does not match expected shape: {error}"
                );
            }
        }
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let entries = object
            .iter()
            .filter_map(|(key, message)| {
                message
                    .as_str()
                    .map(|message| (key.clone(), message.to_string()))
            })
            .collect();
        Self { entries }
    }
}

impl FromIterator<(String, String)> for ValidationState {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

pub(crate) fn is_error_message(message: &str) -> bool {
    !message.trim().is_empty()
}
