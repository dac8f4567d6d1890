//! Narrow capability surface the engine needs from the hosting editor.
//!
//! The real editor SDK and the in-memory fake in [`memory`] both implement
//! these traits, so every component can be exercised without a browser.

pub mod memory;

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;

/// Callback invoked with a field's new value after every write.
pub type ValueListener = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

/// Handle returned by [`FieldApi::on_value_changed`]; dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes the listener"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Symbol,
    Text,
    Integer,
    Number,
    Boolean,
    Date,
    Location,
    Object,
    Link,
    Array,
    #[serde(other)]
    Other,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Number)
    }
}

/// Static description of a field as declared on the content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_type: Option<FieldType>,
    #[serde(default)]
    pub validations: Vec<Value>,
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            field_type,
            items_type: None,
            validations: Vec::new(),
        }
    }

    pub fn with_items(mut self, items_type: FieldType) -> Self {
        self.items_type = Some(items_type);
        self
    }

    pub fn with_predefined_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.validations
            .push(serde_json::json!({ "in": Value::Array(values) }));
        self
    }

    /// True when any validation declares an `in` list, even an empty one.
    pub fn has_predefined_values(&self) -> bool {
        self.validations
            .iter()
            .any(|validation| validation.get("in").is_some())
    }

    /// Values of the first `in` validation, rendered as text.
    pub fn predefined_values(&self) -> Vec<String> {
        self.validations
            .iter()
            .find_map(|validation| validation.get("in").and_then(Value::as_array))
            .map(|items| items.iter().map(value_to_text).collect())
            .unwrap_or_default()
    }

    pub fn is_link_list(&self) -> bool {
        self.field_type == FieldType::Array && self.items_type == Some(FieldType::Link)
    }
}

/// Identity of the open entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySys {
    pub id: String,
    pub content_type_id: String,
}

/// One field slot on the open entry.
pub trait FieldApi: Send + Sync {
    fn definition(&self) -> &FieldDefinition;

    fn id(&self) -> &str {
        &self.definition().id
    }

    fn get_value(&self) -> Option<Value>;

    fn set_value(&self, value: Option<Value>);

    fn set_invalid(&self, invalid: bool);

    /// Registers a listener for subsequent writes. The listener is not
    /// invoked for the current value.
    fn on_value_changed(&self, listener: ValueListener) -> Subscription;
}

pub trait EntryApi: Send + Sync {
    fn sys(&self) -> EntrySys;

    fn field(&self, id: &str) -> Option<Arc<dyn FieldApi>>;
}

/// Filter sent to the external entry store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindManyQuery {
    pub content_type_in: Vec<String>,
    pub exclude_id: String,
    pub exclude_archived: bool,
    pub text_query: String,
}

/// An entry returned by the external store, fields keyed by id then locale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoundEntry {
    pub id: String,
    #[serde(default)]
    pub fields: HashMap<String, HashMap<String, Value>>,
}

impl FoundEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(
        mut self,
        field_id: impl Into<String>,
        locale: impl Into<String>,
        value: Value,
    ) -> Self {
        self.fields
            .entry(field_id.into())
            .or_default()
            .insert(locale.into(), value);
        self
    }

    pub fn localized(&self, field_id: &str, locale: &str) -> Option<&Value> {
        self.fields.get(field_id)?.get(locale)
    }
}

#[async_trait]
pub trait EntryQuery: Send + Sync {
    async fn find_many(&self, query: &FindManyQuery) -> Result<Vec<FoundEntry>, QueryError>;
}

/// The `sys.id` of a link value such as `{"sys": {"id": "V1", ...}}`.
pub fn link_id(value: &Value) -> Option<&str> {
    value.get("sys")?.get("id")?.as_str()
}

pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(num) => num.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
