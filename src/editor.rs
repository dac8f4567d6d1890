//! Per-field mounting: picks the editor variant and keeps its validator
//! mounted only while the field is visible.

use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use crate::{
    config::{EngineOptions, FieldInstanceConfig},
    error::Misconfiguration,
    host::{EntryApi, EntryQuery, FieldDefinition, FieldType},
    util::lock,
    validators::{ChoiceValidator, FieldContext, ReferenceValidator, TextValidator},
    visibility::{Visibility, VisibilityController},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EditorKind {
    Text,
    Choice,
    Reference,
    DefaultSingleLine,
    DefaultDropdown,
    DefaultReference,
    DefaultReferenceList,
}

impl EditorKind {
    pub fn select(
        definition: &FieldDefinition,
        config: &FieldInstanceConfig,
        options: &EngineOptions,
    ) -> Self {
        let custom = config.is_custom_validated();
        if definition.field_type == FieldType::Link {
            return if custom {
                EditorKind::Reference
            } else {
                EditorKind::DefaultReference
            };
        }
        if definition.is_link_list() {
            return EditorKind::DefaultReferenceList;
        }
        let choice_type = matches!(
            definition.field_type,
            FieldType::Symbol | FieldType::Integer | FieldType::Number
        );
        if choice_type && definition.has_predefined_values() {
            return if custom {
                EditorKind::Choice
            } else {
                EditorKind::DefaultDropdown
            };
        }
        if custom || definition.id == options.view_all.field_id {
            return EditorKind::Text;
        }
        EditorKind::DefaultSingleLine
    }

    pub fn is_validated(self) -> bool {
        matches!(
            self,
            EditorKind::Text | EditorKind::Choice | EditorKind::Reference
        )
    }
}

#[derive(Clone)]
enum Mounted {
    Nothing,
    Text(TextValidator),
    Choice(ChoiceValidator),
    Reference(ReferenceValidator),
    Misconfigured(Misconfiguration),
}

struct EditorInner {
    kind: EditorKind,
    ctx: FieldContext,
    config: FieldInstanceConfig,
    entry: Arc<dyn EntryApi>,
    query: Arc<dyn EntryQuery>,
    runtime: Handle,
    mounted: Mutex<Mounted>,
    visibility: Mutex<Option<VisibilityController>>,
}

/// Snapshot of one field as the editor would render it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReport {
    pub field_id: String,
    pub kind: EditorKind,
    pub visibility: Visibility,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checking: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub misconfiguration: Option<String>,
}

#[derive(Clone)]
pub struct FieldEditor {
    inner: Arc<EditorInner>,
}

impl FieldEditor {
    pub(crate) fn mount(
        ctx: FieldContext,
        config: FieldInstanceConfig,
        entry: Arc<dyn EntryApi>,
        query: Arc<dyn EntryQuery>,
        runtime: Handle,
    ) -> Self {
        let kind = EditorKind::select(ctx.field.definition(), &config, &ctx.options);
        debug!(field_id = ctx.field_id(), ?kind, "mounting field editor");
        let condition = config.condition();
        let inner = Arc::new(EditorInner {
            kind,
            ctx,
            config,
            entry,
            query,
            runtime,
            mounted: Mutex::new(Mounted::Nothing),
            visibility: Mutex::new(None),
        });

        let visibility = VisibilityController::mount(
            Arc::clone(&inner.ctx.field),
            inner.entry.as_ref(),
            condition,
            inner.ctx.store.clone(),
        );
        if visibility.is_visible() {
            inner.mount_validator();
        }
        let weak: Weak<EditorInner> = Arc::downgrade(&inner);
        visibility.on_transition(Arc::new(move |next| {
            if let Some(inner) = weak.upgrade() {
                match next {
                    Visibility::Visible => inner.mount_validator(),
                    Visibility::Hidden => inner.unmount_validator(),
                }
            }
        }));
        *lock(&inner.visibility) = Some(visibility);

        Self { inner }
    }

    pub fn field_id(&self) -> &str {
        self.inner.ctx.field_id()
    }

    pub fn kind(&self) -> EditorKind {
        self.inner.kind
    }

    /// Hidden once torn down.
    pub fn visibility(&self) -> Visibility {
        lock(&self.inner.visibility)
            .as_ref()
            .map_or(Visibility::Hidden, VisibilityController::visibility)
    }

    pub fn is_visible(&self) -> bool {
        self.visibility().is_visible()
    }

    pub fn misconfiguration(&self) -> Option<Misconfiguration> {
        match self.mounted() {
            Mounted::Misconfigured(err) => Some(err),
            _ => None,
        }
    }

    /// Forwards typed text; false when no text validator is mounted.
    pub fn edit(&self, text: &str) -> bool {
        match self.mounted() {
            Mounted::Text(validator) => {
                validator.edit(text);
                true
            }
            _ => false,
        }
    }

    /// Forwards a choice selection; false when no choice validator is mounted.
    pub fn select(&self, raw: &str) -> bool {
        match self.mounted() {
            Mounted::Choice(validator) => {
                validator.select(raw);
                true
            }
            _ => false,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self.mounted() {
            Mounted::Text(validator) => validator.error_message(),
            Mounted::Choice(validator) => validator.error_message(),
            Mounted::Reference(validator) => validator.display_message(),
            Mounted::Nothing | Mounted::Misconfigured(_) => None,
        }
    }

    pub fn draft(&self) -> Option<String> {
        match self.mounted() {
            Mounted::Text(validator) => Some(validator.draft()),
            Mounted::Choice(validator) => validator.draft(),
            _ => None,
        }
    }

    pub fn is_checking(&self) -> bool {
        matches!(self.mounted(), Mounted::Text(validator) if validator.is_checking())
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.mounted(), Mounted::Text(validator) if validator.is_disabled())
    }

    pub fn text_validator(&self) -> Option<TextValidator> {
        match self.mounted() {
            Mounted::Text(validator) => Some(validator),
            _ => None,
        }
    }

    pub fn report(&self) -> FieldReport {
        let ctx = &self.inner.ctx;
        FieldReport {
            field_id: ctx.field_id().to_string(),
            kind: self.inner.kind,
            visibility: self.visibility(),
            valid: ctx.store.is_field_valid(ctx.field_id()),
            value: ctx.field.get_value(),
            message: self.error_message(),
            checking: self.is_checking(),
            misconfiguration: self.misconfiguration().map(|err| err.to_string()),
        }
    }

    /// Unmounts the validator and stops following the condition source.
    pub fn teardown(&self) {
        let visibility = lock(&self.inner.visibility).take();
        drop(visibility);
        let mounted = std::mem::replace(&mut *lock(&self.inner.mounted), Mounted::Nothing);
        match mounted {
            Mounted::Text(validator) => validator.detach(),
            Mounted::Reference(validator) => validator.detach(),
            Mounted::Choice(_) | Mounted::Nothing | Mounted::Misconfigured(_) => {}
        }
    }

    fn mounted(&self) -> Mounted {
        lock(&self.inner.mounted).clone()
    }
}

impl EditorInner {
    fn mount_validator(&self) {
        let mounted = match self.kind {
            EditorKind::Text => Mounted::Text(TextValidator::mount(
                self.ctx.clone(),
                &self.config,
                self.entry.as_ref(),
                Arc::clone(&self.query),
                self.runtime.clone(),
            )),
            EditorKind::Choice => {
                match ChoiceValidator::mount(self.ctx.clone(), self.config.is_required) {
                    Ok(validator) => Mounted::Choice(validator),
                    Err(err) => Mounted::Misconfigured(err),
                }
            }
            EditorKind::Reference => Mounted::Reference(ReferenceValidator::mount(
                self.ctx.clone(),
                self.config.is_required,
            )),
            EditorKind::DefaultSingleLine
            | EditorKind::DefaultDropdown
            | EditorKind::DefaultReference
            | EditorKind::DefaultReferenceList => Mounted::Nothing,
        };
        *lock(&self.mounted) = mounted;
    }

    fn unmount_validator(&self) {
        let mounted = std::mem::replace(&mut *lock(&self.mounted), Mounted::Nothing);
        debug!(field_id = self.ctx.field_id(), "unmounting validator");
        match mounted {
            Mounted::Text(validator) => {
                validator.detach();
                validator.hide();
            }
            Mounted::Choice(validator) => validator.hide(),
            Mounted::Reference(validator) => {
                validator.detach();
                validator.hide();
            }
            Mounted::Nothing | Mounted::Misconfigured(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind_of(definition: FieldDefinition, config: FieldInstanceConfig) -> EditorKind {
        EditorKind::select(&definition, &config, &EngineOptions::default())
    }

    #[test]
    fn routes_by_type_and_custom_validation() {
        let required = FieldInstanceConfig::default().required();
        let plain = FieldInstanceConfig::default();
        assert_eq!(
            kind_of(FieldDefinition::new("hero", FieldType::Link), required.clone()),
            EditorKind::Reference
        );
        assert_eq!(
            kind_of(FieldDefinition::new("hero", FieldType::Link), plain.clone()),
            EditorKind::DefaultReference
        );
        assert_eq!(
            kind_of(
                FieldDefinition::new("items", FieldType::Array).with_items(FieldType::Link),
                required.clone()
            ),
            EditorKind::DefaultReferenceList
        );
        let dropdown = FieldDefinition::new("size", FieldType::Symbol).with_predefined_values([json!("s")]);
        assert_eq!(kind_of(dropdown.clone(), required.clone()), EditorKind::Choice);
        assert_eq!(kind_of(dropdown, plain.clone()), EditorKind::DefaultDropdown);
        assert_eq!(
            kind_of(FieldDefinition::new("slug", FieldType::Symbol), required),
            EditorKind::Text
        );
        assert_eq!(
            kind_of(FieldDefinition::new("viewAllActionText", FieldType::Symbol), plain.clone()),
            EditorKind::Text
        );
        assert_eq!(
            kind_of(FieldDefinition::new("title", FieldType::Symbol), plain),
            EditorKind::DefaultSingleLine
        );
    }
}
