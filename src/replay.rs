//! Scripted editing sessions against the in-memory host.
//!
//! A fixture describes an entry, the records already in the store, and a
//! list of user actions. Replaying it mounts every field that carries
//! instance parameters, applies the actions in order, and reports what the
//! editor would show afterwards.

use std::{sync::{Arc, LazyLock}, time::Duration};

use jsonschema::{Validator, validator_for};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::{
    config::{EngineOptions, FieldInstanceConfig},
    domain::DomainConfig,
    editor::FieldReport,
    error::EntryGuardError,
    host::{
        EntryApi, EntryQuery, EntrySys, FieldApi, FieldDefinition, FoundEntry,
        memory::{MemoryEntry, MemoryQuery, StoredEntry},
    },
    session::EntrySession,
};

static FIXTURE_SCHEMA: LazyLock<Option<Validator>> = LazyLock::new(|| {
    validator_for(&json!({
        "type": "object",
        "required": ["entry", "fields"],
        "properties": {
            "entry": {
                "type": "object",
                "required": ["id", "contentTypeId"]
            },
            "fields": {
                "type": "array",
                "items": {"type": "object", "required": ["id", "type"]}
            },
            "store": {"type": "array"},
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["action"],
                    "properties": {
                        "action": {"enum": ["edit", "select", "set", "wait"]}
                    }
                }
            }
        }
    }))
    .ok()
});

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub entry: EntrySys,
    #[serde(default)]
    pub options: FixtureOptions,
    pub fields: Vec<FixtureField>,
    #[serde(default)]
    pub store: Vec<FixtureRecord>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixtureOptions {
    pub quiet_period_ms: Option<u64>,
    pub default_locale: Option<String>,
    pub domains: Option<DomainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureField {
    #[serde(flatten)]
    pub definition: FieldDefinition,
    #[serde(default)]
    pub value: Option<Value>,
    /// Fields with instance parameters get an editor mounted.
    #[serde(default)]
    pub instance: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureRecord {
    pub content_type_id: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(flatten)]
    pub entry: FoundEntry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Step {
    Edit { field: String, text: String },
    Select { field: String, value: String },
    Set { field: String, value: Option<Value> },
    Wait { ms: u64 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub status: Map<String, Value>,
    pub fields: Vec<FieldReport>,
    pub queries: usize,
}

impl Fixture {
    pub fn from_value(value: Value) -> Result<Self, EntryGuardError> {
        if let Some(validator) = FIXTURE_SCHEMA.as_ref() {
            let problems: Vec<String> = validator
                .iter_errors(&value)
                .map(|error| {
                    let pointer = error.instance_path.to_string();
                    let pointer = if pointer.is_empty() { "<root>".to_string() } else { pointer };
                    format!("{pointer}: {error}")
                })
                .collect();
            if !problems.is_empty() {
                return Err(EntryGuardError::Fixture(problems.join("; ")));
            }
        }
        serde_json::from_value(value).map_err(|err| EntryGuardError::Fixture(err.to_string()))
    }

    pub fn engine_options(&self) -> EngineOptions {
        let mut options = EngineOptions::default();
        if let Some(ms) = self.options.quiet_period_ms {
            options = options.with_quiet_period(Duration::from_millis(ms));
        }
        if let Some(locale) = &self.options.default_locale {
            options = options.with_default_locale(locale.clone());
        }
        if let Some(domains) = &self.options.domains {
            options = options.with_domains(domains.clone());
        }
        options
    }
}

/// Replays `fixture` on a fresh current-thread runtime, blocking until done.
pub fn run(fixture: &Fixture) -> Result<ReplayReport, EntryGuardError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| EntryGuardError::Fixture(format!("failed to start runtime: {err}")))?;
    runtime.block_on(replay(fixture))
}

/// Runs `fixture` on the current tokio runtime.
pub async fn replay(fixture: &Fixture) -> Result<ReplayReport, EntryGuardError> {
    let mut entry = MemoryEntry::new(fixture.entry.id.clone(), fixture.entry.content_type_id.clone());
    for field in &fixture.fields {
        entry.insert_field(field.definition.clone(), field.value.clone().filter(|v| !v.is_null()));
    }
    let entry = Arc::new(entry);
    let query = Arc::new(MemoryQuery::new(
        fixture
            .store
            .iter()
            .map(|record| StoredEntry {
                content_type_id: record.content_type_id.clone(),
                archived: record.archived,
                entry: record.entry.clone(),
            })
            .collect(),
    ));

    let session = EntrySession::open(
        Arc::clone(&entry) as Arc<dyn EntryApi>,
        Arc::clone(&query) as Arc<dyn EntryQuery>,
        fixture.engine_options(),
    )?;
    for field in &fixture.fields {
        let Some(parameters) = &field.instance else {
            continue;
        };
        let config = FieldInstanceConfig::from_parameters(&field.definition.id, parameters)?;
        session.mount_field(&field.definition.id, config)?;
    }

    for (index, step) in fixture.steps.iter().enumerate() {
        debug!(index, ?step, "replaying step");
        match step {
            Step::Edit { field, text } => {
                let editor = session
                    .editor(field)
                    .ok_or_else(|| EntryGuardError::UnknownField(field.clone()))?;
                if !editor.edit(text) {
                    warn!(index, %field, "edit ignored; no text input is mounted");
                }
            }
            Step::Select { field, value } => {
                let editor = session
                    .editor(field)
                    .ok_or_else(|| EntryGuardError::UnknownField(field.clone()))?;
                if !editor.select(value) {
                    warn!(index, %field, "selection ignored; no choice input is mounted");
                }
            }
            Step::Set { field, value } => {
                let target = entry
                    .memory_field(field)
                    .ok_or_else(|| EntryGuardError::UnknownField(field.clone()))?;
                target.set_value(value.clone().filter(|v| !v.is_null()));
            }
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
        }
    }

    let report = ReplayReport {
        status: session.status(),
        fields: session.reports(),
        queries: query.call_count(),
    };
    session.close();
    Ok(report)
}
