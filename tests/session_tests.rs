use std::sync::Arc;

use entryguard::{
    EngineOptions, EntrySession, FieldInstanceConfig, Misconfiguration, Visibility,
    editor::EditorKind,
    host::{
        EntryApi, EntryQuery, FieldApi, FieldDefinition, FieldType,
        memory::{MemoryEntry, MemoryQuery},
    },
};
use serde_json::{Value, json};

fn open(entry: &Arc<MemoryEntry>) -> EntrySession {
    EntrySession::open(
        Arc::clone(entry) as Arc<dyn EntryApi>,
        Arc::new(MemoryQuery::default()) as Arc<dyn EntryQuery>,
        EngineOptions::default(),
    )
    .expect("runtime available")
}

fn status_of(entry: &MemoryEntry) -> Option<Value> {
    entry
        .memory_field("validationStatus")
        .and_then(|field| field.get_value())
}

fn news_entry() -> Arc<MemoryEntry> {
    Arc::new(
        MemoryEntry::new("entry-1", "article")
            .with_field(FieldDefinition::new("validationStatus", FieldType::Object), None)
            .with_field(FieldDefinition::new("category", FieldType::Symbol), Some(json!("news")))
            .with_field(FieldDefinition::new("headline", FieldType::Symbol), None),
    )
}

fn headline_config() -> FieldInstanceConfig {
    FieldInstanceConfig::default()
        .required()
        .shown_when("category", "equal", "news", "show")
}

#[tokio::test]
async fn required_text_field_follows_draft_and_visibility() {
    let entry = news_entry();
    let session = open(&entry);
    let editor = session
        .mount_field("headline", headline_config())
        .expect("headline exists");
    assert_eq!(editor.kind(), EditorKind::Text);

    assert_eq!(status_of(&entry), Some(json!({"headline": "Required."})));
    assert_eq!(editor.error_message().as_deref(), Some("Required."));

    editor.edit("Markets rally");
    assert_eq!(status_of(&entry), Some(json!({})));
    let headline = entry.memory_field("headline").expect("headline");
    assert_eq!(headline.get_value(), Some(json!("Markets rally")));

    editor.edit("");
    assert_eq!(status_of(&entry), Some(json!({"headline": "Required."})));
    assert_eq!(headline.get_value(), None);

    let category = entry.memory_field("category").expect("category");
    category.set_value(Some(json!("blog")));
    assert_eq!(editor.visibility(), Visibility::Hidden);
    assert_eq!(status_of(&entry), Some(json!({})));
    assert_eq!(headline.get_value(), None);
    assert!(!headline.is_invalid());
    assert_eq!(editor.error_message(), None);

    category.set_value(Some(json!("news")));
    assert_eq!(editor.visibility(), Visibility::Visible);
    assert_eq!(status_of(&entry), Some(json!({"headline": "Required."})));
}

#[tokio::test]
async fn hiding_clears_value_and_every_key_of_the_field() {
    let entry = news_entry();
    entry
        .memory_field("validationStatus")
        .expect("status")
        .set_value(Some(json!({
            "headline:duplicate": "taken",
            "category": "bad"
        })));
    let session = open(&entry);
    let editor = session
        .mount_field("headline", headline_config())
        .expect("headline exists");
    editor.edit("Breaking");
    assert_eq!(
        status_of(&entry),
        Some(json!({"headline:duplicate": "taken", "category": "bad"}))
    );

    entry
        .memory_field("category")
        .expect("category")
        .set_value(Some(json!("sports")));

    assert_eq!(status_of(&entry), Some(json!({"category": "bad"})));
    assert_eq!(entry.memory_field("headline").expect("headline").get_value(), None);
}

#[tokio::test]
async fn field_hidden_at_mount_never_reports_errors() {
    let entry = news_entry();
    entry
        .memory_field("category")
        .expect("category")
        .set_value(Some(json!("blog")));
    let session = open(&entry);
    let editor = session
        .mount_field("headline", headline_config())
        .expect("headline exists");

    assert!(!editor.is_visible());
    assert!(session.status().is_empty());
    assert!(!editor.edit("ignored"));
}

#[tokio::test]
async fn empty_choice_set_is_a_misconfiguration_not_a_validation_error() {
    let entry = Arc::new(
        MemoryEntry::new("entry-1", "article")
            .with_field(FieldDefinition::new("validationStatus", FieldType::Object), None)
            .with_field(
                FieldDefinition::new("size", FieldType::Symbol).with_predefined_values(Vec::<&str>::new()),
                None,
            ),
    );
    let session = open(&entry);
    let editor = session
        .mount_field("size", FieldInstanceConfig::default().required())
        .expect("size exists");

    assert_eq!(editor.kind(), EditorKind::Choice);
    assert_eq!(
        editor.misconfiguration(),
        Some(Misconfiguration::EmptyPredefinedValues {
            field_id: "size".into()
        })
    );
    assert!(!editor.select("large"));
    assert!(session.status().is_empty());
    assert_eq!(status_of(&entry), None);
    assert!(editor.report().misconfiguration.is_some());
}

#[tokio::test]
async fn numeric_choice_stores_parsed_numbers() {
    let entry = Arc::new(
        MemoryEntry::new("entry-1", "article")
            .with_field(FieldDefinition::new("validationStatus", FieldType::Object), None)
            .with_field(
                FieldDefinition::new("columns", FieldType::Integer).with_predefined_values([2, 3, 4]),
                None,
            ),
    );
    let session = open(&entry);
    let editor = session
        .mount_field("columns", FieldInstanceConfig::default().required())
        .expect("columns exists");
    assert_eq!(status_of(&entry), Some(json!({"columns": "Required."})));

    assert!(editor.select("3"));
    let columns = entry.memory_field("columns").expect("columns");
    assert_eq!(columns.get_value(), Some(json!(3)));
    assert!(session.status().is_empty());

    assert!(editor.select(""));
    assert_eq!(columns.get_value(), None);
    assert_eq!(session.status().get("columns"), Some(&json!("Required.")));
}

#[tokio::test]
async fn required_reference_uses_fallback_message_for_display() {
    let entry = Arc::new(
        MemoryEntry::new("entry-1", "article")
            .with_field(FieldDefinition::new("validationStatus", FieldType::Object), None)
            .with_field(FieldDefinition::new("author", FieldType::Link), None),
    );
    let session = open(&entry);
    let editor = session
        .mount_field("author", FieldInstanceConfig::default().required())
        .expect("author exists");
    assert_eq!(editor.kind(), EditorKind::Reference);
    assert_eq!(session.status().get("author"), Some(&json!("Required.")));

    entry
        .memory_field("author")
        .expect("author")
        .set_value(Some(json!({"sys": {"id": "A1", "type": "Link", "linkType": "Entry"}})));
    assert!(session.status().is_empty());
    assert_eq!(editor.error_message(), None);
}

#[tokio::test]
async fn view_all_text_is_derived_from_its_type_field() {
    let entry = Arc::new(
        MemoryEntry::new("entry-1", "igGridASection")
            .with_field(FieldDefinition::new("validationStatus", FieldType::Object), None)
            .with_field(FieldDefinition::new("viewAllType", FieldType::Symbol), Some(json!("auto")))
            .with_field(FieldDefinition::new("viewAllActionText", FieldType::Symbol), None),
    );
    let session = open(&entry);
    let editor = session
        .mount_field("viewAllActionText", FieldInstanceConfig::default())
        .expect("view all field exists");
    let text = entry.memory_field("viewAllActionText").expect("text");
    assert_eq!(editor.kind(), EditorKind::Text);
    assert_eq!(text.get_value(), Some(json!("View All")));

    let kind = entry.memory_field("viewAllType").expect("type");
    kind.set_value(Some(json!("view")));
    assert_eq!(text.get_value(), Some(json!("Go to")));

    kind.set_value(None);
    assert_eq!(text.get_value(), Some(json!("")));
    assert!(session.status().is_empty());

    kind.set_value(Some(json!("hidden")));
    assert_eq!(text.get_value(), Some(json!("")));
}

#[tokio::test]
async fn persisted_status_is_hydrated_and_only_rewritten_on_change() {
    let entry = news_entry();
    let status = entry.memory_field("validationStatus").expect("status");
    status.set_value(Some(json!({"headline": "Required.", "stale": 42})));
    let writes_before = status.write_count();

    let session = open(&entry);
    assert_eq!(session.status().get("headline"), Some(&json!("Required.")));
    // Non-string entries are dropped at hydration, which changes the projection.
    assert_eq!(status.write_count(), writes_before + 1);

    let editor = session
        .mount_field("headline", headline_config())
        .expect("headline exists");
    assert_eq!(status.write_count(), writes_before + 1);
    editor.edit("Now filled");
    assert_eq!(status.write_count(), writes_before + 2);
    editor.edit("Now filled again");
    assert_eq!(status.write_count(), writes_before + 2);
}

#[tokio::test]
async fn closing_keeps_persisted_status_and_detaches_listeners() {
    let entry = news_entry();
    let session = open(&entry);
    session
        .mount_field("headline", headline_config())
        .expect("headline exists");
    let category = entry.memory_field("category").expect("category");
    assert_eq!(category.listener_count(), 1);

    session.close();

    assert_eq!(category.listener_count(), 0);
    assert!(session.status().is_empty());
    assert_eq!(status_of(&entry), Some(json!({"headline": "Required."})));
    category.set_value(Some(json!("blog")));
    assert_eq!(status_of(&entry), Some(json!({"headline": "Required."})));
}

#[tokio::test]
async fn remounting_replaces_the_previous_editor() {
    let entry = news_entry();
    let session = open(&entry);
    session
        .mount_field("headline", headline_config())
        .expect("headline exists");
    session
        .mount_field("headline", headline_config())
        .expect("headline exists");

    let category = entry.memory_field("category").expect("category");
    assert_eq!(category.listener_count(), 1);
    assert_eq!(session.reports().len(), 1);
}

#[test]
fn opening_outside_a_runtime_is_an_error() {
    let entry = news_entry();
    let result = EntrySession::open(
        entry as Arc<dyn EntryApi>,
        Arc::new(MemoryQuery::default()) as Arc<dyn EntryQuery>,
        EngineOptions::default(),
    );
    assert!(matches!(result, Err(entryguard::EntryGuardError::NoRuntime)));
}
