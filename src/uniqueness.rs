//! Debounced per-venture duplicate detection for a single-line field.
//!
//! Each draft change supersedes the previous check. After the quiet period
//! the external store is searched within the entry's query domain, results are
//! narrowed to exact matches in the same venture, and the outcome is written
//! to the field and the validation store. Only the most recently scheduled
//! check may write.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::{
    config::EngineOptions,
    domain::QueryDomain,
    host::{EntrySys, EntryQuery, FieldApi, FindManyQuery, FoundEntry, link_id},
    schedule::{Scheduler, Ticket, TicketProbe},
    store::ValidationStore,
    util::lock,
};

#[derive(Default)]
struct CheckerState {
    in_flight: Option<Ticket>,
    message: Option<String>,
}

struct CheckerInner {
    field: Arc<dyn FieldApi>,
    store: ValidationStore,
    query: Arc<dyn EntryQuery>,
    sys: EntrySys,
    options: Arc<EngineOptions>,
    state: Mutex<CheckerState>,
}

pub struct UniquenessChecker {
    inner: Arc<CheckerInner>,
    scheduler: Scheduler<String>,
}

impl UniquenessChecker {
    pub fn new(
        field: Arc<dyn FieldApi>,
        store: ValidationStore,
        query: Arc<dyn EntryQuery>,
        sys: EntrySys,
        options: Arc<EngineOptions>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(CheckerInner {
                field,
                store,
                query,
                sys,
                options,
                state: Mutex::new(CheckerState::default()),
            }),
            scheduler: Scheduler::new(runtime),
        }
    }

    /// Reacts to a new draft or venture. Empty input settles immediately;
    /// anything else is checked once the quiet period passes undisturbed.
    pub fn request(&self, draft: &str, venture: Option<&Value>) {
        let field_id = self.inner.field.id().to_string();
        self.scheduler.cancel(&field_id);
        lock(&self.inner.state).in_flight = None;

        let venture_id = venture.and_then(link_id).map(str::to_string);
        let Some(venture_id) = venture_id.filter(|_| !draft.is_empty()) else {
            debug!(%field_id, "no draft or venture; clearing duplicate state");
            self.inner.settle_empty();
            return;
        };

        let probe = self.scheduler.probe(field_id.clone());
        let inner = Arc::clone(&self.inner);
        let draft = draft.to_string();
        self.scheduler.schedule(
            field_id,
            self.inner.options.quiet_period,
            move |ticket| async move {
                inner.check(draft, venture_id, ticket, probe).await;
            },
        );
    }

    /// Drops any pending check without touching stored state.
    pub fn cancel(&self) {
        self.scheduler.cancel_all();
        lock(&self.inner.state).in_flight = None;
    }

    pub fn is_checking(&self) -> bool {
        lock(&self.inner.state).in_flight.is_some()
    }

    pub fn error_message(&self) -> Option<String> {
        lock(&self.inner.state).message.clone()
    }
}

/// Clears the in-flight marker however the check ends, including abort.
struct InFlight<'a> {
    state: &'a Mutex<CheckerState>,
    ticket: Ticket,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        if state.in_flight == Some(self.ticket) {
            state.in_flight = None;
        }
    }
}

impl CheckerInner {
    fn settle_empty(&self) {
        let field_id = self.field.id();
        self.field.set_value(None);
        self.field.set_invalid(false);
        lock(&self.state).message = None;
        self.store
            .clear_field_error(field_id, Some(QueryDomain::Primary.validation_type()));
        self.store
            .clear_field_error(field_id, Some(QueryDomain::Separate.validation_type()));
    }

    async fn check(&self, draft: String, venture_id: String, ticket: Ticket, probe: TicketProbe<String>) {
        let field_id = self.field.id();
        let domain = self.options.domains.classify(&self.sys.content_type_id);
        let query = FindManyQuery {
            content_type_in: self.options.domains.content_types(domain).to_vec(),
            exclude_id: self.sys.id.clone(),
            exclude_archived: true,
            text_query: draft.clone(),
        };
        debug!(field_id, ?domain, %draft, %venture_id, "running duplicate check");

        lock(&self.state).in_flight = Some(ticket);
        let _in_flight = InFlight {
            state: &self.state,
            ticket,
        };

        let found = match self.query.find_many(&query).await {
            Ok(found) => found,
            Err(err) => {
                warn!(field_id, %draft, "duplicate check failed: {err}");
                return;
            }
        };
        if !probe.is_current(ticket) {
            debug!(field_id, %draft, "discarding superseded duplicate check");
            return;
        }

        let matches = found
            .iter()
            .filter(|entry| self.is_duplicate(entry, &venture_id, &draft))
            .count();
        debug!(field_id, found = found.len(), matches, "duplicate check finished");

        self.field.set_value(Some(Value::String(draft)));
        let other = domain.other().validation_type();
        if matches > 0 {
            let message = domain.duplicate_message();
            self.field.set_invalid(true);
            lock(&self.state).message = Some(message.to_string());
            self.store
                .set_field_error(field_id, message, Some(domain.validation_type()));
            self.store.clear_field_error(field_id, Some(other));
        } else {
            self.field.set_invalid(false);
            lock(&self.state).message = None;
            self.store
                .clear_field_error(field_id, Some(domain.validation_type()));
            self.store.clear_field_error(field_id, Some(other));
        }
    }

    fn is_duplicate(&self, entry: &FoundEntry, venture_id: &str, draft: &str) -> bool {
        let locale = &self.options.default_locale;
        let same_venture = entry
            .localized(&self.options.venture_field_id, locale)
            .and_then(link_id)
            == Some(venture_id);
        let same_value = entry
            .localized(self.field.id(), locale)
            .and_then(Value::as_str)
            == Some(draft);
        same_venture && same_value
    }
}
