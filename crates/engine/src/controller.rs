//! Single-field editing lifecycle.
//!
//! The [`Controller`] is a synchronous state machine: every inbound event is
//! handled to completion and answered with a list of [`Effect`]s for the
//! caller to perform (credential requests, searches, timer changes, user
//! notifications). Replies to those effects come back as events tagged with the
//! session generation they were issued under, which lets the controller ignore
//! anything that arrives after its session has ended.
//!
//! ```text
//! Idle -> CredentialPending -> Ready -> Searching <-> Selecting -> Committing -> Idle
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tablelink_types::{
    ChosenIdentifiers, FieldConfig, InputChangeReason, Notification, SearchResponse, SelectionMode, SelectionValue, WidgetEvent,
};
use tracing::{debug, info, warn};

use crate::backend::{AppIdentifierGrant, SearchRequest, SearchSecretGrant};
use crate::buffer::BufferedSelection;
use crate::clock::Clock;
use crate::credentials::CredentialCache;
use crate::dispatch::{IssuedQuery, QueryDispatcher, ReplyOutcome};
use crate::error::SelectionError;
use crate::filter;
use crate::reconcile::reconcile;
use crate::settings::ControllerSettings;
use crate::view::PickerView;

/// Lifecycle phase of the editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session is open.
    Idle,
    /// The picker is open and waiting for a usable credential.
    CredentialPending,
    /// Filter rendered and initial query issued (or credentials failed and the session is degraded).
    Ready,
    /// A debounce timer is armed.
    Searching,
    /// A pick is being reconciled.
    Selecting,
    /// The picker closed and the buffered value is being pushed to the host.
    Committing,
}

/// Receives committed selection values. This is the host's `onChange`.
pub trait SelectionSink: Send + Sync {
    fn on_change(&self, value: SelectionValue);
}

impl<F> SelectionSink for F
where
    F: Fn(SelectionValue) + Send + Sync,
{
    fn on_change(&self, value: SelectionValue) {
        self(value)
    }
}

/// What the host supplies for one field.
#[derive(Debug, Clone, Default)]
pub struct FieldBinding {
    pub config: FieldConfig,
    /// Row the field belongs to, used to render the filter template.
    pub row: Value,
    /// Value currently stored in the field.
    pub value: SelectionValue,
}

/// Inbound events: widget callbacks, timer expiry and collaborator replies.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Widget(WidgetEvent),
    DebounceElapsed,
    AppIdentifierIssued {
        generation: u64,
        result: Result<AppIdentifierGrant, String>,
    },
    SearchSecretIssued {
        generation: u64,
        collection: String,
        result: Result<SearchSecretGrant, String>,
    },
    SearchCompleted {
        generation: u64,
        sequence: u64,
        result: Result<SearchResponse, String>,
    },
}

/// Work the caller performs on behalf of the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    IssueAppIdentifier { generation: u64 },
    IssueSearchSecret { generation: u64, collection: String },
    Search { generation: u64, sequence: u64, request: SearchRequest },
    ArmDebounce { deadline: Instant },
    CancelDebounce,
    Notify(Notification),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CredentialState {
    Unknown,
    AwaitingAppId,
    AwaitingSecret,
    Ready { app_id: String, secret: String },
    Failed,
}

pub struct Controller {
    config: FieldConfig,
    row: Value,
    host_value: SelectionValue,
    cache: CredentialCache,
    sink: Arc<dyn SelectionSink>,
    settings: ControllerSettings,
    clock: Arc<dyn Clock>,
    dispatcher: QueryDispatcher,
    buffer: Option<BufferedSelection>,
    credentials: CredentialState,
    phase: Phase,
    generation: u64,
    input_text: String,
    torn_down: bool,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("collection", &self.config.collection)
            .field("phase", &self.phase)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Controller {
    pub fn new(
        binding: FieldBinding,
        cache: CredentialCache,
        sink: Arc<dyn SelectionSink>,
        settings: ControllerSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mode = binding.config.mode();
        Self {
            dispatcher: QueryDispatcher::new(settings.debounce),
            host_value: binding.value.normalized(mode),
            config: binding.config,
            row: binding.row,
            cache,
            sink,
            settings,
            clock,
            buffer: None,
            credentials: CredentialState::Unknown,
            phase: Phase::Idle,
            generation: 0,
            input_text: String::new(),
            torn_down: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pending debounce deadline, if a timer is armed.
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.dispatcher.deadline()
    }

    /// Whether search credentials failed for the current session.
    pub fn is_degraded(&self) -> bool {
        self.credentials == CredentialState::Failed
    }

    /// Working value: the buffer while a session is open, the host value otherwise.
    pub fn current_value(&self) -> &SelectionValue {
        self.buffer.as_ref().map(BufferedSelection::current).unwrap_or(&self.host_value)
    }

    pub fn view(&self) -> PickerView {
        PickerView::build(&self.config, self.dispatcher.results(), self.current_value(), &self.input_text)
    }

    /// Called once when the field is shown. With eager loading, starts fetching results before the picker opens.
    pub fn mount(&mut self) -> Vec<Effect> {
        if !self.settings.eager_load || self.torn_down {
            return Vec::new();
        }
        debug!(collection = %self.config.collection, "eager load");
        self.set_scope();
        self.ensure_credentials()
    }

    pub fn handle(&mut self, event: ControllerEvent) -> Vec<Effect> {
        match event {
            ControllerEvent::AppIdentifierIssued { generation, result } => self.on_app_identifier(generation, result),
            ControllerEvent::SearchSecretIssued {
                generation,
                collection,
                result,
            } => self.on_search_secret(generation, &collection, result),
            _ if self.torn_down => {
                debug!("event after teardown ignored");
                Vec::new()
            }
            ControllerEvent::Widget(WidgetEvent::Open) => self.open(),
            ControllerEvent::Widget(WidgetEvent::InputChanged { text, reason }) => self.input_changed(text, reason),
            ControllerEvent::Widget(WidgetEvent::Pick { chosen }) => self.pick(chosen),
            ControllerEvent::Widget(WidgetEvent::Close) => self.close(),
            ControllerEvent::DebounceElapsed => self.debounce_elapsed(),
            ControllerEvent::SearchCompleted {
                generation,
                sequence,
                result,
            } => self.on_search_completed(generation, sequence, result),
        }
    }

    /// The picker opened: seed the buffer, render the scope and acquire credentials.
    pub fn open(&mut self) -> Vec<Effect> {
        if self.torn_down || self.buffer.is_some() {
            return Vec::new();
        }
        self.buffer = Some(BufferedSelection::seed(self.host_value.clone(), self.config.mode()));
        self.input_text.clear();
        self.transition(Phase::CredentialPending);
        self.set_scope();
        self.ensure_credentials()
    }

    pub fn input_changed(&mut self, text: String, reason: InputChangeReason) -> Vec<Effect> {
        if self.buffer.is_none() {
            debug!("input change without open session ignored");
            return Vec::new();
        }
        self.input_text = text;
        if reason != InputChangeReason::Input {
            return Vec::new();
        }
        if !matches!(self.credentials, CredentialState::Ready { .. }) {
            return Vec::new();
        }

        let deadline = self.dispatcher.input(self.input_text.clone(), self.clock.instant());
        self.transition(Phase::Searching);
        vec![Effect::ArmDebounce { deadline }]
    }

    pub fn pick(&mut self, chosen: ChosenIdentifiers) -> Vec<Effect> {
        let Some(buffer) = self.buffer.as_mut() else {
            debug!("pick without open session ignored");
            return Vec::new();
        };
        self.phase = Phase::Selecting;

        let reconciled = reconcile(&self.config, &chosen, self.dispatcher.hits(), buffer.current());
        if let Err(error) = buffer.apply(reconciled.clone()) {
            warn!(error = %error, "pick rejected");
            return Vec::new();
        }
        if self.config.mode() == SelectionMode::Single {
            // the widget unmounts the session as part of closing, so single picks land now
            self.host_value = reconciled.clone();
            self.sink.on_change(reconciled);
        }

        let settled = if self.dispatcher.deadline().is_some() { Phase::Searching } else { Phase::Ready };
        self.transition(settled);
        Vec::new()
    }

    /// The picker closed: commit the buffered value and end the session.
    pub fn close(&mut self) -> Vec<Effect> {
        let Some(mut buffer) = self.buffer.take() else {
            return Vec::new();
        };
        self.transition(Phase::Committing);

        match buffer.commit() {
            Ok(value) if buffer.mode() == SelectionMode::Multiple => {
                info!(collection = %self.config.collection, item_count = value.len(), "selection committed");
                self.host_value = value.clone();
                self.sink.on_change(value);
            }
            Ok(_) => {}
            Err(error) => warn!(error = %error, "commit failed"),
        }

        let effects = self.end_session();
        self.transition(Phase::Idle);
        effects
    }

    /// Release the session without committing. The host must call this before dropping the controller.
    pub fn teardown(&mut self) -> Vec<Effect> {
        if self.torn_down {
            return Vec::new();
        }
        if let Some(mut buffer) = self.buffer.take() {
            buffer.discard();
        }
        let effects = self.end_session();
        self.torn_down = true;
        self.transition(Phase::Idle);
        effects
    }

    fn end_session(&mut self) -> Vec<Effect> {
        let armed = self.dispatcher.deadline().is_some();
        self.dispatcher.reset();
        self.generation += 1;
        self.input_text.clear();
        self.credentials = CredentialState::Unknown;
        if armed { vec![Effect::CancelDebounce] } else { Vec::new() }
    }

    fn set_scope(&mut self) {
        let filter = filter::render(&self.config.filter_template, &self.row);
        self.dispatcher.set_scope(self.config.collection.clone(), filter);
    }

    fn ensure_credentials(&mut self) -> Vec<Effect> {
        match self.credentials {
            CredentialState::AwaitingAppId | CredentialState::AwaitingSecret => Vec::new(),
            CredentialState::Ready { .. } => self.credentials_ready(),
            CredentialState::Unknown | CredentialState::Failed => self.advance_credentials(),
        }
    }

    /// Walk the app id then search secret chain, stopping at the first one that must be issued.
    fn advance_credentials(&mut self) -> Vec<Effect> {
        let Some(app_id) = self.cache.app_id() else {
            self.credentials = CredentialState::AwaitingAppId;
            return vec![Effect::IssueAppIdentifier {
                generation: self.generation,
            }];
        };
        let collection = self.config.collection.clone();
        let Some(secret) = self.cache.get_at(&collection, self.clock.epoch_seconds()) else {
            self.credentials = CredentialState::AwaitingSecret;
            return vec![Effect::IssueSearchSecret {
                generation: self.generation,
                collection,
            }];
        };
        self.credentials = CredentialState::Ready { app_id, secret };
        self.credentials_ready()
    }

    fn credentials_ready(&mut self) -> Vec<Effect> {
        let text = if self.buffer.is_some() {
            self.transition(Phase::Ready);
            self.input_text.clone()
        } else {
            String::new()
        };
        let had_deadline = self.dispatcher.deadline().is_some();
        let mut effects = if had_deadline { vec![Effect::CancelDebounce] } else { Vec::new() };
        if let Some(query) = self.dispatcher.issue_immediate(text) {
            effects.extend(self.search_effect(query));
        }
        effects
    }

    fn credential_failed(&mut self, generation: u64, error: SelectionError) -> Vec<Effect> {
        warn!(collection = %self.config.collection, error = %error, "search credentials unavailable");
        if generation != self.generation || self.torn_down {
            return Vec::new();
        }
        self.credentials = CredentialState::Failed;
        if self.buffer.is_some() {
            self.transition(Phase::Ready);
        }
        vec![Effect::Notify(Notification::error(error.to_string(), Some(self.settings.docs_url.clone())))]
    }

    fn on_app_identifier(&mut self, generation: u64, result: Result<AppIdentifierGrant, String>) -> Vec<Effect> {
        let grant = match result {
            Ok(grant) => grant,
            Err(message) => return self.credential_failed(generation, SelectionError::app_identifier_unavailable(&message)),
        };
        let Some(app_id) = grant.usable_app_id() else {
            let message = grant.message.clone().unwrap_or_default();
            return self.credential_failed(generation, SelectionError::app_identifier_unavailable(&message));
        };

        info!("app identifier issued");
        self.cache.set_app_id(app_id);
        if self.is_current(generation) && self.credentials == CredentialState::AwaitingAppId {
            return self.advance_credentials();
        }
        debug!(generation, "app identifier reply for ended session");
        Vec::new()
    }

    fn on_search_secret(&mut self, generation: u64, collection: &str, result: Result<SearchSecretGrant, String>) -> Vec<Effect> {
        let secret = match result {
            Ok(SearchSecretGrant { secret: Some(secret) }) if !secret.is_empty() => secret,
            Ok(_) => {
                return self.credential_failed(generation, SelectionError::search_secret_unavailable(collection, "no key in reply"));
            }
            Err(message) => return self.credential_failed(generation, SelectionError::search_secret_unavailable(collection, &message)),
        };

        // the cache outlives the session, so late replies still land there
        self.cache.put(collection, secret, self.clock.epoch_seconds());
        info!(collection = %collection, "search key cached");
        if self.is_current(generation) && self.credentials == CredentialState::AwaitingSecret {
            return self.advance_credentials();
        }
        debug!(generation, collection = %collection, "search key reply for ended session");
        Vec::new()
    }

    fn debounce_elapsed(&mut self) -> Vec<Effect> {
        let now = self.clock.instant();
        let Some(query) = self.dispatcher.poll_due(now) else {
            return match self.dispatcher.deadline() {
                Some(deadline) => vec![Effect::ArmDebounce { deadline }],
                None => {
                    if self.phase == Phase::Searching {
                        self.transition(Phase::Ready);
                    }
                    Vec::new()
                }
            };
        };
        if self.phase == Phase::Searching {
            self.transition(Phase::Ready);
        }
        self.search_effect(query)
    }

    fn on_search_completed(&mut self, generation: u64, sequence: u64, result: Result<SearchResponse, String>) -> Vec<Effect> {
        if !self.is_current(generation) {
            debug!(generation, sequence, "search reply for ended session discarded");
            return Vec::new();
        }
        match result {
            Ok(response) => {
                let hit_count = response.hits.len();
                if self.dispatcher.accept(sequence, response) == ReplyOutcome::Applied {
                    info!(collection = %self.config.collection, sequence, hit_count, "search results applied");
                }
                Vec::new()
            }
            Err(message) => {
                if self.dispatcher.reject(sequence) == ReplyOutcome::Stale {
                    return Vec::new();
                }
                let error = SelectionError::SearchFailed {
                    collection: self.config.collection.clone(),
                    message,
                };
                warn!(error = %error, sequence, "search failed");
                vec![Effect::Notify(Notification::warning(error.to_string()))]
            }
        }
    }

    fn search_effect(&self, query: IssuedQuery) -> Vec<Effect> {
        let CredentialState::Ready { app_id, secret } = &self.credentials else {
            debug!(sequence = query.sequence, "query without credentials dropped");
            return Vec::new();
        };
        vec![Effect::Search {
            generation: self.generation,
            sequence: query.sequence,
            request: SearchRequest {
                app_id: app_id.clone(),
                collection: query.scope.collection,
                filter: query.scope.filter,
                secret: secret.clone(),
                text: query.text,
            },
        }]
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.torn_down && generation == self.generation
    }

    fn transition(&mut self, next: Phase) {
        if self.phase != next {
            debug!(from = ?self.phase, to = ?next, "phase transition");
            self.phase = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;
    use tablelink_types::{NotificationSeverity, SearchHit};

    use super::*;
    use crate::clock::testing::ManualClock;

    #[derive(Default)]
    struct RecordingSink {
        values: Mutex<Vec<SelectionValue>>,
    }

    impl RecordingSink {
        fn values(&self) -> Vec<SelectionValue> {
            self.values.lock().expect("sink lock").clone()
        }
    }

    impl SelectionSink for RecordingSink {
        fn on_change(&self, value: SelectionValue) {
            self.values.lock().expect("sink lock").push(value);
        }
    }

    struct Harness {
        controller: Controller,
        sink: Arc<RecordingSink>,
        clock: Arc<ManualClock>,
        cache: CredentialCache,
    }

    const START: i64 = 1_700_000_000;

    fn harness(config: Value, cache: CredentialCache, eager_load: bool) -> Harness {
        let sink = Arc::new(RecordingSink::default());
        let clock = Arc::new(ManualClock::new(START));
        let binding = FieldBinding {
            config: serde_json::from_value(config).unwrap(),
            row: json!({"team": {"id": "T1"}}),
            value: SelectionValue::Empty,
        };
        let controller = Controller::new(
            binding,
            cache.clone(),
            sink.clone(),
            ControllerSettings::default().with_eager_load(eager_load),
            clock.clone(),
        );
        Harness {
            controller,
            sink,
            clock,
            cache,
        }
    }

    fn multi_config() -> Value {
        json!({"collection": "users", "filterTemplate": "team:{{team.id}}", "primaryDisplayKeys": ["name"]})
    }

    fn single_config() -> Value {
        json!({"collection": "users", "filterTemplate": "team:{{team.id}}", "primaryDisplayKeys": ["name"], "multiple": false})
    }

    fn warm_cache() -> CredentialCache {
        let cache = CredentialCache::new(Duration::from_secs(3600));
        cache.set_app_id("APP");
        cache.put("users", "cached-secret", START);
        cache
    }

    fn search_of(effects: &[Effect]) -> Option<(u64, u64, SearchRequest)> {
        effects.iter().find_map(|effect| match effect {
            Effect::Search {
                generation,
                sequence,
                request,
            } => Some((*generation, *sequence, request.clone())),
            _ => None,
        })
    }

    fn hits(ids: &[&str]) -> SearchResponse {
        SearchResponse {
            hits: ids
                .iter()
                .map(|id| serde_json::from_value::<SearchHit>(json!({"objectID": id, "name": format!("N{id}"), "age": 1})).unwrap())
                .collect(),
            total_count: Some(ids.len() as u64),
        }
    }

    fn widget(event: WidgetEvent) -> ControllerEvent {
        ControllerEvent::Widget(event)
    }

    fn many(ids: &[&str]) -> WidgetEvent {
        WidgetEvent::Pick {
            chosen: ChosenIdentifiers::Many(ids.iter().map(|id| id.to_string()).collect()),
        }
    }

    fn typed(text: &str) -> WidgetEvent {
        WidgetEvent::InputChanged {
            text: text.into(),
            reason: InputChangeReason::Input,
        }
    }

    fn count_secret_requests(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|effect| matches!(effect, Effect::IssueSearchSecret { .. }))
            .count()
    }

    #[test]
    fn open_acquires_credentials_then_issues_initial_query() {
        let mut h = harness(multi_config(), CredentialCache::new(Duration::from_secs(3600)), false);

        let effects = h.controller.handle(widget(WidgetEvent::Open));
        assert_eq!(effects, vec![Effect::IssueAppIdentifier { generation: 0 }]);
        assert_eq!(h.controller.phase(), Phase::CredentialPending);

        let effects = h.controller.handle(ControllerEvent::AppIdentifierIssued {
            generation: 0,
            result: Ok(AppIdentifierGrant::granted("APP")),
        });
        assert_eq!(
            effects,
            vec![Effect::IssueSearchSecret {
                generation: 0,
                collection: "users".into()
            }]
        );

        let effects = h.controller.handle(ControllerEvent::SearchSecretIssued {
            generation: 0,
            collection: "users".into(),
            result: Ok(SearchSecretGrant {
                secret: Some("fresh".into()),
            }),
        });
        let (_, _, request) = search_of(&effects).unwrap();
        assert_eq!(request.app_id, "APP");
        assert_eq!(request.secret, "fresh");
        assert_eq!(request.filter, "team:T1");
        assert_eq!(request.text, "");
        assert_eq!(h.controller.phase(), Phase::Ready);
        assert_eq!(h.cache.get_at("users", START).as_deref(), Some("fresh"));
    }

    #[test]
    fn cached_secret_is_reused_within_the_hour() {
        let mut h = harness(multi_config(), warm_cache(), false);

        let first = h.controller.handle(widget(WidgetEvent::Open));
        assert_eq!(count_secret_requests(&first), 0);
        assert_eq!(search_of(&first).unwrap().2.secret, "cached-secret");
        h.controller.handle(widget(WidgetEvent::Close));

        h.clock.advance(Duration::from_secs(1800));
        let second = h.controller.handle(widget(WidgetEvent::Open));
        assert_eq!(count_secret_requests(&second), 0);
        h.controller.handle(widget(WidgetEvent::Close));

        h.clock.advance(Duration::from_secs(1800));
        let third = h.controller.handle(widget(WidgetEvent::Open));
        assert_eq!(count_secret_requests(&third), 1);
    }

    #[test]
    fn keystroke_burst_issues_one_debounced_query() {
        let mut h = harness(multi_config(), warm_cache(), false);
        h.controller.handle(widget(WidgetEvent::Open));

        let mut last_deadline = None;
        for text in ["b", "bo", "bob"] {
            let effects = h.controller.handle(widget(typed(text)));
            match effects.as_slice() {
                [Effect::ArmDebounce { deadline }] => last_deadline = Some(*deadline),
                other => panic!("unexpected effects {other:?}"),
            }
            h.clock.advance(Duration::from_millis(300));
        }
        assert_eq!(h.controller.phase(), Phase::Searching);

        // timer fired early: re-arm at the pending deadline
        let early = h.controller.handle(ControllerEvent::DebounceElapsed);
        assert_eq!(early, vec![Effect::ArmDebounce { deadline: last_deadline.unwrap() }]);

        h.clock.advance(Duration::from_millis(700));
        let effects = h.controller.handle(ControllerEvent::DebounceElapsed);
        assert_eq!(search_of(&effects).unwrap().2.text, "bob");
        assert_eq!(h.controller.phase(), Phase::Ready);
    }

    #[test]
    fn widget_resets_do_not_schedule_queries() {
        let mut h = harness(multi_config(), warm_cache(), false);
        h.controller.handle(widget(WidgetEvent::Open));

        let effects = h.controller.handle(widget(WidgetEvent::InputChanged {
            text: String::new(),
            reason: InputChangeReason::Reset,
        }));
        assert!(effects.is_empty());
        assert_eq!(h.controller.debounce_deadline(), None);
    }

    #[test]
    fn single_select_pick_reaches_host_immediately() {
        let mut h = harness(single_config(), warm_cache(), false);
        let effects = h.controller.handle(widget(WidgetEvent::Open));
        let (generation, sequence, _) = search_of(&effects).unwrap();
        h.controller.handle(ControllerEvent::SearchCompleted {
            generation,
            sequence,
            result: Ok(hits(&["5", "6"])),
        });

        h.controller.handle(widget(WidgetEvent::Pick {
            chosen: ChosenIdentifiers::One(Some("5".into())),
        }));
        let values = h.sink.values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].items()[0].reference, "users/5");

        h.controller.handle(widget(WidgetEvent::Close));
        assert_eq!(h.sink.values().len(), 1);
        assert_eq!(h.controller.phase(), Phase::Idle);
    }

    #[test]
    fn multi_select_commits_once_on_close() {
        let mut h = harness(
            json!({"collection": "users", "primaryDisplayKeys": ["name"], "snapshotFieldAllowList": ["name"]}),
            warm_cache(),
            false,
        );
        let effects = h.controller.handle(widget(WidgetEvent::Open));
        let (generation, sequence, _) = search_of(&effects).unwrap();
        h.controller.handle(ControllerEvent::SearchCompleted {
            generation,
            sequence,
            result: Ok(hits(&["1", "2", "3"])),
        });

        h.controller.handle(widget(many(&["1"])));
        h.controller.handle(widget(many(&["1", "2"])));
        h.controller.handle(widget(many(&["3", "1", "2"])));
        assert!(h.sink.values().is_empty());
        assert_eq!(h.controller.view().summary, "3 selected");

        h.controller.handle(widget(WidgetEvent::Close));
        let values = h.sink.values();
        assert_eq!(values.len(), 1);
        let references: Vec<&str> = values[0].items().iter().map(|item| item.reference.as_str()).collect();
        assert_eq!(references, vec!["users/3", "users/1", "users/2"]);
        assert_eq!(values[0].items()[0].snapshot, serde_json::from_value::<serde_json::Map<String, Value>>(json!({"name": "N3"})).unwrap());
    }

    #[test]
    fn earlier_choice_survives_narrowed_search() {
        let mut h = harness(multi_config(), warm_cache(), false);
        let effects = h.controller.handle(widget(WidgetEvent::Open));
        let (generation, sequence, _) = search_of(&effects).unwrap();
        h.controller.handle(ControllerEvent::SearchCompleted {
            generation,
            sequence,
            result: Ok(hits(&["1", "2"])),
        });
        h.controller.handle(widget(many(&["1"])));

        h.controller.handle(widget(typed("zz")));
        h.clock.advance(Duration::from_secs(1));
        let effects = h.controller.handle(ControllerEvent::DebounceElapsed);
        let (generation, sequence, _) = search_of(&effects).unwrap();
        h.controller.handle(ControllerEvent::SearchCompleted {
            generation,
            sequence,
            result: Ok(hits(&["9"])),
        });

        h.controller.handle(widget(many(&["1", "9"])));
        let references: Vec<String> = h.controller.current_value().items().iter().map(|item| item.reference.clone()).collect();
        assert_eq!(references, vec!["users/1".to_string(), "users/9".to_string()]);
    }

    #[test]
    fn credential_failure_notifies_and_degrades() {
        let mut h = harness(multi_config(), CredentialCache::new(Duration::from_secs(3600)), false);
        h.controller.handle(widget(WidgetEvent::Open));

        let effects = h.controller.handle(ControllerEvent::AppIdentifierIssued {
            generation: 0,
            result: Ok(AppIdentifierGrant::refused("Algolia not setup")),
        });
        match effects.as_slice() {
            [Effect::Notify(notification)] => {
                assert_eq!(notification.severity, NotificationSeverity::Error);
                assert_eq!(notification.message, "Algolia not set up: Failed to get app ID");
                assert!(notification.docs_url.is_some());
            }
            other => panic!("unexpected effects {other:?}"),
        }
        assert!(h.controller.is_degraded());
        assert_eq!(h.controller.phase(), Phase::Ready);
        assert!(h.controller.handle(widget(typed("x"))).is_empty());
        assert_eq!(h.cache.app_id(), None);

        h.controller.handle(widget(WidgetEvent::Close));
        let retry = h.controller.handle(widget(WidgetEvent::Open));
        assert_eq!(retry, vec![Effect::IssueAppIdentifier { generation: 1 }]);
    }

    #[test]
    fn missing_secret_counts_as_failure() {
        let cache = CredentialCache::new(Duration::from_secs(3600));
        cache.set_app_id("APP");
        let mut h = harness(multi_config(), cache, false);
        h.controller.handle(widget(WidgetEvent::Open));

        let effects = h.controller.handle(ControllerEvent::SearchSecretIssued {
            generation: 0,
            collection: "users".into(),
            result: Ok(SearchSecretGrant { secret: None }),
        });
        assert!(matches!(effects.as_slice(), [Effect::Notify(_)]));
        assert_eq!(h.cache.get_at("users", START), None);
    }

    #[test]
    fn late_replies_after_close_only_touch_the_cache() {
        let cache = CredentialCache::new(Duration::from_secs(3600));
        cache.set_app_id("APP");
        let mut h = harness(multi_config(), cache, false);
        h.controller.handle(widget(WidgetEvent::Open));
        h.controller.handle(widget(WidgetEvent::Close));

        let effects = h.controller.handle(ControllerEvent::SearchSecretIssued {
            generation: 0,
            collection: "users".into(),
            result: Ok(SearchSecretGrant {
                secret: Some("late".into()),
            }),
        });
        assert!(effects.is_empty());
        assert_eq!(h.cache.get_at("users", START).as_deref(), Some("late"));
        assert_eq!(h.controller.phase(), Phase::Idle);

        let stale = h.controller.handle(ControllerEvent::SearchCompleted {
            generation: 0,
            sequence: 1,
            result: Ok(hits(&["1"])),
        });
        assert!(stale.is_empty());
        assert!(h.controller.view().options.is_empty());
    }

    #[test]
    fn search_failure_is_a_warning() {
        let mut h = harness(multi_config(), warm_cache(), false);
        let effects = h.controller.handle(widget(WidgetEvent::Open));
        let (generation, sequence, _) = search_of(&effects).unwrap();
        let effects = h.controller.handle(ControllerEvent::SearchCompleted {
            generation,
            sequence,
            result: Err("HTTP 500".into()),
        });
        match effects.as_slice() {
            [Effect::Notify(notification)] => assert_eq!(notification.severity, NotificationSeverity::Warning),
            other => panic!("unexpected effects {other:?}"),
        }
        assert_eq!(h.controller.phase(), Phase::Ready);
    }

    #[test]
    fn teardown_discards_without_commit() {
        let mut h = harness(multi_config(), warm_cache(), false);
        let effects = h.controller.handle(widget(WidgetEvent::Open));
        let (generation, sequence, _) = search_of(&effects).unwrap();
        h.controller.handle(ControllerEvent::SearchCompleted {
            generation,
            sequence,
            result: Ok(hits(&["1"])),
        });
        h.controller.handle(widget(many(&["1"])));
        h.controller.handle(widget(typed("a")));

        let effects = h.controller.teardown();
        assert_eq!(effects, vec![Effect::CancelDebounce]);
        assert!(h.sink.values().is_empty());
        assert!(h.controller.current_value().is_empty());
        assert!(h.controller.handle(widget(WidgetEvent::Close)).is_empty());
        assert!(h.controller.handle(widget(WidgetEvent::Open)).is_empty());
    }

    #[test]
    fn eager_load_queries_before_open() {
        let mut h = harness(multi_config(), warm_cache(), true);
        let effects = h.controller.mount();
        let (_, sequence, request) = search_of(&effects).unwrap();
        assert_eq!(request.text, "");
        assert_eq!(h.controller.phase(), Phase::Idle);

        h.controller.handle(ControllerEvent::SearchCompleted {
            generation: 0,
            sequence,
            result: Ok(hits(&["1", "2"])),
        });
        assert_eq!(h.controller.view().options.len(), 2);

        let effects = h.controller.handle(widget(WidgetEvent::Open));
        assert!(search_of(&effects).is_some());
    }

    #[test]
    fn text_typed_while_pending_is_used_for_initial_query() {
        let cache = CredentialCache::new(Duration::from_secs(3600));
        cache.set_app_id("APP");
        let mut h = harness(multi_config(), cache, false);
        h.controller.handle(widget(WidgetEvent::Open));
        assert!(h.controller.handle(widget(typed("ali"))).is_empty());

        let effects = h.controller.handle(ControllerEvent::SearchSecretIssued {
            generation: 0,
            collection: "users".into(),
            result: Ok(SearchSecretGrant {
                secret: Some("s".into()),
            }),
        });
        assert_eq!(search_of(&effects).unwrap().2.text, "ali");
    }
}
