//! Debounced, sequence-guarded query dispatch.
//!
//! The dispatcher never performs I/O. It decides *when* a query should be
//! issued and *whether* a reply may be applied; the caller turns an
//! [`IssuedQuery`] into a backend request and feeds the reply back through
//! [`QueryDispatcher::accept`] or [`QueryDispatcher::reject`].

use std::time::{Duration, Instant};

use tablelink_types::{SearchHit, SearchResponse};
use tracing::debug;

/// The (collection, filter) pair every query of a session is constrained by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryScope {
    pub collection: String,
    pub filter: String,
}

/// A query the caller should send to the search backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedQuery {
    pub sequence: u64,
    pub scope: QueryScope,
    pub text: String,
}

/// Latest applied results plus the loading flag shown by the widget.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResults {
    pub hits: Vec<SearchHit>,
    pub total_count: Option<u64>,
    pub loading: bool,
}

/// Outcome of offering a reply to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Applied,
    Stale,
}

/// Single-slot timer: arming replaces whatever deadline was armed before.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceSlot {
    deadline: Option<Instant>,
}

impl DebounceSlot {
    pub fn arm(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarms and returns `true` once the deadline has passed.
    fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct QueryDispatcher {
    debounce: Duration,
    scope: Option<QueryScope>,
    slot: DebounceSlot,
    pending_text: Option<String>,
    last_issued_text: Option<String>,
    last_sequence: u64,
    latest_issued: u64,
    latest_applied: u64,
    results: QueryResults,
}

impl QueryDispatcher {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            scope: None,
            slot: DebounceSlot::default(),
            pending_text: None,
            last_issued_text: None,
            last_sequence: 0,
            latest_issued: 0,
            latest_applied: 0,
            results: QueryResults::default(),
        }
    }

    /// Scope used by every query issued from now on. In-flight requests keep the scope they were issued with.
    pub fn set_scope(&mut self, collection: impl Into<String>, filter: impl Into<String>) {
        let scope = QueryScope {
            collection: collection.into(),
            filter: filter.into(),
        };
        debug!(collection = %scope.collection, filter = %scope.filter, "query scope set");
        self.scope = Some(scope);
    }

    /// Record a keystroke and (re)arm the debounce slot. Returns the new deadline.
    pub fn input(&mut self, text: impl Into<String>, now: Instant) -> Instant {
        let deadline = now + self.debounce;
        self.pending_text = Some(text.into());
        self.slot.arm(deadline);
        deadline
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.slot.deadline()
    }

    /// Issue the pending query once the quiet period has elapsed.
    ///
    /// Returns `None` while the slot is still armed, when nothing is pending, or when
    /// the final text of the burst equals the text that was last sent.
    pub fn poll_due(&mut self, now: Instant) -> Option<IssuedQuery> {
        if !self.slot.take_due(now) {
            return None;
        }
        let text = self.pending_text.take()?;
        if self.last_issued_text.as_deref() == Some(text.as_str()) {
            debug!(text = %text, "debounced text unchanged; query skipped");
            return None;
        }
        self.issue(text)
    }

    /// Issue a query right away, bypassing and cancelling any armed debounce.
    pub fn issue_immediate(&mut self, text: impl Into<String>) -> Option<IssuedQuery> {
        self.slot.cancel();
        self.pending_text = None;
        self.issue(text.into())
    }

    fn issue(&mut self, text: String) -> Option<IssuedQuery> {
        let Some(scope) = self.scope.clone() else {
            debug!("no query scope yet; query dropped");
            return None;
        };
        self.last_sequence += 1;
        let sequence = self.last_sequence;
        self.latest_issued = sequence;
        self.last_issued_text = Some(text.clone());
        self.results.loading = true;
        debug!(sequence, collection = %scope.collection, "query issued");
        Some(IssuedQuery { sequence, scope, text })
    }

    /// Apply a reply unless a reply to a later query has already been applied.
    pub fn accept(&mut self, sequence: u64, response: SearchResponse) -> ReplyOutcome {
        if !self.claim(sequence) {
            return ReplyOutcome::Stale;
        }
        self.results.total_count = response.total_count.or(Some(response.hits.len() as u64));
        self.results.hits = response.hits;
        ReplyOutcome::Applied
    }

    /// Record a failed query. Results are cleared unless the failure is stale.
    pub fn reject(&mut self, sequence: u64) -> ReplyOutcome {
        if !self.claim(sequence) {
            return ReplyOutcome::Stale;
        }
        self.results.hits.clear();
        self.results.total_count = None;
        if sequence == self.latest_issued {
            // nothing on screen reflects this text any more, so the same text must be sendable again
            self.last_issued_text = None;
        }
        ReplyOutcome::Applied
    }

    fn claim(&mut self, sequence: u64) -> bool {
        if sequence <= self.latest_applied || sequence > self.latest_issued {
            debug!(sequence, latest_applied = self.latest_applied, "stale search reply discarded");
            return false;
        }
        self.latest_applied = sequence;
        self.results.loading = self.latest_applied < self.latest_issued;
        true
    }

    pub fn results(&self) -> &QueryResults {
        &self.results
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.results.hits
    }

    /// Forget the session: disarm the timer, drop results, keep the sequence counter monotonic.
    pub fn reset(&mut self) {
        self.slot.cancel();
        self.pending_text = None;
        self.last_issued_text = None;
        self.scope = None;
        self.latest_applied = self.latest_issued;
        self.results = QueryResults::default();
    }
}
