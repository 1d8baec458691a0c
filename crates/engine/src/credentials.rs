//! Process-wide cache of search credentials.
//!
//! Secrets are keyed only by collection name: they authorize read access scoped
//! by filter, not by record, so every session on the same collection can share
//! one. An entry is reused while it is younger than the configured time-to-live
//! (one hour by default); after that callers must treat it as absent and fetch a
//! new one. When a [`CredentialStore`] is attached, every write goes through to
//! disk so the next process starts warm.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use tablelink_types::CredentialCacheEntry;
use tablelink_util::CredentialStore;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct CacheState {
    app_id: Option<String>,
    entries: HashMap<String, CredentialCacheEntry>,
}

/// Shared handle to the credential cache. Clones refer to the same entries.
#[derive(Clone)]
pub struct CredentialCache {
    state: Arc<Mutex<CacheState>>,
    time_to_live: Duration,
    store: Option<Arc<CredentialStore>>,
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCache")
            .field("time_to_live", &self.time_to_live)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl CredentialCache {
    /// In-memory cache with the given reuse window.
    pub fn new(time_to_live: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            time_to_live,
            store: None,
        }
    }

    /// Cache seeded from, and writing through to, a durable store.
    pub fn with_store(store: Arc<CredentialStore>, time_to_live: Duration) -> Self {
        let payload = store.snapshot();
        let state = CacheState {
            app_id: payload.app_id,
            entries: payload.search_keys.into_iter().collect(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            time_to_live,
            store: Some(store),
        }
    }

    /// Fresh secret for `collection` at the current wall-clock time.
    pub fn get(&self, collection: &str) -> Option<String> {
        self.get_at(collection, chrono::Utc::now().timestamp())
    }

    /// Fresh secret for `collection` as of `now_epoch_seconds`, or `None` when missing or expired.
    pub fn get_at(&self, collection: &str, now_epoch_seconds: i64) -> Option<String> {
        let entry = self.state.lock().expect("credential cache lock poisoned").entries.get(collection).cloned();
        let ttl_seconds = i64::try_from(self.time_to_live.as_secs()).unwrap_or(i64::MAX);
        match entry {
            Some(entry) if entry.is_fresh_at(now_epoch_seconds, ttl_seconds) => {
                debug!(
                    collection = %collection,
                    age_seconds = now_epoch_seconds - entry.issued_at_epoch_seconds,
                    "credential cache hit"
                );
                Some(entry.secret)
            }
            Some(entry) => {
                debug!(
                    collection = %collection,
                    age_seconds = now_epoch_seconds - entry.issued_at_epoch_seconds,
                    "credential cache entry expired"
                );
                None
            }
            None => {
                debug!(collection = %collection, "credential cache miss");
                None
            }
        }
    }

    /// Store a freshly issued secret, replacing any previous entry for the collection.
    pub fn put(&self, collection: &str, secret: impl Into<String>, issued_at_epoch_seconds: i64) {
        let entry = CredentialCacheEntry::new(secret, issued_at_epoch_seconds);
        self.state
            .lock()
            .expect("credential cache lock poisoned")
            .entries
            .insert(collection.to_string(), entry.clone());
        if let Some(store) = &self.store
            && let Err(error) = store.put_search_key(collection, entry)
        {
            warn!(collection = %collection, error = %error, "failed to persist search key");
        }
    }

    /// Application identifier shared by every collection. It does not expire.
    pub fn app_id(&self) -> Option<String> {
        self.state.lock().expect("credential cache lock poisoned").app_id.clone()
    }

    pub fn set_app_id(&self, app_id: impl Into<String>) {
        let app_id = app_id.into();
        self.state.lock().expect("credential cache lock poisoned").app_id = Some(app_id.clone());
        if let Some(store) = &self.store
            && let Err(error) = store.set_app_id(Some(app_id))
        {
            warn!(error = %error, "failed to persist app id");
        }
    }
}
