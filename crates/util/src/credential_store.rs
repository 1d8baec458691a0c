//! Durable storage for search credentials.
//!
//! The store keeps two entries in a small JSON document: the application
//! identifier shared by every collection, and a map of per-collection search
//! secrets with the time they were requested. The file lives in the standard
//! configuration directory (`~/.config/tablelink/credentials.json` on most
//! platforms) unless `TABLELINK_CREDENTIALS_PATH` points elsewhere.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use tablelink_types::CredentialCacheEntry;
use thiserror::Error;
use tracing::{debug, warn};

use crate::expand_tilde;

/// Environment variable allowing callers to override the credential file path.
pub const CREDENTIALS_PATH_ENV: &str = "TABLELINK_CREDENTIALS_PATH";

/// Default filename for the JSON payload.
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Error surfaced when reading or writing the credential store fails.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("credential store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persisted credential entries.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPayload {
    /// Application identifier reused across all collections.
    #[serde(default, rename = "app-id")]
    pub app_id: Option<String>,
    /// Search secrets keyed by collection name.
    #[serde(default, rename = "search-keys")]
    pub search_keys: BTreeMap<String, CredentialCacheEntry>,
}

/// Thread-safe credential store backed by a JSON file.
#[derive(Debug, Default)]
pub struct CredentialStore {
    path: PathBuf,
    payload: Mutex<CredentialPayload>,
    persist_to_disk: bool,
}

impl CredentialStore {
    /// Open the store at the default location.
    pub fn new() -> Result<Self, CredentialStoreError> {
        Self::open(default_credentials_path())
    }

    /// Open the store at an explicit path, loading any existing payload.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CredentialStoreError> {
        let path = path.into();
        let payload = load_payload(&path)?;
        debug!(
            path = %path.display(),
            collection_count = payload.search_keys.len(),
            has_app_id = payload.app_id.is_some(),
            "credential store loaded"
        );
        Ok(Self {
            path,
            payload: Mutex::new(payload),
            persist_to_disk: true,
        })
    }

    /// Build an in-memory store used when the config directory cannot be accessed.
    pub fn ephemeral() -> Self {
        Self {
            path: PathBuf::new(),
            payload: Mutex::new(CredentialPayload::default()),
            persist_to_disk: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of everything currently stored.
    pub fn snapshot(&self) -> CredentialPayload {
        self.payload.lock().expect("credential store lock poisoned").clone()
    }

    pub fn app_id(&self) -> Option<String> {
        self.payload.lock().expect("credential store lock poisoned").app_id.clone()
    }

    pub fn set_app_id(&self, app_id: Option<String>) -> Result<(), CredentialStoreError> {
        let mut payload = self.payload.lock().expect("credential store lock poisoned");
        payload.app_id = app_id;
        self.save_locked(&payload)
    }

    pub fn search_key(&self, collection: &str) -> Option<CredentialCacheEntry> {
        self.payload
            .lock()
            .expect("credential store lock poisoned")
            .search_keys
            .get(collection)
            .cloned()
    }

    /// Replace the secret stored for `collection`.
    pub fn put_search_key(&self, collection: &str, entry: CredentialCacheEntry) -> Result<(), CredentialStoreError> {
        let mut payload = self.payload.lock().expect("credential store lock poisoned");
        payload.search_keys.insert(collection.to_string(), entry);
        self.save_locked(&payload)
    }

    /// Forget every stored credential.
    pub fn clear(&self) -> Result<(), CredentialStoreError> {
        let mut payload = self.payload.lock().expect("credential store lock poisoned");
        *payload = CredentialPayload::default();
        self.save_locked(&payload)
    }

    fn save_locked(&self, payload: &CredentialPayload) -> Result<(), CredentialStoreError> {
        if !self.persist_to_disk {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(payload)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

/// Resolve the credential file path from the environment or the config directory.
pub fn default_credentials_path() -> PathBuf {
    if let Ok(path) = env::var(CREDENTIALS_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tablelink")
        .join(CREDENTIALS_FILE_NAME)
}

fn load_payload(path: &Path) -> Result<CredentialPayload, CredentialStoreError> {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(payload) => Ok(payload),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse credential store; starting empty"
                );
                Ok(CredentialPayload::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(CredentialPayload::default()),
        Err(error) => Err(CredentialStoreError::Io(error)),
    }
}
