//! Search backend payloads and credential records.

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// Field carrying the record identifier in backend hits.
pub const RECORD_ID_FIELD: &str = "objectID";

/// Alternate identifier field accepted when [`RECORD_ID_FIELD`] is absent.
pub const FALLBACK_RECORD_ID_FIELD: &str = "recordId";

/// Backend-internal ranking metadata stripped from snapshots.
pub const RANKING_METADATA_FIELDS: &[&str] = &["_highlightResult", "_snippetResult", "_rankingInfo"];

/// Raw record returned by the search backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchHit(pub JsonMap<String, Value>);

impl SearchHit {
    pub fn new(fields: JsonMap<String, Value>) -> Self {
        Self(fields)
    }

    /// Record identifier, rendered as a string even when the backend returns a number.
    pub fn record_id(&self) -> Option<String> {
        let raw = self.0.get(RECORD_ID_FIELD).or_else(|| self.0.get(FALLBACK_RECORD_ID_FIELD))?;
        match raw {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    pub fn fields(&self) -> &JsonMap<String, Value> {
        &self.0
    }

    /// Fields of the hit minus ranking metadata.
    pub fn without_ranking_metadata(&self) -> JsonMap<String, Value> {
        self.0
            .iter()
            .filter(|(key, _)| !RANKING_METADATA_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Reply from the search backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
    /// Total number of matching records, when the backend reports it.
    #[serde(default, rename = "nbHits", alias = "totalCount")]
    pub total_count: Option<u64>,
}

/// A cached search secret for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCacheEntry {
    #[serde(alias = "key")]
    pub secret: String,
    /// Unix timestamp (seconds) at which the secret was requested.
    #[serde(rename = "requestedAt", alias = "issuedAtEpochSeconds", deserialize_with = "epoch_seconds")]
    pub issued_at_epoch_seconds: i64,
}

// Older stores wrote fractional seconds.
fn epoch_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = serde_json::Number::deserialize(deserializer)?;
    raw.as_i64()
        .or_else(|| raw.as_f64().map(|seconds| seconds.trunc() as i64))
        .ok_or_else(|| serde::de::Error::custom(format!("invalid epoch seconds: {raw}")))
}

impl CredentialCacheEntry {
    pub fn new(secret: impl Into<String>, issued_at_epoch_seconds: i64) -> Self {
        Self {
            secret: secret.into(),
            issued_at_epoch_seconds,
        }
    }

    /// Whether the entry may be reused at `now_epoch_seconds` given a time-to-live in seconds.
    pub fn is_fresh_at(&self, now_epoch_seconds: i64, ttl_seconds: i64) -> bool {
        !self.secret.is_empty() && now_epoch_seconds - self.issued_at_epoch_seconds < ttl_seconds
    }
}
