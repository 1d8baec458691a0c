//! Controller tuning knobs.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Quiet period after the last keystroke before a query is sent.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);
/// How long a search secret may be reused.
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(3600);
/// Documentation offered alongside credential errors.
pub const DEFAULT_DOCS_URL: &str = "https://example.com/tablelink/docs/record-link-fields";

pub const DEBOUNCE_MS_ENV: &str = "TABLELINK_DEBOUNCE_MS";
pub const CREDENTIAL_TTL_SECS_ENV: &str = "TABLELINK_CREDENTIAL_TTL_SECS";
pub const DOCS_URL_ENV: &str = "TABLELINK_DOCS_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub debounce: Duration,
    pub credential_ttl: Duration,
    pub docs_url: String,
    /// Acquire credentials and run the initial query before the picker opens.
    pub eager_load: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            credential_ttl: DEFAULT_CREDENTIAL_TTL,
            docs_url: DEFAULT_DOCS_URL.to_string(),
            eager_load: false,
        }
    }
}

impl ControllerSettings {
    /// Defaults overridden by `TABLELINK_*` environment variables. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(millis) = read_u64(DEBOUNCE_MS_ENV) {
            settings.debounce = Duration::from_millis(millis);
        }
        if let Some(seconds) = read_u64(CREDENTIAL_TTL_SECS_ENV) {
            settings.credential_ttl = Duration::from_secs(seconds);
        }
        if let Ok(url) = env::var(DOCS_URL_ENV)
            && !url.trim().is_empty()
        {
            settings.docs_url = url.trim().to_string();
        }
        settings
    }

    pub fn with_eager_load(mut self, eager_load: bool) -> Self {
        self.eager_load = eager_load;
        self
    }
}

fn read_u64(name: &str) -> Option<u64> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(variable = name, value = %raw, error = %error, "ignoring invalid setting");
            None
        }
    }
}
