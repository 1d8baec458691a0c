//! Error taxonomy for the selection controller.

use thiserror::Error;

/// Failures the controller surfaces to the user.
///
/// None of these abort an editing session: they are converted into
/// notifications and the session continues in a degraded mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Credential issuance failed or was never attempted.
    #[error("{message}")]
    CredentialUnavailable { collection: Option<String>, message: String },
    /// The search backend rejected or failed a query.
    #[error("search in '{collection}' failed: {message}")]
    SearchFailed { collection: String, message: String },
    /// An operation was attempted on a session that has already ended.
    #[error("the editing session has already ended")]
    SessionClosed,
}

impl SelectionError {
    /// Error raised when the application identifier cannot be obtained.
    ///
    /// Service messages are normalized the way users have always seen them,
    /// e.g. `"Algolia not setup"` becomes `"Algolia not set up: Failed to get app ID"`.
    pub fn app_identifier_unavailable(service_message: &str) -> Self {
        let message = if service_message.trim().is_empty() {
            "Search service unavailable".to_string()
        } else {
            service_message.replace("not setup", "not set up")
        };
        SelectionError::CredentialUnavailable {
            collection: None,
            message: format!("{message}: Failed to get app ID"),
        }
    }

    pub fn search_secret_unavailable(collection: &str, reason: &str) -> Self {
        SelectionError::CredentialUnavailable {
            collection: Some(collection.to_string()),
            message: format!("Failed to get search key for '{collection}': {reason}"),
        }
    }
}
