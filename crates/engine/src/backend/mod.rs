//! Collaborators the controller talks to over the network.

mod http;

pub use http::{HttpCredentialIssuer, HttpSearchBackend};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tablelink_types::SearchResponse;

/// Reply of the credential service to an application identifier request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppIdentifierGrant {
    #[serde(default)]
    pub success: bool,
    #[serde(default, rename = "appId", alias = "app_id")]
    pub app_id: Option<String>,
    #[serde(default, alias = "errorMessage")]
    pub message: Option<String>,
}

impl AppIdentifierGrant {
    pub fn granted(app_id: impl Into<String>) -> Self {
        Self {
            success: true,
            app_id: Some(app_id.into()),
            message: None,
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            app_id: None,
            message: Some(message.into()),
        }
    }

    /// The identifier, when the grant succeeded and actually carries one.
    pub fn usable_app_id(&self) -> Option<&str> {
        self.app_id
            .as_deref()
            .filter(|app_id| self.success && !app_id.is_empty())
    }
}

/// Reply of the credential service to a search secret request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchSecretGrant {
    #[serde(default, alias = "key")]
    pub secret: Option<String>,
}

/// Fully scoped query handed to a [`SearchBackend`].
#[derive(Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub app_id: String,
    pub collection: String,
    pub filter: String,
    pub secret: String,
    pub text: String,
}

impl std::fmt::Debug for SearchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchRequest")
            .field("app_id", &self.app_id)
            .field("collection", &self.collection)
            .field("filter", &self.filter)
            .field("secret", &"<redacted>")
            .field("text", &self.text)
            .finish()
    }
}

/// Service that hands out the application identifier and per-collection search secrets.
#[async_trait::async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue_app_identifier(&self) -> Result<AppIdentifierGrant>;

    async fn issue_search_secret(&self, collection: &str) -> Result<SearchSecretGrant>;
}

/// Opaque full-text search backend.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    async fn query(&self, request: &SearchRequest) -> Result<SearchResponse>;
}
