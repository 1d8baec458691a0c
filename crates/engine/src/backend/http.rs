//! HTTP implementations of the credential issuer and the search backend.

use anyhow::{Context, Result, bail};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, Method, StatusCode};
use serde_json::json;
use tablelink_api::{ServiceClient, search_base_url_from_env, search_http_client};
use tablelink_types::SearchResponse;
use tablelink_util::redact_sensitive;
use tracing::{debug, info};

use super::{AppIdentifierGrant, CredentialIssuer, SearchBackend, SearchRequest, SearchSecretGrant};

const APP_ID_PATH: &str = "/algoliaAppId";
const SEARCH_KEY_PATH: &str = "/algoliaSearchKey";
const APPLICATION_ID_HEADER: &str = "X-Algolia-Application-Id";
const API_KEY_HEADER: &str = "X-Algolia-API-Key";

/// Credential issuer backed by the tablelink credential service.
#[derive(Debug, Clone)]
pub struct HttpCredentialIssuer {
    client: ServiceClient,
}

impl HttpCredentialIssuer {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ServiceClient::new_from_env()?))
    }
}

#[async_trait::async_trait]
impl CredentialIssuer for HttpCredentialIssuer {
    async fn issue_app_identifier(&self) -> Result<AppIdentifierGrant> {
        let response = self
            .client
            .request(Method::GET, APP_ID_PATH)
            .send()
            .await
            .context("request app identifier")?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        // refusals come back as a JSON grant with `success: false`, sometimes with an error status
        match serde_json::from_str::<AppIdentifierGrant>(&text) {
            Ok(grant) => {
                debug!(status = status.as_u16(), success = grant.success, "app identifier reply");
                Ok(grant)
            }
            Err(_) if status.is_success() => bail!("unexpected app identifier reply: {}", redact_sensitive(&text)),
            Err(_) => Ok(AppIdentifierGrant::refused(status_message(status, &text))),
        }
    }

    async fn issue_search_secret(&self, collection: &str) -> Result<SearchSecretGrant> {
        let path = format!("{}/{}", SEARCH_KEY_PATH, utf8_percent_encode(collection, NON_ALPHANUMERIC));
        let response = self
            .client
            .request(Method::GET, &path)
            .send()
            .await
            .with_context(|| format!("request search key for '{collection}'"))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!(status_message(status, &text));
        }
        let grant: SearchSecretGrant = response.json().await.context("decode search key reply")?;
        info!(collection = %collection, "search key issued");
        Ok(grant)
    }
}

/// Search backend speaking the hosted index query API.
#[derive(Debug, Clone)]
pub struct HttpSearchBackend {
    http: Client,
    base_url: Option<String>,
}

impl HttpSearchBackend {
    /// Backend for an explicit base URL, or the per-application default host when `None`.
    pub fn new(http: Client, base_url: Option<String>) -> Self {
        Self { http, base_url }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(search_http_client()?, search_base_url_from_env()?))
    }

    fn endpoint(&self, request: &SearchRequest) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}-dsn.algolia.net", request.app_id.to_ascii_lowercase()));
        format!(
            "{}/1/indexes/{}/query",
            base,
            utf8_percent_encode(&request.collection, NON_ALPHANUMERIC)
        )
    }
}

#[async_trait::async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn query(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let url = self.endpoint(request);
        debug!(%url, collection = %request.collection, "search query");

        let response = self
            .http
            .post(url)
            .header(APPLICATION_ID_HEADER, &request.app_id)
            .header(API_KEY_HEADER, &request.secret)
            .json(&json!({ "query": request.text, "filters": request.filter }))
            .send()
            .await
            .with_context(|| format!("search '{}'", request.collection))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!(status_message(status, &text));
        }
        response.json().await.context("decode search response")
    }
}

fn status_message(status: StatusCode, body: &str) -> String {
    let body = redact_sensitive(body.trim());
    if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), body)
    }
}
