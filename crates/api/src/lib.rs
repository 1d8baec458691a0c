//! Transport for the services a picker session talks to.
//!
//! Two endpoints are involved. The credential service issues the search
//! application identifier and per-collection search secrets; it is reached
//! through [`ServiceClient`], which carries the optional bearer token and a
//! fixed `User-Agent`. The search backend is queried with a bare client from
//! [`search_http_client`] since every request carries its own secret.
//!
//! Base URLs come from `TABLELINK_SERVICE_URL` and `TABLELINK_SEARCH_URL` and
//! pass through [`validate_base_url`] before use.
//!
//! ```ignore
//! let client = tablelink_api::ServiceClient::new_from_env()?;
//! let grant = client.request(reqwest::Method::GET, "/algoliaAppId").send().await?;
//! ```

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::{Client, RequestBuilder, header};
use tracing::debug;
use url::Url;

/// Environment variable holding the credential service base URL.
pub const SERVICE_URL_ENV: &str = "TABLELINK_SERVICE_URL";
/// Environment variable holding the optional bearer token for the credential service.
pub const SERVICE_TOKEN_ENV: &str = "TABLELINK_SERVICE_TOKEN";
/// Environment variable overriding the search backend base URL.
pub const SEARCH_URL_ENV: &str = "TABLELINK_SEARCH_URL";

/// Hosts exempt from the https requirement.
const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credential service endpoint plus the client configured to reach it.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl ServiceClient {
    /// Construct a [`ServiceClient`] from `TABLELINK_SERVICE_URL` and `TABLELINK_SERVICE_TOKEN`.
    pub fn new_from_env() -> Result<Self> {
        let base_url = env::var(SERVICE_URL_ENV).with_context(|| format!("{SERVICE_URL_ENV} is not set"))?;
        let token = env::var(SERVICE_TOKEN_ENV).ok().filter(|token| !token.trim().is_empty());
        Self::new(base_url, token)
    }

    /// Construct a client for an explicit base URL with an optional bearer token.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let bearer = header::HeaderValue::from_str(&format!("Bearer {token}")).context("invalid service token")?;
            headers.insert(header::AUTHORIZATION, bearer);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build credential service client")?;

        Ok(Self {
            base_url,
            http,
            user_agent: default_user_agent(),
        })
    }

    /// Start a request for `path`, relative to the service base URL.
    pub fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let endpoint = format!("{}{path}", self.base_url);
        debug!(endpoint = %endpoint, %method, "credential service request");
        self.http.request(method, endpoint).header(header::USER_AGENT, self.user_agent.as_str())
    }
}

/// Build the HTTP client used for search backend queries.
///
/// Search requests authenticate per call with the collection's secret, so no
/// default authorization header is installed.
pub fn search_http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(default_user_agent())
        .build()
        .context("build search http client")
}

/// Search backend base URL from `TABLELINK_SEARCH_URL`, when configured and valid.
pub fn search_base_url_from_env() -> Result<Option<String>> {
    match env::var(SEARCH_URL_ENV) {
        Ok(raw) if !raw.trim().is_empty() => {
            let base = raw.trim().trim_end_matches('/').to_string();
            validate_base_url(&base)?;
            Ok(Some(base))
        }
        _ => Ok(None),
    }
}

fn default_user_agent() -> String {
    format!("tablelink/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS)
}

/// Check that `base` parses and uses https, unless it points at a loopback host.
pub fn validate_base_url(base: &str) -> Result<()> {
    let url = Url::parse(base).with_context(|| format!("'{base}' is not a valid URL"))?;
    let Some(host) = url.host_str() else {
        bail!("'{base}' has no host");
    };
    let loopback = LOOPBACK_HOSTS.iter().any(|candidate| candidate.eq_ignore_ascii_case(host));
    match url.scheme() {
        "https" => Ok(()),
        "http" if loopback => Ok(()),
        scheme if loopback => bail!("unsupported scheme '{scheme}' for '{base}'"),
        scheme => bail!("'{base}' must use https (got {scheme})"),
    }
}
