//! HTTP implementations of the upstream capabilities.
//!
//! All three share [`HttpJsonClient`]: a reqwest client bound to one base
//! URL with bearer-token auth and JSON in both directions.

pub mod confluence;
pub mod github;
pub mod jira;

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::ProviderError;
use crate::config::ConnectionConfig;

/// Upper bound on a single upstream request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Max characters of an error body carried into [`ProviderError::Status`].
const ERROR_BODY_PREVIEW: usize = 500;

/// JSON-over-HTTP client for one upstream system.
pub struct HttpJsonClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    provider: &'static str,
    headers: Vec<(&'static str, &'static str)>,
}

impl HttpJsonClient {
    pub fn new(provider: &'static str, connection: &ConnectionConfig) -> Result<Self, ProviderError> {
        let base_url = connection.domain.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ProviderError::NotConfigured(format!("{provider} domain is empty")));
        }
        Url::parse(&base_url).map_err(|e| {
            ProviderError::NotConfigured(format!("{provider} domain '{base_url}' is not a URL: {e}"))
        })?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("{}/{}", crate::constants::APP_NAME, crate::constants::VERSION))
            .build()
            .map_err(|e| ProviderError::Request {
                provider,
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url,
            token: connection
                .credential
                .token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            provider,
            headers: Vec::new(),
        })
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Resolve `path` against the base URL. Absolute URLs pass through.
    pub fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ProviderError> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        };
        let mut url = Url::parse(&raw).map_err(|e| ProviderError::Request {
            provider: self.provider,
            message: format!("invalid URL {raw}: {e}"),
        })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ProviderError> {
        tracing::debug!(provider = self.provider, %method, %url, "upstream request");

        let mut request = self.http.request(method, url);
        if !self.headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("accept")) {
            request = request.header("Accept", "application/json");
        }
        for (name, value) in &self.headers {
            request = request.header(*name, *value);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| ProviderError::Request {
            provider: self.provider,
            message: e.to_string(),
        })
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ProviderError::Status {
                provider: self.provider,
                status: status.as_u16(),
                body: body.trim().chars().take(ERROR_BODY_PREVIEW).collect(),
            });
        }
        response.json::<T>().await.map_err(|e| ProviderError::Decode {
            provider: self.provider,
            message: e.to_string(),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = self.url(path, query)?;
        let response = self.send::<()>(Method::GET, url, None).await?;
        self.decode(response).await
    }

    /// Like [`get_json`](Self::get_json) but maps HTTP 404 to `None`.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ProviderError> {
        let url = self.url(path, query)?;
        let response = self.send::<()>(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.decode(response).await.map(Some)
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let url = self.url(path, &[])?;
        let response = self.send(Method::POST, url, Some(body)).await?;
        self.decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;

    fn connection(domain: &str) -> ConnectionConfig {
        ConnectionConfig {
            domain: domain.to_string(),
            credential: Credential {
                token: Some("  ".to_string()),
            },
        }
    }

    #[test]
    fn rejects_empty_domain() {
        let err = HttpJsonClient::new("Jira", &connection(" ")).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn blank_token_is_dropped() {
        let client = HttpJsonClient::new("Jira", &connection("https://jira.example.com")).unwrap();
        assert!(client.token.is_none());
    }

    #[test]
    fn url_joins_paths_and_query() {
        let client =
            HttpJsonClient::new("GitHub", &connection("https://api.github.com/")).unwrap();
        let url = client
            .url("repos/a/b/pulls/1/files", &[("per_page", "100".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/a/b/pulls/1/files?per_page=100"
        );

        let absolute = client.url("https://other.example.com/x", &[]).unwrap();
        assert_eq!(absolute.host_str(), Some("other.example.com"));
    }

    #[test]
    fn query_values_are_encoded() {
        let client = HttpJsonClient::new("Confluence", &connection("https://wiki.example.com")).unwrap();
        let url = client
            .url("/rest/api/content/search", &[("cql", "text ~ \"retry policy\"".to_string())])
            .unwrap();
        assert!(url.as_str().contains("cql=text+%7E+%22retry+policy%22"));
    }
}
