//! Confluence REST implementation of [`KnowledgeProvider`].

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use super::HttpJsonClient;
use crate::config::ConnectionConfig;
use crate::models::{KnowledgeDocument, Provenance};
use crate::providers::{FetchOptions, KnowledgeProvider, ProviderError, SearchOptions};

static PAGE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/pages/(\d+)").unwrap());

static BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(style|script)[^>]*>.*?</(style|script)>").unwrap());

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Storage {
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Body {
    storage: Storage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Links {
    webui: Option<String>,
    base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Content {
    id: String,
    title: Option<String>,
    body: Body,
    #[serde(rename = "_links")]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    results: Vec<Content>,
}

/// REST base for a Confluence domain (`…/wiki/rest/api`).
fn api_base(domain: &str) -> String {
    let trimmed = domain.trim().trim_end_matches('/');
    if trimmed.ends_with("/wiki") || trimmed.contains("/wiki/") {
        format!("{trimmed}/rest/api")
    } else {
        format!("{trimmed}/wiki/rest/api")
    }
}

/// Numeric page id from `/pages/<id>` or a `pageId` query parameter.
pub fn page_id(url: &str) -> Option<String> {
    if let Some(caps) = PAGE_ID_RE.captures(url) {
        return Some(caps[1].to_string());
    }
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "pageId")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
}

/// Strip markup from storage-format HTML and collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let without_blocks = BLOCK_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_blocks, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

fn escape_cql(query: &str) -> String {
    query.replace('"', "\\\"")
}

pub struct ConfluenceProvider {
    client: HttpJsonClient,
    domain: String,
}

impl ConfluenceProvider {
    pub fn new(connection: &ConnectionConfig) -> Result<Self, ProviderError> {
        let domain = connection.domain.trim().trim_end_matches('/').to_string();
        let api = ConnectionConfig {
            domain: api_base(&domain),
            credential: connection.credential.clone(),
        };
        Ok(Self {
            client: HttpJsonClient::new("Confluence", &api)?,
            domain,
        })
    }

    fn result_url(&self, item: &Content) -> String {
        match &item.links.webui {
            Some(webui) if !webui.is_empty() => {
                let base = item.links.base.as_deref().unwrap_or(&self.domain);
                format!("{}{webui}", base.trim_end_matches('/'))
            }
            _ => format!("{}/wiki/pages/{}", self.domain, item.id),
        }
    }
}

#[async_trait]
impl KnowledgeProvider for ConfluenceProvider {
    async fn fetch_by_urls(
        &self,
        urls: &[String],
        _options: FetchOptions,
    ) -> Result<Vec<KnowledgeDocument>, ProviderError> {
        let mut seen = HashSet::new();
        let mut pages = Vec::new();

        for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            if !seen.insert(url.to_string()) {
                continue;
            }
            let Some(id) = page_id(url) else {
                continue;
            };

            let result: Result<Content, _> = self
                .client
                .get_json(&format!("/content/{id}"), &[("expand", "body.storage".to_string())])
                .await;
            match result {
                Ok(content) => pages.push(KnowledgeDocument::new(
                    if content.id.is_empty() { id.clone() } else { content.id },
                    content.title.unwrap_or_else(|| format!("Confluence {id}")),
                    url,
                    html_to_text(&content.body.storage.value),
                    Provenance::ChangeLink,
                )),
                Err(e) => tracing::warn!(url, error = %e, "skipping unresolvable page"),
            }
        }
        Ok(pages)
    }

    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<KnowledgeDocument>, ProviderError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let response: SearchResponse = self
            .client
            .get_json(
                "/content/search",
                &[
                    ("cql", format!("text ~ \"{}\"", escape_cql(query))),
                    ("limit", options.top_k.max(1).to_string()),
                    ("expand", "body.storage".to_string()),
                ],
            )
            .await?;

        Ok(response
            .results
            .into_iter()
            .map(|item| {
                let url = self.result_url(&item);
                KnowledgeDocument::new(
                    item.id,
                    item.title.unwrap_or_else(|| "Confluence Page".to_string()),
                    url,
                    html_to_text(&item.body.storage.value),
                    Provenance::KeywordQuery,
                )
            })
            .collect())
    }
}
