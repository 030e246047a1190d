//! Synthetic upstreams for `--demo` runs.
//!
//! Every pull request number resolves: PR `n` references issue `PROJ-n`,
//! which links to wiki page `1000 + n`. Searches return two generated pages.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    ChangeProvider, FetchOptions, IssueProvider, KnowledgeProvider, ProviderError, ProviderSet,
    SearchOptions,
};
use crate::models::change::{
    ChangeMetadata, CheckConclusion, CheckRun, CheckStatus, Commit, PublishedComment,
    ReviewComment, SourceFile,
};
use crate::models::{ChangeSourcePayload, Issue, KnowledgeDocument, Provenance, SourceReference};

const WIKI_BASE: &str = "https://example.atlassian.net/wiki/spaces";

/// All three demo upstreams.
pub fn providers() -> ProviderSet {
    ProviderSet::new(
        Arc::new(DemoChangeProvider::default()),
        Arc::new(DemoIssueProvider),
        Arc::new(DemoKnowledgeProvider),
    )
}

fn demo_key(number: u64) -> String {
    format!("PROJ-{}", number.max(1))
}

fn page_url_for_key(key: &str) -> String {
    let digits: u64 = key
        .rsplit('-')
        .next()
        .and_then(|d| d.parse().ok())
        .unwrap_or(1);
    format!("{WIKI_BASE}/ENG/pages/{}", 1000 + digits)
}

fn slug(input: &str) -> String {
    input
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Default)]
pub struct DemoChangeProvider {
    published: Mutex<usize>,
}

#[async_trait]
impl ChangeProvider for DemoChangeProvider {
    async fn fetch_change(
        &self,
        reference: &SourceReference,
    ) -> Result<ChangeSourcePayload, ProviderError> {
        let n = reference.number;
        let key = demo_key(n);
        Ok(ChangeSourcePayload {
            metadata: ChangeMetadata {
                title: format!("{key} Demo review for {}/{}", reference.owner, reference.repo),
                body: format!(
                    "Demo payload for PR #{n}.\nConfluence: {WIKI_BASE}/ENG/pages/{}",
                    1000 + n
                ),
                author: "demo-user".to_string(),
                base_branch: "main".to_string(),
                head_branch: format!("feature/demo-{n}"),
                url: format!(
                    "https://github.com/{}/{}/pull/{n}",
                    reference.owner, reference.repo
                ),
            },
            files: vec![
                SourceFile {
                    path: "src/service/order_service.rs".to_string(),
                    patch: "+pub async fn process_order(order_id: &str) -> bool {\n\
                            +    // idempotency key not checked yet\n\
                            +    !order_id.is_empty()\n\
                            +}"
                    .to_string(),
                },
                SourceFile {
                    path: "tests/order_service.rs".to_string(),
                    patch: "+#[tokio::test]\n\
                            +async fn accepts_non_empty_id() {\n\
                            +    assert!(process_order(\"o-1\").await);\n\
                            +}"
                    .to_string(),
                },
            ],
            commits: vec![
                Commit {
                    sha: format!("demo-{n}-1"),
                    message: format!("{key} implement order processing path"),
                },
                Commit {
                    sha: format!("demo-{n}-2"),
                    message: format!("{key} add unit tests and update logging"),
                },
            ],
            checks: ["unit-tests", "lint"]
                .into_iter()
                .map(|name| CheckRun {
                    name: name.to_string(),
                    status: CheckStatus::Completed,
                    conclusion: Some(CheckConclusion::Success),
                })
                .collect(),
            comments: vec![ReviewComment {
                author: "review-bot".to_string(),
                body: "Please verify rollback safety and monitoring.".to_string(),
            }],
        })
    }

    async fn publish_comment(
        &self,
        reference: &SourceReference,
        body: &str,
    ) -> Result<PublishedComment, ProviderError> {
        let mut count = self.published.lock().map_err(|_| ProviderError::Request {
            provider: "demo",
            message: "publish counter poisoned".to_string(),
        })?;
        *count += 1;
        Ok(PublishedComment {
            id: format!("demo-comment-{count}"),
            url: format!(
                "https://github.com/{}/{}/pull/{}#issuecomment-{count}",
                reference.owner, reference.repo, reference.number
            ),
            body: body.to_string(),
        })
    }
}

pub struct DemoIssueProvider;

#[async_trait]
impl IssueProvider for DemoIssueProvider {
    async fn fetch_issues(
        &self,
        keys: &[String],
        _options: FetchOptions,
    ) -> Result<Vec<Issue>, ProviderError> {
        Ok(keys
            .iter()
            .map(|key| Issue {
                key: key.clone(),
                summary: format!("Demo issue summary for {key}"),
                description: format!("Demo description and acceptance notes for {key}."),
                acceptance_criteria: vec![
                    "Feature works for happy path".to_string(),
                    "Failure path returns controlled errors".to_string(),
                ],
                nfr: vec![
                    "No significant latency regression".to_string(),
                    "No memory leak".to_string(),
                ],
                risks: vec!["Idempotency handling may be incomplete".to_string()],
                testing_requirements: vec![
                    "Add unit tests".to_string(),
                    "Validate monitoring alerts".to_string(),
                ],
                links: vec![page_url_for_key(key)],
            })
            .collect())
    }
}

pub struct DemoKnowledgeProvider;

#[async_trait]
impl KnowledgeProvider for DemoKnowledgeProvider {
    async fn fetch_by_urls(
        &self,
        urls: &[String],
        _options: FetchOptions,
    ) -> Result<Vec<KnowledgeDocument>, ProviderError> {
        Ok(urls
            .iter()
            .enumerate()
            .map(|(i, url)| {
                KnowledgeDocument::new(
                    format!("demo-url-{}", i + 1),
                    format!("Design Doc {}", i + 1),
                    url.clone(),
                    format!("Scope, API contract, rollback and monitoring notes for {url}."),
                    Provenance::IssueLink,
                )
            })
            .collect())
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
        let slug = slug(query);
        let len = query.chars().count() as u64;
        let pages = vec![
            KnowledgeDocument::new(
                format!("demo-search-{slug}-1"),
                format!("{query} - Technical Notes"),
                format!("{WIKI_BASE}/ENG/pages/{}", 20000 + (len * 13).min(9999)),
                format!("Search result content related to {query}."),
                Provenance::KeywordQuery,
            ),
            KnowledgeDocument::new(
                format!("demo-search-{slug}-2"),
                format!("{query} - Monitoring Guide"),
                format!("{WIKI_BASE}/SRE/pages/{}", 30000 + (len * 17).min(9999)),
                format!("Runbook and dashboards for {query}."),
                Provenance::KeywordQuery,
            ),
        ];
        Ok(pages.into_iter().take(options.top_k).collect())
    }
}
