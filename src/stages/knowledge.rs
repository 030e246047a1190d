//! Gather knowledge-base pages: strong links first, then optional searches.
//!
//! The orchestrator may absorb a failure of this stage, see
//! `resilience.continue_on_knowledge_base_error`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tokio::task::JoinSet;

use super::{Stage, StageContext, StageError, StepSummary};
use crate::models::knowledge::dedupe_documents;
use crate::models::{ChangeContext, IssueContext, KnowledgeContext, KnowledgeDocument, Provenance};
use crate::providers::{FetchOptions, ProviderError, SearchOptions};

/// Minimum number of search queries allowed regardless of `top_k`.
const MIN_QUERY_BUDGET: usize = 12;

/// Minimum page count requested per search.
const MIN_SEARCH_TOP_K: usize = 3;

static PAGE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(?:rest/api/content|pages)/\d+(?:/|$)").unwrap());

static ISSUE_QUERY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][A-Z0-9]+-\d+").unwrap());

pub struct FetchKnowledgeStage;

impl Stage for FetchKnowledgeStage {
    const ID: &'static str = "fetch-knowledge-context";
    const DESCRIPTION: &'static str = "Resolve linked knowledge-base pages and run searches";
}

impl StepSummary for KnowledgeContext {
    fn summary(&self) -> String {
        format!(
            "{} pages from {} strong links and {} queries",
            self.documents.len(),
            self.strong_linked_urls.len(),
            self.search_queries.len()
        )
    }
}

impl FetchKnowledgeStage {
    pub async fn run(
        &self,
        change: &ChangeContext,
        issues: &IssueContext,
        ctx: &StageContext,
    ) -> Result<KnowledgeContext, StageError> {
        let issue_links: Vec<&str> = issues
            .issues
            .iter()
            .flat_map(|i| i.links.iter().map(String::as_str))
            .collect();
        let candidates = unique_strings(
            issue_links
                .iter()
                .copied()
                .chain(change.signals.knowledge_links.iter().map(String::as_str))
                .filter(|u| is_knowledge_url(u)),
        );
        let strong: Vec<String> = candidates.into_iter().filter(|u| has_page_id(u)).collect();

        let fetch = FetchOptions {
            expand_depth: ctx.config.expand_depth,
        };
        let direct = ctx.providers.knowledge.fetch_by_urls(&strong, fetch).await?;
        let mut documents: Vec<KnowledgeDocument> = direct
            .into_iter()
            .map(|mut doc| {
                doc.source = if issue_links.contains(&doc.url.as_str()) {
                    Provenance::IssueLink
                } else {
                    Provenance::ChangeLink
                };
                doc
            })
            .collect();

        let search_queries = if ctx.config.providers.confluence.enable_expanded_search {
            build_queries(change, issues, ctx.config.top_k)
        } else {
            Vec::new()
        };
        if !search_queries.is_empty() {
            let options = SearchOptions {
                top_k: (ctx.config.top_k / 2).max(MIN_SEARCH_TOP_K),
                expand_depth: ctx.config.expand_depth,
            };
            documents.extend(self.search_all(&search_queries, options, ctx).await?);
        }

        Ok(KnowledgeContext {
            strong_linked_urls: strong,
            search_queries,
            documents: dedupe_documents(documents),
        })
    }

    /// Issue every query concurrently; the first failure fails the batch.
    ///
    /// Results come back in query order regardless of completion order.
    async fn search_all(
        &self,
        queries: &[String],
        options: SearchOptions,
        ctx: &StageContext,
    ) -> Result<Vec<KnowledgeDocument>, StageError> {
        let mut join_set = JoinSet::new();
        for (index, query) in queries.iter().enumerate() {
            let knowledge = ctx.providers.knowledge.clone();
            let query = query.clone();
            join_set.spawn(async move {
                let result = knowledge.search(&query, options).await;
                (index, query, result)
            });
        }

        let mut batches = Vec::with_capacity(queries.len());
        while let Some(joined) = join_set.join_next().await {
            let (index, query, result) = joined.map_err(|e| ProviderError::Request {
                provider: "knowledge base",
                message: format!("search task failed: {e}"),
            })?;
            let provenance = if ISSUE_QUERY_RE.is_match(&query.to_uppercase()) {
                Provenance::IssueQuery
            } else {
                Provenance::KeywordQuery
            };
            let pages = result?.into_iter().map(|mut doc| {
                doc.source = provenance;
                doc
            });
            batches.push((index, pages.collect::<Vec<_>>()));
        }

        batches.sort_by_key(|(index, _)| *index);
        Ok(batches.into_iter().flat_map(|(_, pages)| pages).collect())
    }
}

/// Requested keys, issue summaries, acceptance criteria and keywords,
/// deduplicated, at least three characters long, capped.
pub fn build_queries(change: &ChangeContext, issues: &IssueContext, top_k: usize) -> Vec<String> {
    let candidates = issues
        .requested_keys
        .iter()
        .chain(issues.issues.iter().map(|i| &i.summary))
        .chain(issues.issues.iter().flat_map(|i| &i.acceptance_criteria))
        .chain(&change.signals.keywords)
        .map(String::as_str);

    unique_strings(candidates)
        .into_iter()
        .filter(|q| q.chars().count() >= 3)
        .take(top_k.max(MIN_QUERY_BUDGET))
        .collect()
}

/// Whether `value` is an http(s) URL shaped like a knowledge-base page.
pub fn is_knowledge_url(value: &str) -> bool {
    let Ok(url) = url::Url::parse(value) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    if url.query_pairs().any(|(k, _)| k == "pageId") {
        return true;
    }
    let path = url.path().to_lowercase();
    path.contains("/wiki/")
        || path.ends_with("/wiki")
        || PAGE_PATH_RE.is_match(&path)
        || path.contains("/pages/")
        || path.contains("/spaces/")
        || path.contains("/display/")
}

/// Whether `value` names exactly one page through a numeric id.
pub fn has_page_id(value: &str) -> bool {
    let Ok(url) = url::Url::parse(value) else {
        return false;
    };
    if PAGE_PATH_RE.is_match(url.path()) {
        return true;
    }
    url.query_pairs()
        .find(|(k, _)| k == "pageId")
        .is_some_and(|(_, v)| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
}

fn unique_strings<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty() && seen.insert(*s))
        .map(str::to_string)
        .collect()
}
