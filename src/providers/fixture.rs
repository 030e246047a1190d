//! In-memory providers for tests and the demo dataset.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    ChangeProvider, FetchOptions, IssueProvider, KnowledgeProvider, ProviderError, SearchOptions,
};
use crate::models::change::PublishedComment;
use crate::models::{ChangeSourcePayload, Issue, KnowledgeDocument, SourceReference};

/// Serves canned pull requests keyed by `owner/repo#number` and records posts.
#[derive(Default)]
pub struct FixtureChangeProvider {
    changes: HashMap<String, ChangeSourcePayload>,
    published: Mutex<Vec<PublishedComment>>,
}

impl FixtureChangeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_change(mut self, reference: &SourceReference, payload: ChangeSourcePayload) -> Self {
        self.changes.insert(reference.to_string(), payload);
        self
    }

    /// Comments posted so far, oldest first.
    pub fn published(&self) -> Vec<PublishedComment> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChangeProvider for FixtureChangeProvider {
    async fn fetch_change(
        &self,
        reference: &SourceReference,
    ) -> Result<ChangeSourcePayload, ProviderError> {
        self.changes
            .get(&reference.to_string())
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("pull request {reference}")))
    }

    async fn publish_comment(
        &self,
        reference: &SourceReference,
        body: &str,
    ) -> Result<PublishedComment, ProviderError> {
        let mut published = self.published.lock().map_err(|_| ProviderError::Request {
            provider: "fixture",
            message: "publish log poisoned".to_string(),
        })?;
        let id = (published.len() + 1).to_string();
        let comment = PublishedComment {
            url: format!(
                "https://github.com/{}/{}/pull/{}#issuecomment-{id}",
                reference.owner, reference.repo, reference.number
            ),
            id,
            body: body.to_string(),
        };
        published.push(comment.clone());
        Ok(comment)
    }
}

/// Serves canned issues by key. Unknown keys are skipped.
#[derive(Default)]
pub struct FixtureIssueProvider {
    issues: BTreeMap<String, Issue>,
}

impl FixtureIssueProvider {
    pub fn new(issues: impl IntoIterator<Item = Issue>) -> Self {
        Self {
            issues: issues
                .into_iter()
                .map(|i| (i.key.to_uppercase(), i))
                .collect(),
        }
    }
}

#[async_trait]
impl IssueProvider for FixtureIssueProvider {
    async fn fetch_issues(
        &self,
        keys: &[String],
        _options: FetchOptions,
    ) -> Result<Vec<Issue>, ProviderError> {
        Ok(keys
            .iter()
            .filter_map(|k| self.issues.get(&k.to_uppercase()).cloned())
            .collect())
    }
}

/// Serves canned pages by URL and answers searches by substring match.
#[derive(Default)]
pub struct FixtureKnowledgeProvider {
    pages: Vec<KnowledgeDocument>,
    failure: Option<String>,
}

impl FixtureKnowledgeProvider {
    pub fn new(pages: impl IntoIterator<Item = KnowledgeDocument>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            failure: None,
        }
    }

    /// A knowledge base whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            pages: Vec::new(),
            failure: Some(message.into()),
        }
    }

    fn check(&self) -> Result<(), ProviderError> {
        match &self.failure {
            Some(message) => Err(ProviderError::Request {
                provider: "confluence",
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KnowledgeProvider for FixtureKnowledgeProvider {
    async fn fetch_by_urls(
        &self,
        urls: &[String],
        _options: FetchOptions,
    ) -> Result<Vec<KnowledgeDocument>, ProviderError> {
        self.check()?;
        Ok(urls
            .iter()
            .filter_map(|url| self.pages.iter().find(|p| &p.url == url).cloned())
            .collect())
    }

    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<KnowledgeDocument>, ProviderError> {
        self.check()?;
        let needle = query.to_lowercase();
        Ok(self
            .pages
            .iter()
            .filter(|p| {
                p.title.to_lowercase().contains(&needle) || p.content.to_lowercase().contains(&needle)
            })
            .take(options.top_k)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;

    fn reference() -> SourceReference {
        SourceReference::parse("https://github.com/acme/platform/pull/7").unwrap()
    }

    #[tokio::test]
    async fn change_fixture_serves_and_records() {
        let provider = FixtureChangeProvider::new()
            .with_change(&reference(), ChangeSourcePayload::default());
        assert!(provider.fetch_change(&reference()).await.is_ok());

        let other = SourceReference::parse("https://github.com/acme/other/pull/1").unwrap();
        let err = provider.fetch_change(&other).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));

        let comment = provider.publish_comment(&reference(), "hello").await.unwrap();
        assert_eq!(comment.id, "1");
        assert!(comment.url.ends_with("/pull/7#issuecomment-1"));
        assert_eq!(provider.published().len(), 1);
    }

    #[tokio::test]
    async fn issue_fixture_skips_unknown_keys() {
        let provider = FixtureIssueProvider::new([Issue {
            key: "PROJ-1".into(),
            summary: "One".into(),
            ..Issue::default()
        }]);
        let options = FetchOptions { expand_depth: 1 };
        let issues = provider
            .fetch_issues(&["PROJ-1".into(), "PROJ-9".into()], options)
            .await
            .unwrap();
        assert_eq!(issues.len(), 1);
    }

    #[tokio::test]
    async fn knowledge_fixture_search_respects_top_k() {
        let pages = (1..=4).map(|i| {
            KnowledgeDocument::new(
                i.to_string(),
                format!("Retry note {i}"),
                format!("https://wiki.example.com/pages/{i}"),
                "",
                Provenance::KeywordQuery,
            )
        });
        let provider = FixtureKnowledgeProvider::new(pages);
        let options = SearchOptions {
            top_k: 2,
            expand_depth: 1,
        };
        assert_eq!(provider.search("RETRY", options).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_knowledge_fixture() {
        let provider = FixtureKnowledgeProvider::failing("boom");
        let err = provider
            .fetch_by_urls(&[], FetchOptions { expand_depth: 1 })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
