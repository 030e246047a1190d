//! Upstream capability contracts and their implementations.
//!
//! The pipeline only talks to the change-tracking system, the issue
//! tracker and the knowledge base through the traits defined here.
//! [`fixture`] holds in-memory variants, [`rest`] the HTTP ones, and
//! [`ProviderSet::from_config`] picks between them.

pub mod demo;
pub mod fixture;
pub mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::models::change::PublishedComment;
use crate::models::{ChangeSourcePayload, Issue, KnowledgeDocument, SourceReference};

/// Errors from an upstream provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to decode {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// Options forwarded to graph-expanding fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub expand_depth: u32,
}

/// Options forwarded to knowledge-base searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub top_k: usize,
    pub expand_depth: u32,
}

/// Change-tracking capability (pull requests).
#[async_trait]
pub trait ChangeProvider: Send + Sync {
    async fn fetch_change(
        &self,
        reference: &SourceReference,
    ) -> Result<ChangeSourcePayload, ProviderError>;

    async fn publish_comment(
        &self,
        reference: &SourceReference,
        body: &str,
    ) -> Result<PublishedComment, ProviderError>;
}

/// Issue-tracker capability.
///
/// Implementations may follow parent, subtask and link edges up to
/// `expand_depth`, so the result can hold more issues than were asked for.
#[async_trait]
pub trait IssueProvider: Send + Sync {
    async fn fetch_issues(
        &self,
        keys: &[String],
        options: FetchOptions,
    ) -> Result<Vec<Issue>, ProviderError>;
}

/// Knowledge-base capability.
#[async_trait]
pub trait KnowledgeProvider: Send + Sync {
    /// Resolve documents by URL. URLs that resolve to nothing are skipped.
    async fn fetch_by_urls(
        &self,
        urls: &[String],
        options: FetchOptions,
    ) -> Result<Vec<KnowledgeDocument>, ProviderError>;

    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<KnowledgeDocument>, ProviderError>;
}

/// Stand-in knowledge base that fails every call.
///
/// Used when no knowledge-base domain is configured so the orchestrator's
/// degradation policy decides what happens.
pub struct UnconfiguredKnowledge;

#[async_trait]
impl KnowledgeProvider for UnconfiguredKnowledge {
    async fn fetch_by_urls(
        &self,
        _urls: &[String],
        _options: FetchOptions,
    ) -> Result<Vec<KnowledgeDocument>, ProviderError> {
        Err(ProviderError::NotConfigured(
            "providers.confluence.domain is not set".to_string(),
        ))
    }

    async fn search(
        &self,
        _query: &str,
        _options: SearchOptions,
    ) -> Result<Vec<KnowledgeDocument>, ProviderError> {
        Err(ProviderError::NotConfigured(
            "providers.confluence.domain is not set".to_string(),
        ))
    }
}

/// The three upstream handles a run needs.
#[derive(Clone)]
pub struct ProviderSet {
    pub change: Arc<dyn ChangeProvider>,
    pub issues: Arc<dyn IssueProvider>,
    pub knowledge: Arc<dyn KnowledgeProvider>,
}

impl ProviderSet {
    pub fn new(
        change: Arc<dyn ChangeProvider>,
        issues: Arc<dyn IssueProvider>,
        knowledge: Arc<dyn KnowledgeProvider>,
    ) -> Self {
        Self {
            change,
            issues,
            knowledge,
        }
    }

    /// Select implementations from configuration.
    ///
    /// `demo` swaps every upstream for the bundled in-memory dataset.
    pub fn from_config(config: &Config, demo: bool) -> Result<Self, ProviderError> {
        if demo {
            return Ok(demo::providers());
        }

        let change = rest::github::GitHubProvider::new(&config.providers.github)?;

        if !config.providers.jira.is_configured() {
            return Err(ProviderError::NotConfigured(
                "providers.jira.domain is not set".to_string(),
            ));
        }
        let issues = rest::jira::JiraProvider::new(&config.providers.jira)?;

        let confluence = config.providers.confluence.connection();
        let knowledge: Arc<dyn KnowledgeProvider> = if confluence.is_configured() {
            Arc::new(rest::confluence::ConfluenceProvider::new(&confluence)?)
        } else {
            tracing::warn!("no knowledge base configured; its stage will degrade");
            Arc::new(UnconfiguredKnowledge)
        };

        Ok(Self::new(Arc::new(change), Arc::new(issues), knowledge))
    }
}
