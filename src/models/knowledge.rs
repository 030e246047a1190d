//! Knowledge-base types: documents, their provenance, and the fetched context.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a knowledge document was discovered.
///
/// Variants are declared from strongest to weakest signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Linked directly from a resolved issue.
    IssueLink,
    /// Linked directly from the pull request text.
    ChangeLink,
    /// Returned by a search for an issue key.
    IssueQuery,
    /// Returned by a search for a keyword or requirement text.
    KeywordQuery,
}

impl Provenance {
    /// Fixed ordinal boost used by relevance ranking.
    pub fn boost(self) -> u32 {
        match self {
            Provenance::IssueLink => 45,
            Provenance::ChangeLink => 38,
            Provenance::IssueQuery => 25,
            Provenance::KeywordQuery => 18,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::IssueLink => write!(f, "issue-link"),
            Provenance::ChangeLink => write!(f, "change-link"),
            Provenance::IssueQuery => write!(f, "issue-query"),
            Provenance::KeywordQuery => write!(f, "keyword-query"),
        }
    }
}

/// One knowledge-base page.
///
/// `relevance_score` and the matched sets are only populated by ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDocument {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    pub source: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<u32>,
    #[serde(default)]
    pub matched_issue_keys: Vec<String>,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
}

impl KnowledgeDocument {
    /// Build an unranked document.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
        source: Provenance,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            content: content.into(),
            source,
            relevance_score: None,
            matched_issue_keys: Vec::new(),
            matched_keywords: Vec::new(),
        }
    }

    /// Identity used for deduplication: the URL, or the id when the URL is empty.
    pub fn dedup_key(&self) -> &str {
        if self.url.is_empty() { &self.id } else { &self.url }
    }
}

/// Keep the first document for each dedup key, preserving order.
pub fn dedupe_documents(documents: Vec<KnowledgeDocument>) -> Vec<KnowledgeDocument> {
    let mut seen = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| {
            let key = doc.dedup_key();
            !key.is_empty() && seen.insert(key.to_string())
        })
        .collect()
}

/// Strong links considered, queries issued, and the resulting documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeContext {
    pub strong_linked_urls: Vec<String>,
    pub search_queries: Vec<String>,
    pub documents: Vec<KnowledgeDocument>,
}
