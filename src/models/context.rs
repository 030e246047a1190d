//! The aggregated review record and the pipeline's input and output envelopes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ReviewProfile;
use super::change::{ChangeContext, SourceReference};
use super::issue::IssueContext;
use super::knowledge::KnowledgeContext;
use super::score::ScoreResult;

/// Immutable input to one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Pull request URL.
    pub locator: String,
    #[serde(default)]
    pub profile: Option<ReviewProfile>,
    /// Explicit keywords, placed ahead of text-derived ones.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ReviewRequest {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            ..Self::default()
        }
    }

    pub fn with_profile(mut self, profile: ReviewProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

/// Change, issue and knowledge context fused into one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewContext {
    pub source: SourceReference,
    pub profile: ReviewProfile,
    pub change: ChangeContext,
    pub issues: IssueContext,
    pub knowledge: KnowledgeContext,
    /// Every requested issue key maps to the URLs of documents matched to it.
    pub traceability: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftComment {
    pub markdown: String,
    pub used_generator: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub run_id: String,
    pub duration_ms: u64,
    pub used_generator: bool,
}

/// Complete result of a successful run. Warnings list absorbed failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub context: ReviewContext,
    pub score: ScoreResult,
    pub draft: DraftComment,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub meta: RunMetadata,
}

/// An edited narrative the caller wants posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub locator: String,
    pub body: String,
    /// Whether the human explicitly confirmed the post.
    pub confirmed: bool,
}
