//! Change-tracking types: the pull request locator, the raw upstream
//! payload, and the normalized change context.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing a pull request locator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("PR link is not a valid URL: {0}")]
    NotAUrl(String),

    #[error("PR link must match https://{{host}}/{{owner}}/{{repo}}/pull/{{number}}: {0}")]
    UnrecognizedShape(String),

    #[error("PR number must be a positive integer: {0}")]
    InvalidNumber(String),
}

static PULL_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/([^/]+)/([^/]+)/pull/(\d+)/?$").unwrap());

/// Owner / repository / change-number triple identifying one pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl SourceReference {
    /// Parse a pull request URL such as `https://github.com/acme/platform/pull/42`.
    pub fn parse(locator: &str) -> Result<Self, LocatorError> {
        let trimmed = locator.trim();
        let url = url::Url::parse(trimmed).map_err(|_| LocatorError::NotAUrl(trimmed.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LocatorError::NotAUrl(trimmed.to_string()));
        }

        let caps = PULL_PATH_RE
            .captures(url.path())
            .ok_or_else(|| LocatorError::UnrecognizedShape(trimmed.to_string()))?;

        let number: u64 = caps[3]
            .parse()
            .map_err(|_| LocatorError::InvalidNumber(caps[3].to_string()))?;
        if number == 0 {
            return Err(LocatorError::InvalidNumber(caps[3].to_string()));
        }

        Ok(Self {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            number,
        })
    }
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Pull request metadata as reported by the change-tracking system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMetadata {
    pub title: String,
    pub body: String,
    pub author: String,
    pub base_branch: String,
    pub head_branch: String,
    pub url: String,
}

/// A changed file exactly as the upstream returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    #[serde(default)]
    pub patch: String,
}

/// A changed file after truncation to the configured character budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub patch: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
}

/// Lifecycle state of a CI check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
}

/// Outcome of a completed CI check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Cancelled,
    TimedOut,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub author: String,
    pub body: String,
}

/// Everything the change-tracking capability returns for one pull request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSourcePayload {
    pub metadata: ChangeMetadata,
    pub files: Vec<SourceFile>,
    pub commits: Vec<Commit>,
    pub checks: Vec<CheckRun>,
    pub comments: Vec<ReviewComment>,
}

/// Signals derived from the change's free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSignals {
    /// Knowledge-base-looking URLs found in title, body and comments.
    pub knowledge_links: Vec<String>,
    /// Explicit keywords first, then tokens from free text (max 60).
    pub keywords: Vec<String>,
}

/// Normalized, size-bounded change context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeContext {
    pub metadata: ChangeMetadata,
    pub files: Vec<ChangedFile>,
    pub commits: Vec<Commit>,
    pub checks: Vec<CheckRun>,
    pub comments: Vec<ReviewComment>,
    pub signals: ChangeSignals,
}

impl ChangeContext {
    /// Whether any completed check run concluded with a failure.
    pub fn has_failing_checks(&self) -> bool {
        self.checks.iter().any(|c| {
            matches!(
                c.conclusion,
                Some(CheckConclusion::Failure) | Some(CheckConclusion::TimedOut)
            )
        })
    }
}

/// A comment created on the change-tracking system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedComment {
    pub id: String,
    pub url: String,
    pub body: String,
}

/// Result of the publish gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub published: bool,
    pub used_edited_body: bool,
    pub comment: PublishedComment,
}
