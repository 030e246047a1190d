//! GitHub REST implementation of [`ChangeProvider`].

use async_trait::async_trait;
use serde::Deserialize;

use super::HttpJsonClient;
use crate::config::ConnectionConfig;
use crate::models::change::{
    ChangeMetadata, CheckConclusion, CheckRun, CheckStatus, Commit, PublishedComment,
    ReviewComment, SourceFile,
};
use crate::models::{ChangeSourcePayload, SourceReference};
use crate::providers::{ChangeProvider, ProviderError};

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhUser {
    login: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhRef {
    #[serde(rename = "ref")]
    name: Option<String>,
    sha: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhPull {
    title: Option<String>,
    body: Option<String>,
    user: GhUser,
    base: GhRef,
    head: GhRef,
    html_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhFile {
    filename: Option<String>,
    patch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhCommitDetail {
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhCommit {
    sha: Option<String>,
    commit: GhCommitDetail,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhComment {
    id: Option<serde_json::Value>,
    user: GhUser,
    body: Option<String>,
    html_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhCheckRun {
    name: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhCheckRuns {
    check_runs: Vec<GhCheckRun>,
}

fn map_status(raw: Option<&str>) -> CheckStatus {
    match raw {
        Some("queued") => CheckStatus::Queued,
        Some("in_progress") => CheckStatus::InProgress,
        _ => CheckStatus::Completed,
    }
}

fn map_conclusion(raw: Option<&str>) -> Option<CheckConclusion> {
    match raw? {
        "success" => Some(CheckConclusion::Success),
        "failure" => Some(CheckConclusion::Failure),
        "cancelled" => Some(CheckConclusion::Cancelled),
        "timed_out" => Some(CheckConclusion::TimedOut),
        "neutral" => Some(CheckConclusion::Neutral),
        _ => None,
    }
}

fn pull_url(reference: &SourceReference) -> String {
    format!(
        "https://github.com/{}/{}/pull/{}",
        reference.owner, reference.repo, reference.number
    )
}

/// Pull requests, files, commits, comments and check runs via the GitHub API.
pub struct GitHubProvider {
    client: HttpJsonClient,
}

impl GitHubProvider {
    pub fn new(connection: &ConnectionConfig) -> Result<Self, ProviderError> {
        let client = HttpJsonClient::new("GitHub", connection)?
            .with_header("Accept", "application/vnd.github+json")
            .with_header("X-GitHub-Api-Version", "2022-11-28");
        Ok(Self { client })
    }

    /// Collect up to [`MAX_PAGES`] pages of a list endpoint.
    async fn paged<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<T>, ProviderError> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let batch: Vec<T> = self
                .client
                .get_json(
                    path,
                    &[("per_page", PER_PAGE.to_string()), ("page", page.to_string())],
                )
                .await?;
            let len = batch.len();
            items.extend(batch);
            if len < PER_PAGE {
                break;
            }
        }
        Ok(items)
    }

    /// Check runs for the head commit. Failures yield an empty list.
    async fn check_runs(&self, base: &str, sha: &str) -> Vec<CheckRun> {
        let result: Result<GhCheckRuns, _> = self
            .client
            .get_json(
                &format!("{base}/commits/{sha}/check-runs"),
                &[("per_page", PER_PAGE.to_string())],
            )
            .await;
        match result {
            Ok(runs) => runs
                .check_runs
                .into_iter()
                .map(|r| CheckRun {
                    name: r.name.unwrap_or_else(|| "check-run".to_string()),
                    status: map_status(r.status.as_deref()),
                    conclusion: map_conclusion(r.conclusion.as_deref()),
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load check runs");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl ChangeProvider for GitHubProvider {
    async fn fetch_change(
        &self,
        reference: &SourceReference,
    ) -> Result<ChangeSourcePayload, ProviderError> {
        let base = format!("/repos/{}/{}", reference.owner, reference.repo);
        let n = reference.number;

        let pull: GhPull = self.client.get_json(&format!("{base}/pulls/{n}"), &[]).await?;
        let files: Vec<GhFile> = self.paged(&format!("{base}/pulls/{n}/files")).await?;
        let commits: Vec<GhCommit> = self.paged(&format!("{base}/pulls/{n}/commits")).await?;
        let comments: Vec<GhComment> = self.paged(&format!("{base}/issues/{n}/comments")).await?;

        let checks = match pull.head.sha.as_deref() {
            Some(sha) if !sha.is_empty() => self.check_runs(&base, sha).await,
            _ => Vec::new(),
        };

        let unknown = || "unknown".to_string();
        Ok(ChangeSourcePayload {
            metadata: ChangeMetadata {
                title: pull.title.unwrap_or_else(|| format!("PR #{n}")),
                body: pull.body.unwrap_or_default(),
                author: pull.user.login.unwrap_or_else(unknown),
                base_branch: pull.base.name.unwrap_or_else(unknown),
                head_branch: pull.head.name.unwrap_or_else(unknown),
                url: pull.html_url.unwrap_or_else(|| pull_url(reference)),
            },
            files: files
                .into_iter()
                .map(|f| SourceFile {
                    path: f.filename.unwrap_or_else(unknown),
                    patch: f.patch.unwrap_or_default(),
                })
                .collect(),
            commits: commits
                .into_iter()
                .map(|c| Commit {
                    sha: c.sha.unwrap_or_default(),
                    message: c.commit.message.unwrap_or_default(),
                })
                .collect(),
            checks,
            comments: comments
                .into_iter()
                .map(|c| ReviewComment {
                    author: c.user.login.unwrap_or_else(unknown),
                    body: c.body.unwrap_or_default(),
                })
                .collect(),
        })
    }

    async fn publish_comment(
        &self,
        reference: &SourceReference,
        body: &str,
    ) -> Result<PublishedComment, ProviderError> {
        let path = format!(
            "/repos/{}/{}/issues/{}/comments",
            reference.owner, reference.repo, reference.number
        );
        let created: GhComment = self
            .client
            .post_json(&path, &serde_json::json!({ "body": body }))
            .await?;

        let id = match created.id {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Ok(PublishedComment {
            id,
            url: created.html_url.unwrap_or_else(|| pull_url(reference)),
            body: created.body.unwrap_or_else(|| body.to_string()),
        })
    }
}
