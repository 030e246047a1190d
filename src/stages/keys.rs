//! Find issue keys in the change's free text.

use regex::{Regex, RegexBuilder};

use super::{Stage, StageContext, StageError, StepSummary};
use crate::models::ChangeContext;
use crate::models::issue::normalize_keys;

pub struct ExtractKeysStage;

impl Stage for ExtractKeysStage {
    const ID: &'static str = "extract-issue-keys";
    const DESCRIPTION: &'static str = "Extract issue keys with the configured pattern";
}

/// Uppercased, deduplicated, sorted issue keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueKeys(pub Vec<String>);

impl StepSummary for IssueKeys {
    fn summary(&self) -> String {
        format!("{} issue keys: {}", self.0.len(), self.0.join(", "))
    }
}

impl ExtractKeysStage {
    pub async fn run(&self, change: &ChangeContext, ctx: &StageContext) -> Result<IssueKeys, StageError> {
        let pattern = compile_key_pattern(&ctx.config.jira_key_pattern)?;

        let texts = [
            change.metadata.title.as_str(),
            change.metadata.head_branch.as_str(),
            change.metadata.base_branch.as_str(),
        ]
        .into_iter()
        .chain(change.comments.iter().map(|c| c.body.as_str()))
        .chain(change.commits.iter().map(|c| c.message.as_str()));

        let keys = extract_issue_keys(&pattern, texts);
        if keys.is_empty() {
            return Err(StageError::NoIssueKeys);
        }
        tracing::debug!(keys = ?keys, "extracted issue keys");
        Ok(IssueKeys(keys))
    }
}

/// Compile `pattern` case-insensitively.
pub fn compile_key_pattern(pattern: &str) -> Result<Regex, StageError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| StageError::InvalidKeyPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Every match of `pattern` across `texts`, normalized.
pub fn extract_issue_keys<'a>(pattern: &Regex, texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let matches: Vec<&str> = texts
        .into_iter()
        .flat_map(|text| pattern.find_iter(text).map(|m| m.as_str()))
        .collect();
    normalize_keys(&matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DEFAULT_KEY_PATTERN};
    use crate::models::change::{ChangeMetadata, Commit};
    use crate::stages::testing::{context_with, empty_providers};

    fn commit(message: &str) -> Commit {
        Commit {
            sha: "abc".into(),
            message: message.into(),
        }
    }

    #[test]
    fn extraction_is_case_insensitive_and_sorted() {
        let pattern = compile_key_pattern(DEFAULT_KEY_PATTERN).unwrap();
        let keys = extract_issue_keys(&pattern, ["PROJ-3 fix", "proj-1", "see PROJ-3 and Proj-2"]);
        assert_eq!(keys, vec!["PROJ-1", "PROJ-2", "PROJ-3"]);
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = compile_key_pattern("([A-Z]+").unwrap_err();
        assert!(matches!(err, StageError::InvalidKeyPattern { .. }));
    }

    #[tokio::test]
    async fn run_scans_branches_and_commits() {
        let ctx = context_with(Config::default(), empty_providers());
        let change = ChangeContext {
            metadata: ChangeMetadata {
                title: "Improve retries".into(),
                head_branch: "feature/ops-77-retry".into(),
                ..ChangeMetadata::default()
            },
            commits: vec![commit("OPS-12 add jitter")],
            ..ChangeContext::default()
        };
        let keys = ExtractKeysStage.run(&change, &ctx).await.unwrap();
        assert_eq!(keys.0, vec!["OPS-12", "OPS-77"]);
        assert_eq!(keys.summary(), "2 issue keys: OPS-12, OPS-77");
    }

    #[tokio::test]
    async fn run_fails_without_keys() {
        let ctx = context_with(Config::default(), empty_providers());
        let change = ChangeContext {
            commits: vec![commit("tidy up")],
            ..ChangeContext::default()
        };
        let err = ExtractKeysStage.run(&change, &ctx).await.unwrap_err();
        assert!(matches!(err, StageError::NoIssueKeys));
    }
}
