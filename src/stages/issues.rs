//! Resolve issue keys through the issue tracker.

use super::{Stage, StageContext, StageError, StepSummary};
use crate::models::IssueContext;
use crate::models::issue::normalize_keys;
use crate::providers::FetchOptions;

pub struct FetchIssuesStage;

impl Stage for FetchIssuesStage {
    const ID: &'static str = "fetch-issue-context";
    const DESCRIPTION: &'static str = "Load issues for the extracted keys";
}

impl StepSummary for IssueContext {
    fn summary(&self) -> String {
        format!(
            "{} of {} requested issues resolved",
            self.issues.len(),
            self.requested_keys.len()
        )
    }
}

impl FetchIssuesStage {
    /// Zero resolved issues is left for the tracker to reject.
    pub async fn run(&self, keys: &[String], ctx: &StageContext) -> Result<IssueContext, StageError> {
        let requested_keys = normalize_keys(keys);
        let options = FetchOptions {
            expand_depth: ctx.config.expand_depth,
        };
        let mut issues = ctx.providers.issues.fetch_issues(&requested_keys, options).await?;
        issues.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(IssueContext {
            requested_keys,
            issues,
        })
    }
}
