//! Gate and publish an edited review comment.

use super::{Stage, StageContext, StageError, StepSummary};
use crate::models::SourceReference;
use crate::models::change::PublishResult;

pub struct PublishStage;

impl Stage for PublishStage {
    const ID: &'static str = "publish-comment";
    const DESCRIPTION: &'static str = "Publish the edited comment";
}

impl StepSummary for PublishResult {
    fn summary(&self) -> String {
        format!("published comment {}", self.comment.url)
    }
}

impl PublishStage {
    /// Checks run in order: enabled, confirmed, non-empty body.
    pub async fn run(
        &self,
        source: &SourceReference,
        body: &str,
        confirmed: bool,
        ctx: &StageContext,
    ) -> Result<PublishResult, StageError> {
        let post = &ctx.config.post;
        if !post.enabled {
            return Err(StageError::PublishDisabled);
        }
        if post.require_confirmation && !confirmed {
            return Err(StageError::ConfirmationRequired);
        }
        if body.trim().is_empty() {
            return Err(StageError::EmptyBody);
        }

        let comment = ctx.providers.change.publish_comment(source, body).await?;
        tracing::info!(url = %comment.url, "published review comment");
        Ok(PublishResult {
            published: true,
            used_edited_body: true,
            comment,
        })
    }
}
