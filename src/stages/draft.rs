//! Ask the generator for an editable markdown review.

use serde_json::Value;

use super::{Stage, StageContext, StageError, StepSummary};
use crate::llm::json::parse_json_object;
use crate::llm::prompts::build_draft_prompt;
use crate::models::context::DraftComment;
use crate::models::{ReviewContext, ScoreResult};

pub struct DraftStage;

impl Stage for DraftStage {
    const ID: &'static str = "draft-comment";
    const DESCRIPTION: &'static str = "Draft the review comment";
}

impl StepSummary for DraftComment {
    fn summary(&self) -> String {
        format!("{} lines of markdown", self.markdown.lines().count())
    }
}

impl DraftStage {
    pub async fn run(
        &self,
        context: &ReviewContext,
        score: &ScoreResult,
        ctx: &StageContext,
    ) -> Result<DraftComment, StageError> {
        let prompt = build_draft_prompt(context, score)?;
        let raw = ctx.generator.generate(&prompt).await?;
        Ok(DraftComment {
            markdown: extract_markdown(&raw)?,
            used_generator: true,
        })
    }
}

/// Accept `{"markdown": "..."}` with non-empty text, or raw text that
/// starts with a heading marker.
pub fn extract_markdown(raw: &str) -> Result<String, StageError> {
    let from_json = parse_json_object(raw).and_then(|value| {
        value
            .get("markdown")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
    });
    if let Some(markdown) = from_json {
        return Ok(markdown);
    }

    let trimmed = raw.trim();
    if trimmed.starts_with('#') {
        return Ok(trimmed.to_string());
    }

    Err(StageError::Parse(
        "draft must be a JSON object with a non-empty \"markdown\" field or markdown starting with a heading"
            .to_string(),
    ))
}
