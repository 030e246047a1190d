//! Offline generator used when `llm.mode = "mock"`.
//!
//! Answers score prompts with a fixed, valid seven-dimension payload and
//! draft prompts with markdown assembled from the prompt's own context.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::models::ScoreDimension;

use super::json::parse_json_object;
use super::prompts::PromptKind;
use super::{LlmError, TextGenerator};

/// Overall score reported by the mock backend.
pub const MOCK_OVERALL_SCORE: u32 = 82;

#[derive(Debug, Clone, Copy, Default)]
pub struct MockGenerator;

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        match PromptKind::classify(prompt) {
            PromptKind::Score => Ok(score_payload().to_string()),
            PromptKind::Draft => Ok(json!({ "markdown": draft_markdown(prompt) }).to_string()),
            PromptKind::Unknown => Err(LlmError::ApiError(
                "mock backend only answers score and draft prompts".to_string(),
            )),
        }
    }

    fn describe(&self) -> String {
        "provider=mock".to_string()
    }
}

/// Weights are left out so configured defaults apply.
fn score_payload() -> Value {
    let breakdown: Vec<Value> = ScoreDimension::all()
        .into_iter()
        .map(|dimension| {
            json!({
                "dimension": dimension,
                "score": MOCK_OVERALL_SCORE,
                "rationale": format!("{dimension} assessed offline"),
            })
        })
        .collect();

    json!({
        "overallScore": MOCK_OVERALL_SCORE,
        "scoreBreakdown": breakdown,
        "evidence": [],
        "confidence": "medium",
    })
}

fn draft_markdown(prompt: &str) -> String {
    let context = prompt
        .split_once("Context:")
        .and_then(|(_, rest)| parse_json_object(rest))
        .unwrap_or(Value::Null);

    let mut out = String::from("## PR Review Draft\n\n");
    if let Some(score) = context.get("overallScore").and_then(Value::as_u64) {
        out.push_str(&format!("Overall score: **{score}/100**\n\n"));
    }

    out.push_str("### Jira/Confluence Traceability\n\n");
    let issues = context.get("jira").and_then(Value::as_array);
    match issues {
        Some(issues) if !issues.is_empty() => {
            for issue in issues {
                let key = issue.get("key").and_then(Value::as_str).unwrap_or("?");
                let summary = issue.get("summary").and_then(Value::as_str).unwrap_or("");
                out.push_str(&format!("- {key}: {summary}\n"));
            }
        }
        _ => out.push_str("- No linked issues\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prompts::{DRAFT_OUTPUT_SCHEMA, DRAFT_TEMPLATE, SCORE_OUTPUT_SCHEMA};

    #[tokio::test]
    async fn score_prompt_gets_seven_dimensions() {
        let prompt = format!("JSON schema:\n{SCORE_OUTPUT_SCHEMA}\nContext:\n{{}}");
        let text = MockGenerator.generate(&prompt).await.unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["overallScore"], 82);
        assert_eq!(value["scoreBreakdown"].as_array().unwrap().len(), 7);
        assert!(value["scoreBreakdown"][0].get("weight").is_none());
    }

    #[tokio::test]
    async fn draft_lists_issue_keys_from_context() {
        let prompt = DRAFT_TEMPLATE
            .replace("{{profile}}", "default")
            .replace("{{output_schema}}", DRAFT_OUTPUT_SCHEMA)
            .replace(
                "{{context_json}}",
                r#"{"overallScore":70,"jira":[{"key":"PROJ-9","summary":"Cache layer"}]}"#,
            );
        let text = MockGenerator.generate(&prompt).await.unwrap();
        let markdown = serde_json::from_str::<Value>(&text).unwrap()["markdown"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(markdown.starts_with("## PR Review Draft"));
        assert!(markdown.contains("70/100"));
        assert!(markdown.contains("- PROJ-9: Cache layer"));
    }

    #[tokio::test]
    async fn unknown_prompt_is_rejected() {
        assert!(MockGenerator.generate("hello").await.is_err());
    }
}
