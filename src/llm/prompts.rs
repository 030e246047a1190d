//! Prompt construction for the scoring and drafting stages.
//!
//! Templates use `{{name}}` placeholders. Rendering fails on a placeholder
//! with no value, and on any placeholder still present afterwards.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::json;
use thiserror::Error;

use crate::models::{
    ChangeContext, IssueContext, KnowledgeContext, ReviewContext, ReviewProfile, ScoreResult,
};

/// Files included in the scoring prompt.
pub const SCORE_MAX_FILES: usize = 10;
/// Pages included in the scoring prompt.
pub const SCORE_MAX_PAGES: usize = 12;
/// Characters kept from each file patch and page body in the scoring prompt.
pub const EXCERPT_CHARS: usize = 1200;
/// Pages included in the drafting prompt.
pub const DRAFT_MAX_PAGES: usize = 6;
/// Evidence items included in the drafting prompt.
pub const DRAFT_MAX_EVIDENCE: usize = 8;

pub const SCORE_OUTPUT_SCHEMA: &str = r#"{"overallScore":number(0-100),"scoreBreakdown":[{"dimension":"Correctness|Maintainability|Reliability|Security|Performance|Test Quality|Traceability","score":number(0-100),"weight":number,"rationale":string}],"evidence":[{"file":string?,"snippet":string?}],"confidence":"low|medium|high"}"#;

pub const DRAFT_OUTPUT_SCHEMA: &str = r#"{"markdown":"..."}"#;

pub const SCORE_TEMPLATE: &str = "You are a strict PR reviewer.
Review profile: {{profile}}.
Use only the supplied PR/Jira/Confluence context.
Return JSON only. No markdown.
JSON schema:
{{output_schema}}
Ensure all 7 dimensions are present exactly once in scoreBreakdown.
Context:
{{context_json}}";

pub const DRAFT_TEMPLATE: &str = "Generate a PR review markdown draft for human editing.
Review profile: {{profile}}.
Use concise sections: Summary, Score Breakdown, Jira/Confluence Traceability, Risks, Suggested Actions.
Output JSON only: {{output_schema}}.
Context:
{{context_json}}";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_]+)\s*\}\}").unwrap());

/// Anything between double braces, valid name or not.
static BRACED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing prompt template variable: {0}")]
    Missing(String),

    #[error("unresolved prompt template variables: {}", .0.join(", "))]
    Unresolved(Vec<String>),
}

/// Which pipeline call a prompt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Score,
    Draft,
    Unknown,
}

impl PromptKind {
    /// Recognize a prompt from its output contract.
    ///
    /// Draft prompts embed the score's field names, so they are checked first.
    pub fn classify(prompt: &str) -> Self {
        if prompt.contains("\"markdown\"")
            && prompt.to_lowercase().contains("review markdown draft")
        {
            PromptKind::Draft
        } else if prompt.contains("\"overallScore\"")
            && prompt.contains("\"scoreBreakdown\"")
            && prompt.contains("\"confidence\"")
        {
            PromptKind::Score
        } else {
            PromptKind::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PromptKind::Score => "score-change",
            PromptKind::Draft => "draft-comment",
            PromptKind::Unknown => "unknown",
        }
    }
}

/// Substitute `{{name}}` placeholders from `values`.
///
/// Only the template is checked for placeholders. Substituted values are
/// inserted verbatim, so braces inside pull request text pass through.
pub fn render_template(template: &str, values: &HashMap<&str, String>) -> Result<String, TemplateError> {
    let mut unresolved: Vec<String> = BRACED_RE
        .find_iter(template)
        .filter(|m| !PLACEHOLDER_RE.is_match(m.as_str()))
        .map(|m| m.as_str().trim_matches(['{', '}']).trim().to_string())
        .collect();
    if !unresolved.is_empty() {
        unresolved.sort();
        unresolved.dedup();
        return Err(TemplateError::Unresolved(unresolved));
    }

    let mut missing = None;
    let rendered = PLACEHOLDER_RE.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        match values.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(TemplateError::Missing(name)),
        None => Ok(rendered.into_owned()),
    }
}

fn excerpt(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Prompt asking the backend to score the change.
pub fn build_score_prompt(
    profile: ReviewProfile,
    change: &ChangeContext,
    issues: &IssueContext,
    knowledge: &KnowledgeContext,
) -> Result<String, TemplateError> {
    let files: Vec<_> = change
        .files
        .iter()
        .take(SCORE_MAX_FILES)
        .map(|f| {
            json!({
                "path": f.path,
                "patch": excerpt(&f.patch, EXCERPT_CHARS),
                "truncated": f.truncated,
            })
        })
        .collect();

    let pages: Vec<_> = knowledge
        .documents
        .iter()
        .take(SCORE_MAX_PAGES)
        .map(|d| {
            json!({
                "title": d.title,
                "url": d.url,
                "relevanceScore": d.relevance_score.unwrap_or(0),
                "source": d.source,
                "content": excerpt(&d.content, EXCERPT_CHARS),
            })
        })
        .collect();

    let context = json!({
        "profile": profile,
        "pr": {
            "title": change.metadata.title,
            "body": change.metadata.body,
            "url": change.metadata.url,
            "files": files,
            "checks": change.checks,
            "commits": change.commits,
        },
        "jira": {
            "requestedKeys": issues.requested_keys,
            "issues": issues.issues,
        },
        "confluence": { "pages": pages },
    });

    let values = HashMap::from([
        ("profile", profile.to_string()),
        ("output_schema", SCORE_OUTPUT_SCHEMA.to_string()),
        ("context_json", context.to_string()),
    ]);
    render_template(SCORE_TEMPLATE, &values)
}

/// Prompt asking the backend for an editable markdown narrative.
pub fn build_draft_prompt(context: &ReviewContext, score: &ScoreResult) -> Result<String, TemplateError> {
    let issues: Vec<_> = context
        .issues
        .issues
        .iter()
        .map(|i| json!({ "key": i.key, "summary": i.summary }))
        .collect();

    let pages: Vec<_> = context
        .knowledge
        .documents
        .iter()
        .take(DRAFT_MAX_PAGES)
        .map(|d| {
            json!({
                "title": d.title,
                "url": d.url,
                "relevanceScore": d.relevance_score.unwrap_or(0),
            })
        })
        .collect();

    let evidence: Vec<_> = score.evidence.iter().take(DRAFT_MAX_EVIDENCE).collect();

    let payload = json!({
        "pr": context.change.metadata.url,
        "profile": context.profile,
        "overallScore": score.overall_score,
        "confidence": score.confidence,
        "scoreBreakdown": score.score_breakdown,
        "jira": issues,
        "confluence": pages,
        "traceability": context.traceability,
        "evidence": evidence,
    });

    let values = HashMap::from([
        ("profile", context.profile.to_string()),
        ("output_schema", DRAFT_OUTPUT_SCHEMA.to_string()),
        ("context_json", payload.to_string()),
    ]);
    render_template(DRAFT_TEMPLATE, &values)
}
