//! Fetch the pull request and derive its signals.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{Stage, StageContext, StageError, StepSummary};
use crate::models::change::{ChangeSignals, ChangedFile, SourceFile};
use crate::models::{ChangeContext, ReviewRequest, SourceReference};

/// Keyword bag cap.
pub const MAX_KEYWORDS: usize = 60;

/// Marker appended to a patch cut to the character budget.
const TRUNCATION_MARKER: &str = "\n[TRUNCATED]";

/// URLs whose text looks like a wiki or Confluence link.
static KNOWLEDGE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://[^\s)]*(?:confluence|wiki)[^\s)]*").unwrap());

/// Alphanumeric tokens of three or more characters.
static KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z][a-zA-Z0-9_-]{2,}\b").unwrap());

pub struct FetchChangeStage;

impl Stage for FetchChangeStage {
    const ID: &'static str = "fetch-change-context";
    const DESCRIPTION: &'static str = "Load PR metadata, files, commits, checks and comments";
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedChange {
    pub source: SourceReference,
    pub change: ChangeContext,
}

impl StepSummary for FetchedChange {
    fn summary(&self) -> String {
        format!(
            "{}: {} files, {} commits, {} knowledge links",
            self.source,
            self.change.files.len(),
            self.change.commits.len(),
            self.change.signals.knowledge_links.len()
        )
    }
}

impl FetchChangeStage {
    pub async fn run(&self, request: &ReviewRequest, ctx: &StageContext) -> Result<FetchedChange, StageError> {
        let source = SourceReference::parse(&request.locator)?;
        tracing::debug!(%source, "fetching pull request");
        let payload = ctx.providers.change.fetch_change(&source).await?;

        let files = trim_files(
            payload.files,
            ctx.config.max_files,
            ctx.config.max_patch_chars_per_file,
        );

        let texts: Vec<&str> = [payload.metadata.title.as_str(), payload.metadata.body.as_str()]
            .into_iter()
            .chain(payload.comments.iter().map(|c| c.body.as_str()))
            .collect();
        let signals = ChangeSignals {
            knowledge_links: extract_knowledge_links(&texts),
            keywords: collect_keywords(&texts, &request.keywords),
        };

        Ok(FetchedChange {
            source,
            change: ChangeContext {
                metadata: payload.metadata,
                files,
                commits: payload.commits,
                checks: payload.checks,
                comments: payload.comments,
                signals,
            },
        })
    }
}

/// Keep the first `max_files` files, cutting each patch to `max_chars`.
pub fn trim_files(files: Vec<SourceFile>, max_files: usize, max_chars: usize) -> Vec<ChangedFile> {
    files
        .into_iter()
        .take(max_files)
        .map(|file| {
            let truncated = file.patch.chars().count() > max_chars;
            let patch = if truncated {
                let mut cut: String = file.patch.chars().take(max_chars).collect();
                cut.push_str(TRUNCATION_MARKER);
                cut
            } else {
                file.patch
            };
            ChangedFile {
                path: file.path,
                patch,
                truncated,
            }
        })
        .collect()
}

/// Wiki-looking URLs across `texts`, first occurrence order.
pub fn extract_knowledge_links<S: AsRef<str>>(texts: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for text in texts {
        for m in KNOWLEDGE_LINK_RE.find_iter(text.as_ref()) {
            if seen.insert(m.as_str()) {
                links.push(m.as_str().to_string());
            }
        }
    }
    links
}

/// Explicit keywords first, then lowercase tokens from `texts`, capped.
pub fn collect_keywords<S: AsRef<str>>(texts: &[S], explicit: &[String]) -> Vec<String> {
    let explicit = explicit
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty());

    let tokens = texts.iter().flat_map(|text| {
        let lower = text.as_ref().to_lowercase();
        KEYWORD_RE
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .collect::<Vec<_>>()
    });

    let mut seen = HashSet::new();
    explicit
        .chain(tokens)
        .filter(|k| seen.insert(k.clone()))
        .take(MAX_KEYWORDS)
        .collect()
}
