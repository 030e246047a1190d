//! Jira REST (v2) implementation of [`IssueProvider`].
//!
//! Requested keys are expanded breadth-first through parent, subtask and
//! issue-link edges until `expand_depth` is reached or [`MAX_ISSUES`] have
//! been resolved. Issues answering 404 are skipped.

use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::HttpJsonClient;
use crate::config::ConnectionConfig;
use crate::models::Issue;
use crate::models::issue::normalize_keys;
use crate::providers::{FetchOptions, IssueProvider, ProviderError};

/// Hard cap on issues resolved by one expansion.
pub const MAX_ISSUES: usize = 200;

static LINKED_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]+-\d+$").unwrap());

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://[^\s)]+").unwrap());

static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-*]\s+").unwrap());

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeyRef {
    key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IssueLinkRef {
    outward_issue: Option<KeyRef>,
    inward_issue: Option<KeyRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IssueFields {
    summary: Option<String>,
    description: Value,
    parent: Option<KeyRef>,
    subtasks: Vec<KeyRef>,
    issuelinks: Vec<IssueLinkRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIssue {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RemoteObject {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RemoteLink {
    object: RemoteObject,
}

/// Append `/rest/api/2` unless the domain already points at it.
fn api_base(domain: &str) -> String {
    let trimmed = domain.trim().trim_end_matches('/');
    if trimmed.to_lowercase().ends_with("/rest/api/2") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/rest/api/2")
    }
}

/// Flatten Atlassian Document Format (or a plain string) into text.
pub fn adf_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(adf_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(node) => {
            if node.get("type").and_then(Value::as_str) == Some("text") {
                return node
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
            }
            match node.get("content") {
                Some(Value::Array(children)) => children
                    .iter()
                    .map(adf_to_text)
                    .collect::<Vec<_>>()
                    .join("\n"),
                _ => String::new(),
            }
        }
        _ => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    AcceptanceCriteria,
    Nfr,
    Risks,
    Testing,
}

fn section_heading(lowered: &str) -> Option<Section> {
    let starts = |prefixes: &[&str]| prefixes.iter().any(|p| lowered.starts_with(p));
    if starts(&["acceptance criteria"]) {
        Some(Section::AcceptanceCriteria)
    } else if starts(&["nfr", "non-functional requirement"]) {
        Some(Section::Nfr)
    } else if starts(&["risk"]) {
        Some(Section::Risks)
    } else if starts(&["testing requirement", "test"]) {
        Some(Section::Testing)
    } else {
        None
    }
}

/// Requirement lists pulled out of a description by heading.
#[derive(Debug, Default, PartialEq)]
pub struct Sections {
    pub acceptance_criteria: Vec<String>,
    pub nfr: Vec<String>,
    pub risks: Vec<String>,
    pub testing_requirements: Vec<String>,
}

impl Sections {
    fn list(&mut self, section: Section) -> &mut Vec<String> {
        match section {
            Section::AcceptanceCriteria => &mut self.acceptance_criteria,
            Section::Nfr => &mut self.nfr,
            Section::Risks => &mut self.risks,
            Section::Testing => &mut self.testing_requirements,
        }
    }
}

/// Split a description into requirement sections.
///
/// A heading line switches the current section; text after its colon
/// counts as the first item. Following lines (bullets stripped) belong to
/// the current section until the next heading.
pub fn extract_sections(text: &str) -> Sections {
    let mut sections = Sections::default();
    let mut current = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(section) = section_heading(&line.to_lowercase()) {
            current = Some(section);
            if let Some((_, tail)) = line.split_once(':') {
                let tail = tail.trim();
                if !tail.is_empty() {
                    sections.list(section).push(tail.to_string());
                }
            }
            continue;
        }
        if let Some(section) = current {
            let cleaned = BULLET_RE.replace(line, "").trim().to_string();
            if !cleaned.is_empty() {
                sections.list(section).push(cleaned);
            }
        }
    }
    sections
}

fn unique(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}

fn linked_keys(raw: &RawIssue) -> Vec<String> {
    let f = &raw.fields;
    let parent = f.parent.iter().filter_map(|p| p.key.clone());
    let subtasks = f.subtasks.iter().filter_map(|s| s.key.clone());
    let links = f.issuelinks.iter().flat_map(|l| {
        [&l.outward_issue, &l.inward_issue]
            .into_iter()
            .flatten()
            .filter_map(|r| r.key.clone())
    });
    unique(
        parent
            .chain(subtasks)
            .chain(links)
            .map(|k| k.to_uppercase())
            .filter(|k| LINKED_KEY_RE.is_match(k)),
    )
}

fn map_issue(raw: &RawIssue, remote_links: Vec<String>) -> Issue {
    let description = adf_to_text(&raw.fields.description);
    let sections = extract_sections(&description);
    let description_links = URL_RE
        .find_iter(&description)
        .map(|m| m.as_str().to_string());

    Issue {
        key: raw.key.clone(),
        summary: raw.fields.summary.clone().unwrap_or_default(),
        links: unique(description_links.chain(remote_links)),
        description,
        acceptance_criteria: sections.acceptance_criteria,
        nfr: sections.nfr,
        risks: sections.risks,
        testing_requirements: sections.testing_requirements,
    }
}

pub struct JiraProvider {
    client: HttpJsonClient,
}

impl JiraProvider {
    pub fn new(connection: &ConnectionConfig) -> Result<Self, ProviderError> {
        let api = ConnectionConfig {
            domain: api_base(&connection.domain),
            credential: connection.credential.clone(),
        };
        Ok(Self {
            client: HttpJsonClient::new("Jira", &api)?,
        })
    }

    async fn fetch_issue(&self, key: &str) -> Result<Option<RawIssue>, ProviderError> {
        self.client
            .get_optional(
                &format!("/issue/{key}"),
                &[("fields", "summary,description,parent,subtasks,issuelinks".to_string())],
            )
            .await
    }

    /// Remote-link URLs for an issue. Failures yield an empty list.
    async fn remote_links(&self, key: &str) -> Vec<String> {
        match self
            .client
            .get_json::<Vec<RemoteLink>>(&format!("/issue/{key}/remotelink"), &[])
            .await
        {
            Ok(links) => links
                .into_iter()
                .filter_map(|l| l.object.url)
                .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
                .collect(),
            Err(e) => {
                tracing::debug!(key, error = %e, "remote links unavailable");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl IssueProvider for JiraProvider {
    async fn fetch_issues(
        &self,
        keys: &[String],
        options: FetchOptions,
    ) -> Result<Vec<Issue>, ProviderError> {
        let requested = normalize_keys(keys);
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let mut queue: VecDeque<(String, u32)> =
            requested.iter().map(|k| (k.clone(), 0)).collect();
        let mut visited = HashSet::new();
        let mut issues = Vec::new();

        while let Some((key, depth)) = queue.pop_front() {
            if issues.len() >= MAX_ISSUES {
                break;
            }
            if !visited.insert(key.clone()) {
                continue;
            }

            let Some(raw) = self.fetch_issue(&key).await? else {
                tracing::debug!(key = %key, "issue not found, skipping");
                continue;
            };

            let remote = self.remote_links(&raw.key).await;
            issues.push(map_issue(&raw, remote));

            if depth >= options.expand_depth {
                continue;
            }
            for linked in linked_keys(&raw) {
                if !visited.contains(&linked) {
                    queue.push_back((linked, depth + 1));
                }
            }
        }

        if issues.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "no Jira issues were found for keys: {}",
                requested.join(", ")
            )));
        }
        tracing::debug!(requested = requested.len(), resolved = issues.len(), "jira expansion done");
        Ok(issues)
    }
}
