//! Pulling a JSON object out of free-form model output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Content inside markdown code fences.
///
/// The closing ``` must start a line so fences embedded in JSON string
/// values are not taken as the end of the block.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n```").unwrap());

/// Candidate JSON strings, most literal first.
///
/// The trimmed text itself, then the slice between the first `{` and the
/// last `}`, then the contents of every fenced block.
pub fn extract_json_candidates(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    let mut candidates = vec![trimmed.to_string()];

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            candidates.push(trimmed[start..=end].to_string());
        }
    }

    for cap in FENCE_RE.captures_iter(trimmed) {
        if let Some(inner) = cap.get(1) {
            let inner = inner.as_str().trim();
            if !inner.is_empty() {
                candidates.push(inner.to_string());
            }
        }
    }

    candidates
}

/// The first candidate that parses as a JSON object.
pub fn parse_json_object(text: &str) -> Option<Value> {
    extract_json_candidates(text)
        .iter()
        .filter_map(|c| serde_json::from_str::<Value>(c).ok())
        .find(Value::is_object)
}
