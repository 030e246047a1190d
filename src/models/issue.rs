//! Issue-tracker types.

use serde::{Deserialize, Serialize};

/// One resolved issue with its structured requirement lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub key: String,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Non-functional requirements.
    #[serde(default)]
    pub nfr: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub testing_requirements: Vec<String>,
    /// Related document URLs (description links and remote links).
    #[serde(default)]
    pub links: Vec<String>,
}

/// Requested keys and the issues actually resolved for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueContext {
    /// Deduplicated, uppercased, sorted.
    pub requested_keys: Vec<String>,
    /// Sorted by key.
    pub issues: Vec<Issue>,
}

/// Uppercase, deduplicate and sort a set of issue keys.
pub fn normalize_keys<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = keys
        .iter()
        .map(|k| k.as_ref().trim().to_uppercase())
        .filter(|k| !k.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keys_uppercases_dedups_and_sorts() {
        let keys = normalize_keys(&["proj-2", "PROJ-1", "Proj-2", " proj-3 ", ""]);
        assert_eq!(keys, vec!["PROJ-1", "PROJ-2", "PROJ-3"]);
    }

    #[test]
    fn issue_deserializes_with_missing_lists() {
        let issue: Issue =
            serde_json::from_str(r#"{"key":"PROJ-1","summary":"Retry"}"#).unwrap();
        assert_eq!(issue.key, "PROJ-1");
        assert!(issue.acceptance_criteria.is_empty());
        assert!(issue.links.is_empty());
    }
}
