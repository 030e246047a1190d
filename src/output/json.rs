//! JSON output renderer.
//!
//! Emits the whole outcome plus a `weightedScore` convenience field.

use crate::models::ReviewOutcome;
use crate::models::score::weighted_overall;
use crate::output::OutputRenderer;

/// JSON output renderer.
pub struct JsonRenderer;

impl OutputRenderer for JsonRenderer {
    fn render(&self, outcome: &ReviewOutcome) -> String {
        let mut value = serde_json::to_value(outcome).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "weightedScore".into(),
                weighted_overall(&outcome.score.score_breakdown).into(),
            );
        }
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::testing::outcome;

    #[test]
    fn render_json() {
        let output = JsonRenderer.render(&outcome());
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["score"]["overallScore"], 82);
        assert_eq!(parsed["score"]["scoreBreakdown"].as_array().unwrap().len(), 7);
        assert_eq!(parsed["score"]["confidence"], "high");
        assert_eq!(parsed["meta"]["runId"], "run-1");
        assert_eq!(parsed["warnings"][0], "knowledge base unavailable");
    }

    #[test]
    fn weighted_score_is_added() {
        let output = JsonRenderer.render(&outcome());
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        // six dimensions at 80, one at 55, equal weights
        assert_eq!(parsed["weightedScore"], 76);
    }
}
