//! Ask the generator for a score and accept it only if it is well formed.
//!
//! Nothing here computes a score. A payload either passes every check or
//! the stage fails naming the first violation.

use std::collections::HashSet;
use std::str::FromStr;

use serde_json::{Map, Value};

use super::{Stage, StageContext, StageError, StepSummary};
use crate::config::ScoringWeights;
use crate::llm::json::parse_json_object;
use crate::llm::prompts::build_score_prompt;
use crate::models::score::{EvidenceItem, ScoreBreakdownItem, clamp_score};
use crate::models::{Confidence, ReviewContext, ScoreDimension, ScoreResult};

pub struct ScoreStage;

impl Stage for ScoreStage {
    const ID: &'static str = "score-change";
    const DESCRIPTION: &'static str = "Score the change across seven dimensions";
}

impl StepSummary for ScoreResult {
    fn summary(&self) -> String {
        format!("overall {}/100, confidence {}", self.overall_score, self.confidence)
    }
}

impl ScoreStage {
    pub async fn run(&self, context: &ReviewContext, ctx: &StageContext) -> Result<ScoreResult, StageError> {
        let prompt = build_score_prompt(
            context.profile,
            &context.change,
            &context.issues,
            &context.knowledge,
        )?;
        let raw = ctx.generator.generate(&prompt).await?;
        let payload = parse_json_object(&raw)
            .ok_or_else(|| StageError::Parse("score response is not a JSON object".to_string()))?;
        validate_score(&payload, &ctx.config.scoring.weights)
    }
}

fn invalid(message: impl Into<String>) -> StageError {
    StageError::Validation(message.into())
}

fn score_in_range(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|v| (0.0..=100.0).contains(v))
}

/// Check a parsed payload against the rubric and normalize it.
///
/// Missing weights fall back to `weights`; scores are rounded.
pub fn validate_score(payload: &Value, weights: &ScoringWeights) -> Result<ScoreResult, StageError> {
    let overall = score_in_range(payload.get("overallScore"))
        .ok_or_else(|| invalid("overallScore must be a number within [0,100]"))?;

    let items = payload
        .get("scoreBreakdown")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .ok_or_else(|| invalid("scoreBreakdown must be a non-empty array"))?;

    let confidence = payload
        .get("confidence")
        .and_then(Value::as_str)
        .and_then(|c| Confidence::from_str(c).ok())
        .ok_or_else(|| invalid("confidence must be one of low, medium, high"))?;

    let mut seen = HashSet::new();
    let mut breakdown = Vec::with_capacity(ScoreDimension::COUNT);
    for item in items {
        let name = item.get("dimension").and_then(Value::as_str).unwrap_or_default();
        let dimension = ScoreDimension::from_str(name)
            .map_err(|_| invalid(format!("unknown dimension '{name}'")))?;
        if !seen.insert(dimension) {
            return Err(invalid(format!("duplicated dimension {dimension}")));
        }

        let score = score_in_range(item.get("score"))
            .ok_or_else(|| invalid(format!("score for {dimension} must be within [0,100]")))?;

        let rationale = item
            .get("rationale")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| invalid(format!("rationale for {dimension} must be a non-empty string")))?;

        let weight = item
            .get("weight")
            .and_then(Value::as_f64)
            .unwrap_or_else(|| weights.get(dimension));

        breakdown.push(ScoreBreakdownItem {
            dimension,
            score: clamp_score(score),
            weight,
            rationale: rationale.to_string(),
        });
    }

    if let Some(missing) = ScoreDimension::all().into_iter().find(|d| !seen.contains(d)) {
        return Err(invalid(format!("missing dimension {missing}")));
    }

    Ok(ScoreResult {
        overall_score: clamp_score(overall),
        score_breakdown: breakdown,
        evidence: parse_evidence(payload.get("evidence")),
        confidence,
    })
}

/// Evidence is free-form; entries that are not objects are dropped.
fn parse_evidence(value: Option<&Value>) -> Vec<EvidenceItem> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj: &Map<String, Value>| EvidenceItem {
            file: obj.get("file").and_then(Value::as_str).map(String::from),
            snippet: obj.get("snippet").and_then(Value::as_str).map(String::from),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::stages::testing::{answering, review_context};

    fn valid_payload() -> Value {
        let breakdown: Vec<Value> = ScoreDimension::all()
            .into_iter()
            .map(|d| json!({ "dimension": d, "score": 80.4, "rationale": " fine " }))
            .collect();
        json!({
            "overallScore": 81.6,
            "scoreBreakdown": breakdown,
            "evidence": [{ "file": "src/lib.rs", "snippet": "fn main" }, "junk", { "line": 3 }],
            "confidence": "high",
        })
    }

    fn validate(payload: &Value) -> Result<ScoreResult, StageError> {
        validate_score(payload, &ScoringWeights::default())
    }

    fn error_of(payload: &Value) -> String {
        validate(payload).unwrap_err().to_string()
    }

    #[test]
    fn valid_payload_is_normalized() {
        let score = validate(&valid_payload()).unwrap();
        assert_eq!(score.overall_score, 82);
        assert_eq!(score.score_breakdown.len(), 7);
        assert!(score.score_breakdown.iter().all(|i| i.score == 80 && i.rationale == "fine"));
        assert_eq!(score.confidence, Confidence::High);
        assert_eq!(score.evidence.len(), 2);
        assert_eq!(score.evidence[0].file.as_deref(), Some("src/lib.rs"));
        assert_eq!(score.evidence[1], EvidenceItem::default());
    }

    #[test]
    fn missing_weights_use_configured_defaults() {
        let weights = ScoringWeights {
            security: 0.5,
            ..ScoringWeights::default()
        };
        let mut payload = valid_payload();
        payload["scoreBreakdown"][0]["weight"] = json!(0.9);
        let score = validate_score(&payload, &weights).unwrap();
        assert_eq!(score.dimension(ScoreDimension::Correctness).unwrap().weight, 0.9);
        assert_eq!(score.dimension(ScoreDimension::Security).unwrap().weight, 0.5);
    }

    #[test]
    fn overall_out_of_range_fails() {
        let mut payload = valid_payload();
        payload["overallScore"] = json!(101);
        assert!(error_of(&payload).contains("overallScore"));
        payload["overallScore"] = json!("80");
        assert!(error_of(&payload).contains("overallScore"));
    }

    #[test]
    fn empty_breakdown_fails() {
        let mut payload = valid_payload();
        payload["scoreBreakdown"] = json!([]);
        assert!(error_of(&payload).contains("scoreBreakdown"));
    }

    #[test]
    fn bad_confidence_fails() {
        let mut payload = valid_payload();
        payload["confidence"] = json!("certain");
        assert!(error_of(&payload).contains("confidence"));
    }

    #[test]
    fn duplicated_dimension_is_named() {
        let mut payload = valid_payload();
        payload["scoreBreakdown"][6]["dimension"] = json!("Security");
        assert_eq!(error_of(&payload), "invalid score: duplicated dimension Security");
    }

    #[test]
    fn missing_dimension_is_named() {
        let mut payload = valid_payload();
        payload["scoreBreakdown"].as_array_mut().unwrap().pop();
        assert_eq!(error_of(&payload), "invalid score: missing dimension Traceability");
    }

    #[test]
    fn unknown_dimension_is_named() {
        let mut payload = valid_payload();
        payload["scoreBreakdown"][0]["dimension"] = json!("Style");
        assert!(error_of(&payload).contains("unknown dimension 'Style'"));
    }

    #[test]
    fn item_score_and_rationale_are_checked() {
        let mut payload = valid_payload();
        payload["scoreBreakdown"][4]["score"] = json!(-1);
        assert_eq!(
            error_of(&payload),
            "invalid score: score for Performance must be within [0,100]"
        );

        let mut payload = valid_payload();
        payload["scoreBreakdown"][5]["rationale"] = json!("   ");
        assert!(error_of(&payload).contains("rationale for Test Quality"));
    }

    #[tokio::test]
    async fn run_accepts_fenced_payload() {
        let ctx = answering(format!("Here:\n```json\n{}\n```", valid_payload()));
        let score = ScoreStage.run(&review_context(), &ctx).await.unwrap();
        assert_eq!(score.overall_score, 82);
        assert_eq!(score.summary(), "overall 82/100, confidence high");
    }

    #[tokio::test]
    async fn run_rejects_non_json() {
        let ctx = answering("great PR!");
        let err = ScoreStage.run(&review_context(), &ctx).await.unwrap_err();
        assert!(matches!(err, StageError::Parse(_)));
    }
}
