//! Score types: the seven fixed dimensions, breakdown entries, and the result.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// The fixed scoring dimensions. A valid score carries each exactly once.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
pub enum ScoreDimension {
    Correctness,
    Maintainability,
    Reliability,
    Security,
    Performance,
    #[serde(rename = "Test Quality")]
    #[strum(serialize = "Test Quality")]
    TestQuality,
    Traceability,
}

impl ScoreDimension {
    /// Number of fixed dimensions.
    pub const COUNT: usize = 7;

    /// All dimensions in declaration order.
    pub fn all() -> Vec<ScoreDimension> {
        ScoreDimension::iter().collect()
    }
}

/// Confidence tier reported by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdownItem {
    pub dimension: ScoreDimension,
    /// In `[0, 100]`.
    pub score: u32,
    pub weight: f64,
    pub rationale: String,
}

/// Free-form pointer to the code or context backing a score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// A validated score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    /// In `[0, 100]`.
    pub overall_score: u32,
    /// Exactly one entry per [`ScoreDimension`].
    pub score_breakdown: Vec<ScoreBreakdownItem>,
    pub evidence: Vec<EvidenceItem>,
    pub confidence: Confidence,
}

impl ScoreResult {
    /// Look up the breakdown entry for a dimension.
    pub fn dimension(&self, dimension: ScoreDimension) -> Option<&ScoreBreakdownItem> {
        self.score_breakdown.iter().find(|i| i.dimension == dimension)
    }

    /// Breakdown entries scoring below `threshold`.
    pub fn below(&self, threshold: u32) -> impl Iterator<Item = &ScoreBreakdownItem> {
        self.score_breakdown.iter().filter(move |i| i.score < threshold)
    }
}

/// Clamp to `[0, 100]` and round to the nearest integer.
pub fn clamp_score(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u32
}

/// Weight-normalized mean of the breakdown scores.
///
/// Shown next to the backend's own overall score; never used in its place.
pub fn weighted_overall(items: &[ScoreBreakdownItem]) -> u32 {
    let weight_sum: f64 = items.iter().map(|i| i.weight).sum();
    if weight_sum <= 0.0 {
        return 0;
    }
    let total: f64 = items.iter().map(|i| f64::from(i.score) * i.weight).sum();
    clamp_score(total / weight_sum)
}
