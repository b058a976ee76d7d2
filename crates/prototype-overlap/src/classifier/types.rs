//! Overlap classification types.

use serde::Serialize;

/// Relationship recommended for a prototype pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapType {
    MergeRecommended,
    Subsumption,
    ConvertToExpression,
    NestedSiblings,
    NoMatch,
}

impl std::fmt::Display for OverlapType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MergeRecommended => "merge_recommended",
            Self::Subsumption => "subsumption",
            Self::ConvertToExpression => "convert_to_expression",
            Self::NestedSiblings => "nested_siblings",
            Self::NoMatch => "no_match",
        };
        f.write_str(s)
    }
}

/// One metric checked against one threshold.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub passed: bool,
    /// How far past the threshold the value sits, scaled to [0, 1].
    pub margin: f64,
}

impl Evidence {
    /// `value >= threshold`, for metrics whose ideal is 1.
    pub fn at_least(metric: &str, value: f64, threshold: f64) -> Self {
        let passed = value >= threshold;
        let margin = match (passed, threshold < 1.0) {
            (false, _) => 0.0,
            (true, true) => ((value - threshold) / (1.0 - threshold)).clamp(0.0, 1.0),
            (true, false) => 1.0,
        };
        Self {
            metric: metric.to_string(),
            value,
            threshold,
            passed,
            margin,
        }
    }

    /// `value <= threshold`, for metrics whose ideal is 0.
    pub fn at_most(metric: &str, value: f64, threshold: f64) -> Self {
        let passed = value <= threshold;
        let margin = match (passed, threshold > 0.0) {
            (false, _) => 0.0,
            (true, true) => ((threshold - value) / threshold).clamp(0.0, 1.0),
            (true, false) => 1.0,
        };
        Self {
            metric: metric.to_string(),
            value,
            threshold,
            passed,
            margin,
        }
    }

    /// A boolean fact recorded as 1/0 against a threshold of 1.
    pub fn holds(metric: &str, fact: bool) -> Self {
        let value = if fact { 1.0 } else { 0.0 };
        Self {
            metric: metric.to_string(),
            value,
            threshold: 1.0,
            passed: fact,
            margin: value,
        }
    }
}

/// A rule that matched, primary or secondary.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingClassification {
    #[serde(rename = "type")]
    pub overlap_type: OverlapType,
    pub is_primary: bool,
    pub narrower_prototype: Option<String>,
    pub confidence: f64,
    pub evidence: Vec<Evidence>,
}

/// Final classification of a pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapClassification {
    #[serde(rename = "type")]
    pub overlap_type: OverlapType,
    pub narrower_prototype: Option<String>,
    /// In [0, 1].
    pub confidence: f64,
    pub all_matching_classifications: Vec<MatchingClassification>,
    pub evidence: Vec<Evidence>,
}
