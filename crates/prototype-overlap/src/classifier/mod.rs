//! Rule engine that turns pair metrics into a recommended relationship.
//!
//! Rules are checked in a fixed order: merge, subsumption, convert to
//! expression, nested siblings. The first rule that matches is primary; later
//! matches are kept as secondary classifications. A pair matching nothing is
//! `no_match`, with confidence falling as it comes closer to some rule.

pub mod types;

pub use types::{Evidence, MatchingClassification, OverlapClassification, OverlapType};

use tracing::debug;

use affect_types::{ClassificationThresholds, MoodAxis};

use crate::behavior::BehaviorMetrics;
use crate::candidate::CandidatePair;
use crate::error::OverlapResult;

/// Upper bound the narrower side must place on `threat` before it reads as
/// "the wider prototype, but calm".
pub const CONVERT_MAX_THREAT_UPPER: f64 = 0.20;

/// One rule's verdict before confidence scoring.
struct RuleOutcome {
    overlap_type: OverlapType,
    matched: bool,
    narrower: Option<String>,
    evidence: Vec<Evidence>,
}

impl RuleOutcome {
    fn new(overlap_type: OverlapType, narrower: Option<String>, evidence: Vec<Evidence>) -> Self {
        let matched = !evidence.is_empty() && evidence.iter().all(|e| e.passed);
        Self {
            overlap_type,
            matched,
            narrower,
            evidence,
        }
    }

    fn passed_fraction(&self) -> f64 {
        if self.evidence.is_empty() {
            return 0.0;
        }
        self.evidence.iter().filter(|e| e.passed).count() as f64 / self.evidence.len() as f64
    }

    /// 0.5 at the thresholds, rising to 1.0 as every metric reaches its ideal.
    fn confidence(&self) -> f64 {
        if self.evidence.is_empty() {
            return 0.5;
        }
        let mean = self.evidence.iter().map(|e| e.margin).sum::<f64>() / self.evidence.len() as f64;
        (0.5 + 0.5 * mean).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct OverlapClassifier {
    thresholds: ClassificationThresholds,
}

impl OverlapClassifier {
    pub fn new(thresholds: ClassificationThresholds) -> OverlapResult<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &ClassificationThresholds {
        &self.thresholds
    }

    pub fn classify(&self, candidate: &CandidatePair, behavior: &BehaviorMetrics) -> OverlapClassification {
        let convert = self.convert_rule(candidate, behavior);
        let nested = self.nested_rule(candidate, behavior, convert.matched);
        let rules = [
            self.merge_rule(behavior),
            self.subsumption_rule(candidate, behavior),
            convert,
            nested,
        ];

        let all_matching_classifications: Vec<MatchingClassification> = rules
            .iter()
            .filter(|r| r.matched)
            .enumerate()
            .map(|(i, r)| MatchingClassification {
                overlap_type: r.overlap_type,
                is_primary: i == 0,
                narrower_prototype: r.narrower.clone(),
                confidence: r.confidence(),
                evidence: r.evidence.clone(),
            })
            .collect();

        let classification = match all_matching_classifications.first() {
            Some(primary) => OverlapClassification {
                overlap_type: primary.overlap_type,
                narrower_prototype: primary.narrower_prototype.clone(),
                confidence: primary.confidence,
                evidence: primary.evidence.clone(),
                all_matching_classifications: all_matching_classifications.clone(),
            },
            None => {
                let closest = rules
                    .iter()
                    .max_by(|x, y| x.passed_fraction().total_cmp(&y.passed_fraction()));
                let best = closest.map(RuleOutcome::passed_fraction).unwrap_or(0.0);
                OverlapClassification {
                    overlap_type: OverlapType::NoMatch,
                    narrower_prototype: None,
                    confidence: 1.0 - 0.5 * best,
                    evidence: rules.iter().flat_map(|r| r.evidence.iter().cloned()).collect(),
                    all_matching_classifications: Vec::new(),
                }
            }
        };

        debug!(
            a = %candidate.a_id,
            b = %candidate.b_id,
            classification = %classification.overlap_type,
            confidence = classification.confidence,
            secondary = classification.all_matching_classifications.len().saturating_sub(1),
            "pair classified"
        );
        classification
    }

    fn merge_rule(&self, m: &BehaviorMetrics) -> RuleOutcome {
        let t = &self.thresholds;
        RuleOutcome::new(
            OverlapType::MergeRecommended,
            None,
            vec![
                Evidence::at_least("onEitherRate", m.on_either_rate, t.min_on_either_rate_for_merge),
                Evidence::at_least("gateOverlapRatio", m.gate_overlap_ratio, t.min_gate_overlap_ratio),
                Evidence::at_least("pearson", m.pearson_or_zero(), t.min_correlation_for_merge),
                Evidence::at_most("meanAbsDiff", m.mean_abs_diff, t.max_mean_abs_diff_for_merge),
            ],
        )
    }

    fn subsumption_rule(&self, c: &CandidatePair, m: &BehaviorMetrics) -> RuleOutcome {
        let t = &self.thresholds;
        let side = |exclusive_metric: &str, exclusive: f64, dominance_metric: &str, dominance: f64| {
            vec![
                Evidence::at_most(exclusive_metric, exclusive, t.max_exclusive_rate_for_subsumption),
                Evidence::at_least("pearson", m.pearson_or_zero(), t.min_correlation_for_subsumption),
                Evidence::at_least(dominance_metric, dominance, t.min_dominance_for_subsumption),
            ]
        };
        let a_narrower = RuleOutcome::new(
            OverlapType::Subsumption,
            Some(c.a_id.clone()),
            side("aOnlyRate", m.a_only_rate, "dominanceB", m.dominance_b),
        );
        let b_narrower = RuleOutcome::new(
            OverlapType::Subsumption,
            Some(c.b_id.clone()),
            side("bOnlyRate", m.b_only_rate, "dominanceA", m.dominance_a),
        );

        match (a_narrower.matched, b_narrower.matched) {
            (true, true) if m.b_only_rate < m.a_only_rate => b_narrower,
            (true, _) => a_narrower,
            (false, true) => b_narrower,
            (false, false) if b_narrower.passed_fraction() > a_narrower.passed_fraction() => b_narrower,
            (false, false) => a_narrower,
        }
    }

    fn convert_rule(&self, c: &CandidatePair, m: &BehaviorMetrics) -> RuleOutcome {
        if !self.thresholds.enable_convert_to_expression {
            return RuleOutcome {
                overlap_type: OverlapType::ConvertToExpression,
                matched: false,
                narrower: None,
                evidence: Vec::new(),
            };
        }
        let implication = &m.implication;
        let one_way = implication.is_one_way();
        let threat = MoodAxis::Threat.name();
        let (narrower, interval) = if implication.a_implies_b {
            (c.a_id.clone(), implication.a_interval(threat))
        } else {
            (c.b_id.clone(), implication.b_interval(threat))
        };
        let upper = interval.upper.map(|b| b.value);
        let threat_evidence = Evidence {
            passed: upper.is_some_and(|u| u <= CONVERT_MAX_THREAT_UPPER),
            ..Evidence::at_most(
                "narrowerThreatUpperBound",
                upper.unwrap_or(1.0),
                CONVERT_MAX_THREAT_UPPER,
            )
        };
        RuleOutcome::new(
            OverlapType::ConvertToExpression,
            one_way.then_some(narrower),
            vec![Evidence::holds("oneWayImplication", one_way), threat_evidence],
        )
    }

    fn nested_rule(&self, c: &CandidatePair, m: &BehaviorMetrics, convert_matched: bool) -> RuleOutcome {
        let t = &self.thresholds;
        let p_ab = m.p_a_given_b.unwrap_or(0.0);
        let p_ba = m.p_b_given_a.unwrap_or(0.0);

        // P(A|B) high and P(B|A) low: B rarely fires without A, so B is inside A.
        let b_inside = p_ab >= t.min_conditional_for_nesting && p_ba <= t.max_reverse_conditional_for_nesting;
        let a_inside = p_ba >= t.min_conditional_for_nesting && p_ab <= t.max_reverse_conditional_for_nesting;
        let implication = &m.implication;
        let one_way = implication.is_one_way();

        let narrower = if a_inside {
            Some(c.a_id.clone())
        } else if b_inside {
            Some(c.b_id.clone())
        } else if one_way && implication.a_implies_b {
            Some(c.a_id.clone())
        } else if one_way {
            Some(c.b_id.clone())
        } else {
            None
        };

        let (conditional, reverse) = match narrower.as_deref() {
            Some(id) if id == c.b_id && !a_inside => (("pAGivenB", p_ab), ("pBGivenA", p_ba)),
            _ => (("pBGivenA", p_ba), ("pAGivenB", p_ab)),
        };
        let asymmetric = a_inside || b_inside;
        let evidence = vec![
            Evidence::at_least(conditional.0, conditional.1, t.min_conditional_for_nesting),
            Evidence::at_most(reverse.0, reverse.1, t.max_reverse_conditional_for_nesting),
            Evidence::holds("oneWayImplication", one_way),
            Evidence::holds("convertToExpressionNotMatched", !convert_matched),
        ];
        RuleOutcome {
            overlap_type: OverlapType::NestedSiblings,
            matched: (asymmetric || one_way) && !convert_matched,
            narrower,
            evidence,
        }
    }
}
