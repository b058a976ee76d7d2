//! End-to-end overlap analysis of a prototype population.
//!
//! ```text
//!  same-type pairs
//!        │
//!        ├─ Stage A passes ─────────────────────────┐
//!        ├─ gates comparable (Route B) ─────────────┤
//!        └─ incomparable ─▶ prescan (Route C) ─pass─┤
//!                                │                  ▼
//!                              skipped     behavior ─▶ classify
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use affect_simulation::RunId;
use affect_types::{ClassificationThresholds, OverlapConfig, Prototype, PrototypeCatalog, PrototypeKind};

use crate::behavior::{BehaviorMetrics, BehavioralOverlapEvaluator};
use crate::candidate::{CandidateMetrics, CandidateMetricsScorer, CandidatePair};
use crate::classifier::{OverlapClassification, OverlapClassifier, OverlapType};
use crate::error::{OverlapError, OverlapResult};
use crate::implication::{GateImplicationEvaluator, GateImplicationResult, GateRelation};
use crate::prescan::{BehavioralPrescanFilter, PrescanOutcome, PrescanResult};

/// Why a pair reached behavioral evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Weight vectors are similar.
    StageA,
    /// One gate region contains the other.
    GateImplication,
    /// Gates opened together often enough in the prescan.
    Prescan,
    /// Compared explicitly through [`OverlapPipeline::compare`].
    Requested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    PrescanBelowThreshold,
    PrescanBudgetExhausted,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairReport {
    pub a_id: String,
    pub b_id: String,
    #[serde(rename = "type")]
    pub kind: PrototypeKind,
    pub route: Route,
    pub candidate: CandidateMetrics,
    pub prescan: Option<PrescanResult>,
    pub behavior: BehaviorMetrics,
    pub classification: OverlapClassification,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedPair {
    pub a_id: String,
    pub b_id: String,
    #[serde(rename = "type")]
    pub kind: PrototypeKind,
    pub reason: SkipReason,
    pub prescan: Option<PrescanResult>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapCounts {
    pub total_pairs: usize,
    pub stage_a: usize,
    pub gate_implication: usize,
    pub prescan_admitted: usize,
    pub skipped: usize,
    pub by_type: BTreeMap<OverlapType, usize>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapReport {
    pub run_id: RunId,
    pub pairs: Vec<PairReport>,
    pub skipped: Vec<SkippedPair>,
    pub counts: OverlapCounts,
    pub completed_at: DateTime<Utc>,
}

impl OverlapReport {
    pub fn pair(&self, a_id: &str, b_id: &str) -> Option<&PairReport> {
        self.pairs
            .iter()
            .find(|p| (p.a_id == a_id && p.b_id == b_id) || (p.a_id == b_id && p.b_id == a_id))
    }

    /// Pairs whose primary classification is `overlap_type`.
    pub fn of_type(&self, overlap_type: OverlapType) -> impl Iterator<Item = &PairReport> {
        self.pairs
            .iter()
            .filter(move |p| p.classification.overlap_type == overlap_type)
    }
}

/// A pair admitted for behavioral evaluation.
struct Admitted<'a> {
    a: &'a Prototype,
    b: &'a Prototype,
    route: Route,
    candidate: CandidatePair,
    implication: GateImplicationResult,
    prescan: Option<PrescanResult>,
}

#[derive(Clone, Debug)]
pub struct OverlapPipeline {
    config: OverlapConfig,
    scorer: CandidateMetricsScorer,
    implication: GateImplicationEvaluator,
    prescan: BehavioralPrescanFilter,
    behavior: BehavioralOverlapEvaluator,
    classifier: OverlapClassifier,
}

impl OverlapPipeline {
    pub fn new(config: OverlapConfig, thresholds: ClassificationThresholds) -> OverlapResult<Self> {
        config.validate()?;
        Ok(Self {
            scorer: CandidateMetricsScorer::new(&config),
            implication: GateImplicationEvaluator::new(),
            prescan: BehavioralPrescanFilter::new(&config),
            behavior: BehavioralOverlapEvaluator::new(&config),
            classifier: OverlapClassifier::new(thresholds)?,
            config,
        })
    }

    pub fn config(&self) -> &OverlapConfig {
        &self.config
    }

    pub fn analyze_catalog<R: Rng + ?Sized>(&self, catalog: &PrototypeCatalog, rng: &mut R) -> OverlapReport {
        self.analyze(catalog.all(), rng)
    }

    /// Analyze with an RNG seeded from the configuration, or from entropy.
    pub fn analyze_seeded(&self, prototypes: &[Prototype]) -> OverlapReport {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.analyze(prototypes, &mut rng)
    }

    pub fn analyze<R: Rng + ?Sized>(&self, prototypes: &[Prototype], rng: &mut R) -> OverlapReport {
        let mut counts = OverlapCounts::default();
        let mut admitted = Vec::new();
        let mut undecided = Vec::new();

        for (i, a) in prototypes.iter().enumerate() {
            for b in prototypes[i + 1..].iter().filter(|b| b.kind == a.kind) {
                counts.total_pairs += 1;
                let candidate = self.scorer.candidate(a, b);
                let implication = self.implication.evaluate(a, b);
                let route = if self.scorer.passes(&candidate.metrics) {
                    Some(Route::StageA)
                } else if implication.relation != GateRelation::Incomparable {
                    Some(Route::GateImplication)
                } else {
                    None
                };
                let entry = Admitted {
                    a,
                    b,
                    route: route.unwrap_or(Route::Prescan),
                    candidate,
                    implication,
                    prescan: None,
                };
                match route {
                    Some(_) => admitted.push(entry),
                    None => undecided.push(entry),
                }
            }
        }

        let refs: Vec<(&Prototype, &Prototype)> = undecided.iter().map(|p| (p.a, p.b)).collect();
        let outcomes = self.prescan.filter_pairs(&refs, rng);
        let mut skipped = Vec::new();
        for (mut entry, outcome) in undecided.into_iter().zip(outcomes) {
            let (reason, prescan) = match outcome {
                PrescanOutcome::Evaluated(r) if r.passes => {
                    entry.prescan = Some(r);
                    admitted.push(entry);
                    continue;
                }
                PrescanOutcome::Evaluated(r) => (SkipReason::PrescanBelowThreshold, Some(r)),
                PrescanOutcome::Skipped => (SkipReason::PrescanBudgetExhausted, None),
            };
            debug!(a = %entry.a.id, b = %entry.b.id, reason = ?reason, "pair skipped");
            skipped.push(SkippedPair {
                a_id: entry.a.id.clone(),
                b_id: entry.b.id.clone(),
                kind: entry.a.kind,
                reason,
                prescan,
            });
        }

        let pairs: Vec<PairReport> = admitted.into_iter().map(|entry| self.evaluate(entry, rng)).collect();

        for pair in &pairs {
            match pair.route {
                Route::StageA => counts.stage_a += 1,
                Route::GateImplication => counts.gate_implication += 1,
                Route::Prescan => counts.prescan_admitted += 1,
                Route::Requested => {}
            }
            *counts.by_type.entry(pair.classification.overlap_type).or_insert(0) += 1;
        }
        counts.skipped = skipped.len();

        info!(
            prototypes = prototypes.len(),
            pairs = counts.total_pairs,
            stage_a = counts.stage_a,
            gate_implication = counts.gate_implication,
            prescan = counts.prescan_admitted,
            skipped = counts.skipped,
            "overlap analysis complete"
        );

        OverlapReport {
            run_id: RunId::new(),
            pairs,
            skipped,
            counts,
            completed_at: Utc::now(),
        }
    }

    /// Evaluate one pair regardless of routing.
    pub fn compare<R: Rng + ?Sized>(&self, a: &Prototype, b: &Prototype, rng: &mut R) -> OverlapResult<PairReport> {
        if a.kind != b.kind {
            return Err(OverlapError::KindMismatch {
                a: a.id.clone(),
                a_kind: a.kind,
                b: b.id.clone(),
                b_kind: b.kind,
            });
        }
        let entry = Admitted {
            a,
            b,
            route: Route::Requested,
            candidate: self.scorer.candidate(a, b),
            implication: self.implication.evaluate(a, b),
            prescan: None,
        };
        Ok(self.evaluate(entry, rng))
    }

    fn evaluate<R: Rng + ?Sized>(&self, entry: Admitted<'_>, rng: &mut R) -> PairReport {
        let behavior = self.behavior.evaluate(entry.a, entry.b, entry.implication, rng);
        let classification = self.classifier.classify(&entry.candidate, &behavior);
        debug!(
            a = %entry.a.id,
            b = %entry.b.id,
            route = ?entry.route,
            classification = %classification.overlap_type,
            "pair evaluated"
        );
        PairReport {
            a_id: entry.candidate.a_id,
            b_id: entry.candidate.b_id,
            kind: entry.a.kind,
            route: entry.route,
            candidate: entry.candidate.metrics,
            prescan: entry.prescan,
            behavior,
            classification,
        }
    }
}

impl Default for OverlapPipeline {
    fn default() -> Self {
        let config = OverlapConfig::default();
        Self {
            scorer: CandidateMetricsScorer::new(&config),
            implication: GateImplicationEvaluator::new(),
            prescan: BehavioralPrescanFilter::new(&config),
            behavior: BehavioralOverlapEvaluator::new(&config),
            classifier: OverlapClassifier::default(),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proto(id: &str, kind: PrototypeKind, weights: &[(&str, f64)], gates: &[&str]) -> Prototype {
        Prototype::new(
            id,
            kind,
            weights.iter().copied(),
            gates.iter().map(|g| g.parse().unwrap()).collect(),
        )
    }

    fn small_config() -> OverlapConfig {
        OverlapConfig {
            prescan_sample_count: 300,
            behavior_sample_count: 1_000,
            seed: Some(11),
            ..Default::default()
        }
    }

    #[test]
    fn only_same_type_pairs_are_enumerated() {
        let prototypes = vec![
            proto("joy", PrototypeKind::Emotion, &[("valence", 1.0)], &["valence >= 0.2"]),
            proto("content", PrototypeKind::Mood, &[("valence", 1.0)], &["valence >= 0.2"]),
        ];
        let pipeline = OverlapPipeline::new(small_config(), ClassificationThresholds::default()).unwrap();
        let report = pipeline.analyze_seeded(&prototypes);
        assert_eq!(report.counts.total_pairs, 0);
        assert!(report.pairs.is_empty());
    }

    #[test]
    fn duplicates_enter_through_stage_a_and_merge() {
        let prototypes = vec![
            proto("joy", PrototypeKind::Emotion, &[("valence", 1.0)], &["valence >= 0.2"]),
            proto("glee", PrototypeKind::Emotion, &[("valence", 1.0)], &["valence >= 0.2"]),
        ];
        let pipeline = OverlapPipeline::new(small_config(), ClassificationThresholds::default()).unwrap();
        let report = pipeline.analyze_seeded(&prototypes);
        let pair = report.pair("glee", "joy").unwrap();
        assert_eq!(pair.route, Route::StageA);
        assert_eq!(pair.classification.overlap_type, OverlapType::MergeRecommended);
        assert_eq!(report.counts.by_type[&OverlapType::MergeRecommended], 1);
    }

    #[test]
    fn compare_rejects_mixed_types() {
        let a = proto("joy", PrototypeKind::Emotion, &[("valence", 1.0)], &[]);
        let b = proto("content", PrototypeKind::Mood, &[("valence", 1.0)], &[]);
        let err = OverlapPipeline::default()
            .compare(&a, &b, &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, OverlapError::KindMismatch { .. }));
    }

    #[test]
    fn compare_marks_the_route_as_requested() {
        let a = proto("joy", PrototypeKind::Emotion, &[("valence", 1.0)], &["valence >= 0.2"]);
        let b = proto("dread", PrototypeKind::Emotion, &[("threat", 1.0)], &["threat >= 0.5"]);
        let pipeline = OverlapPipeline::new(small_config(), ClassificationThresholds::default()).unwrap();
        let report = pipeline.compare(&a, &b, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(report.route, Route::Requested);
        assert!(report.prescan.is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = OverlapConfig {
            prescan_sample_count: 0,
            ..Default::default()
        };
        assert!(OverlapPipeline::new(config, ClassificationThresholds::default()).is_err());
    }
}
