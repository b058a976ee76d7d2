//! Threshold sweeps and context integrity checks over retained samples.

use serde::Serialize;
use tracing::debug;

use affect_types::ExpressionDefinition;

use crate::context::PrototypeEvaluation;
use crate::error::SimResult;
use crate::evaluator::{CompiledExpression, ExpressionEvaluator};
use crate::simulator::accumulator::ratio;
use crate::simulator::StoredContext;

/// Trigger rate at one candidate threshold.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityPoint {
    pub threshold: f64,
    pub trigger_count: usize,
    pub trigger_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivitySweep {
    pub expression_id: String,
    pub clause_id: String,
    pub original_threshold: Option<f64>,
    pub sample_count: usize,
    pub points: Vec<SensitivityPoint>,
}

impl SensitivitySweep {
    /// Smallest-change threshold reaching at least `target` trigger rate.
    pub fn closest_reaching(&self, target: f64) -> Option<&SensitivityPoint> {
        let origin = self.original_threshold.unwrap_or(0.0);
        self.points
            .iter()
            .filter(|p| p.trigger_rate >= target)
            .min_by(|a, b| {
                (a.threshold - origin)
                    .abs()
                    .total_cmp(&(b.threshold - origin).abs())
            })
    }
}

/// Re-evaluates retained contexts under modified thresholds.
#[derive(Clone, Debug, Default)]
pub struct SensitivityAnalyzer {
    evaluator: ExpressionEvaluator,
}

impl SensitivityAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger rate over `contexts` for each replacement threshold of one leaf.
    pub fn sweep_threshold(
        &self,
        expression: &ExpressionDefinition,
        clause_id: &str,
        thresholds: &[f64],
        contexts: &[StoredContext],
    ) -> SimResult<SensitivitySweep> {
        let compiled = CompiledExpression::compile(expression)?;
        let original_threshold = compiled
            .find(clause_id)
            .and_then(|idx| compiled.nodes()[idx].threshold());

        let mut points = Vec::with_capacity(thresholds.len());
        for &threshold in thresholds {
            let variant = compiled.with_threshold(clause_id, threshold)?;
            let mut trigger_count = 0;
            for stored in contexts {
                match self.evaluator.evaluate(&variant, &stored.context) {
                    Ok(eval) if eval.passed => trigger_count += 1,
                    Ok(_) => {}
                    Err(error) => {
                        debug!(trial = stored.trial, error = %error, "sweep evaluation failed")
                    }
                }
            }
            points.push(SensitivityPoint {
                threshold,
                trigger_count,
                trigger_rate: ratio(trigger_count, contexts.len()),
            });
        }

        Ok(SensitivitySweep {
            expression_id: expression.id.clone(),
            clause_id: clause_id.to_string(),
            original_threshold,
            sample_count: contexts.len(),
            points,
        })
    }
}

// ── Integrity ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePoint {
    Current,
    Previous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Gate failed yet the intensity is non-zero.
    GateFailedWithIntensity,
    IntensityOutOfRange,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityViolation {
    pub trial: usize,
    pub prototype_id: String,
    pub time_point: TimePoint,
    pub kind: ViolationKind,
    pub intensity: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub contexts_checked: usize,
    pub violations: Vec<IntegrityViolation>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check retained contexts for gate/intensity inconsistencies.
pub fn check_integrity(contexts: &[StoredContext]) -> IntegrityReport {
    let mut report = IntegrityReport {
        contexts_checked: contexts.len(),
        violations: Vec::new(),
    };
    for stored in contexts {
        let ctx = &stored.context;
        for (time_point, evals) in [
            (TimePoint::Current, ctx.current_evaluations()),
            (TimePoint::Previous, ctx.previous_evaluations()),
        ] {
            for eval in evals {
                if let Some(kind) = violation(eval) {
                    report.violations.push(IntegrityViolation {
                        trial: stored.trial,
                        prototype_id: eval.prototype_id.clone(),
                        time_point,
                        kind,
                        intensity: eval.intensity,
                    });
                }
            }
        }
    }
    report
}

fn violation(eval: &PrototypeEvaluation) -> Option<ViolationKind> {
    if !(0.0..=1.0).contains(&eval.intensity) {
        Some(ViolationKind::IntensityOutOfRange)
    } else if !eval.gate_pass && eval.intensity != 0.0 {
        Some(ViolationKind::GateFailedWithIntensity)
    } else {
        None
    }
}
