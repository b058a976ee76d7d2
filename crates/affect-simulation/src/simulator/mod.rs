//! Monte Carlo estimation of expression trigger rates.
//!
//! Each trial draws a temporal pair and a trait state, builds a context and
//! evaluates the compiled expression against it. Counts land in a
//! [`TrialAccumulator`]; a bounded reservoir optionally keeps contexts for
//! sensitivity sweeps.

pub mod accumulator;
pub mod diagnostics;
pub mod types;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use affect_types::{ExpressionDefinition, PrototypeCatalog, SimulationConfig};

use crate::context::ContextBuilder;
use crate::error::SimResult;
use crate::evaluator::{CompiledExpression, ExpressionEvaluator};
use crate::statistics::wilson_interval;
use crate::temporal::TemporalStateGenerator;

pub use accumulator::{ReservoirSampler, TrialAccumulator, TrialSummary};
pub use diagnostics::{detect_overconstrained_conjunctions, rank_last_mile_blockers};
pub use types::{
    ClauseStatistic, OverconstrainedConjunction, RunId, SimulationOptions, SimulationResult,
    StoredContext,
};

/// Counts and retained contexts from one partition of a run.
#[derive(Clone, Debug)]
pub struct PartialRun {
    pub accumulator: TrialAccumulator,
    pub reservoir: ReservoirSampler<StoredContext>,
}

/// Estimates how often an expression fires over sampled affect states.
#[derive(Clone, Debug)]
pub struct MonteCarloSimulator {
    builder: ContextBuilder,
    generator: TemporalStateGenerator,
    evaluator: ExpressionEvaluator,
    config: SimulationConfig,
}

impl MonteCarloSimulator {
    /// Create a simulator. Fails when the configuration is invalid.
    pub fn new(catalog: PrototypeCatalog, config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            builder: ContextBuilder::new(catalog),
            generator: TemporalStateGenerator::from_config(&config),
            evaluator: ExpressionEvaluator::new(),
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn context_builder(&self) -> &ContextBuilder {
        &self.builder
    }

    /// Options derived from the simulator's configuration.
    pub fn default_options(&self) -> SimulationOptions {
        SimulationOptions::from(&self.config)
    }

    /// Run a full simulation with the injected random source.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        expression: &ExpressionDefinition,
        options: &SimulationOptions,
        rng: &mut R,
    ) -> SimResult<SimulationResult> {
        let compiled = CompiledExpression::compile(expression)?;
        let partial = self.run_partition(&compiled, options, options.sample_count, 0, rng);
        self.finish(&compiled, options, vec![partial], rng)
    }

    /// Run with a `StdRng` seeded from configuration, or from entropy.
    pub fn simulate_seeded(
        &self,
        expression: &ExpressionDefinition,
        options: &SimulationOptions,
    ) -> SimResult<SimulationResult> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.simulate(expression, options, &mut rng)
    }

    /// Run `trials` trials, numbering them from `first_trial`.
    pub fn run_partition<R: Rng + ?Sized>(
        &self,
        compiled: &CompiledExpression,
        options: &SimulationOptions,
        trials: usize,
        first_trial: usize,
        rng: &mut R,
    ) -> PartialRun {
        let mut accumulator = TrialAccumulator::new(compiled);
        let capacity = if options.store_samples_for_sensitivity {
            options.sensitivity_sample_limit
        } else {
            0
        };
        let mut reservoir = ReservoirSampler::new(capacity);

        for trial in first_trial..first_trial + trials {
            let pair = self
                .generator
                .generate(options.distribution, options.sampling_mode, rng);
            let traits = self.generator.sample_traits(rng);
            let context = self.builder.build_context(&pair.current, &pair.previous, &traits);

            match self.evaluator.evaluate(compiled, &context) {
                Ok(evaluation) => {
                    accumulator.record(compiled, &evaluation);
                    if capacity > 0 {
                        let stored = StoredContext {
                            trial,
                            triggered: evaluation.passed,
                            context,
                        };
                        reservoir.offer(stored, rng);
                    }
                }
                Err(error) => {
                    if accumulator.error_count() == 0 {
                        warn!(
                            expression = %compiled.expression_id(),
                            trial,
                            error = %error,
                            "trial evaluation failed; counting as not triggered"
                        );
                    } else {
                        debug!(trial, error = %error, "trial evaluation failed");
                    }
                    accumulator.record_fault(error);
                }
            }
        }

        PartialRun {
            accumulator,
            reservoir,
        }
    }

    /// Merge partitions into a final result.
    pub fn finish<R: Rng + ?Sized>(
        &self,
        compiled: &CompiledExpression,
        options: &SimulationOptions,
        partials: Vec<PartialRun>,
        rng: &mut R,
    ) -> SimResult<SimulationResult> {
        let mut accumulator = TrialAccumulator::new(compiled);
        let mut reservoir = ReservoirSampler::new(0);
        for partial in partials {
            accumulator.merge(partial.accumulator);
            reservoir = reservoir.merge(partial.reservoir, rng);
        }

        let summary = accumulator.finish(compiled)?;
        let sample_count = summary.attempted;
        let trigger_rate = if sample_count == 0 {
            0.0
        } else {
            summary.trigger_count as f64 / sample_count as f64
        };
        let confidence_interval =
            wilson_interval(summary.trigger_count, sample_count, self.config.confidence_z);
        let overconstrained_conjunctions = detect_overconstrained_conjunctions(
            &summary.clause_statistics,
            self.config.overconstrained_min_children,
            self.config.overconstrained_max_child_pass_rate,
        );

        let mut stored_contexts = reservoir.into_items();
        stored_contexts.sort_by_key(|s| s.trial);

        info!(
            expression = %compiled.expression_id(),
            samples = sample_count,
            triggers = summary.trigger_count,
            errors = summary.error_count,
            trigger_rate,
            overconstrained = overconstrained_conjunctions.len(),
            "simulation complete"
        );

        Ok(SimulationResult {
            run_id: RunId::new(),
            expression_id: compiled.expression_id().to_string(),
            sampling_mode: options.sampling_mode,
            sample_count,
            trigger_count: summary.trigger_count,
            trigger_rate,
            confidence_interval,
            error_count: summary.error_count,
            clause_statistics: summary.clause_statistics,
            overconstrained_conjunctions,
            stored_contexts,
            completed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use affect_types::{
        CompareOperator, ExpressionNode, Gate, GateOperator, Prototype, PrototypeKind,
        SamplingMode,
    };

    fn catalog() -> PrototypeCatalog {
        PrototypeCatalog::new(vec![
            Prototype::new(
                "joy",
                PrototypeKind::Emotion,
                [("valence", 1.0), ("arousal", 0.3)],
                vec![Gate::new("valence", GateOperator::Gte, 0.1)],
            ),
            Prototype::new(
                "fear",
                PrototypeKind::Emotion,
                [("threat", 1.0), ("agency_control", -0.5)],
                vec![Gate::new("threat", GateOperator::Gte, 0.2)],
            ),
        ])
        .unwrap()
    }

    fn simulator() -> MonteCarloSimulator {
        MonteCarloSimulator::new(catalog(), SimulationConfig::default()).unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulationConfig {
            confidence_z: -1.0,
            ..Default::default()
        };
        assert!(MonteCarloSimulator::new(catalog(), config).is_err());
    }

    #[test]
    fn trigger_rate_within_interval() {
        let expr = ExpressionDefinition::new(
            "joyful",
            vec![ExpressionNode::compare("emotions.joy", CompareOperator::Gte, 0.3)],
        );
        let options = SimulationOptions::default().with_sample_count(2000);
        let result = simulator().simulate(&expr, &options, &mut rng()).unwrap();
        assert_eq!(result.sample_count, 2000);
        assert!(result.trigger_rate > 0.0 && result.trigger_rate < 1.0);
        assert!(result.confidence_interval.contains(result.trigger_rate));
        assert_eq!(result.error_count, 0);
        assert!(result.stored_contexts.is_empty());
    }

    #[test]
    fn empty_prerequisites_always_trigger() {
        let expr = ExpressionDefinition::new("always", vec![]);
        let options = SimulationOptions::default().with_sample_count(100);
        let result = simulator().simulate(&expr, &options, &mut rng()).unwrap();
        assert_eq!(result.trigger_rate, 1.0);
        assert_eq!(result.confidence_interval.high, 1.0);
    }

    #[test]
    fn zero_samples_give_zero_result() {
        let expr = ExpressionDefinition::new("always", vec![]);
        let options = SimulationOptions::default().with_sample_count(0);
        let result = simulator().simulate(&expr, &options, &mut rng()).unwrap();
        assert_eq!(result.sample_count, 0);
        assert_eq!(result.trigger_rate, 0.0);
        assert_eq!(result.confidence_interval.low, 0.0);
        assert_eq!(result.confidence_interval.high, 0.0);
    }

    #[test]
    fn reservoir_keeps_bounded_contexts() {
        let expr = ExpressionDefinition::new(
            "fearful",
            vec![ExpressionNode::compare("emotions.fear", CompareOperator::Gte, 0.2)],
        );
        let options = SimulationOptions::default()
            .with_sample_count(500)
            .storing_samples(10);
        let result = simulator().simulate(&expr, &options, &mut rng()).unwrap();
        assert_eq!(result.stored_contexts.len(), 10);
        assert!(result
            .stored_contexts
            .windows(2)
            .all(|w| w[0].trial < w[1].trial));
    }

    #[test]
    fn malformed_expression_fails_before_sampling() {
        let expr = ExpressionDefinition::new(
            "bad",
            vec![ExpressionNode::compare("emotions.", CompareOperator::Gte, 0.2)],
        );
        let options = SimulationOptions::default().with_sample_count(10);
        assert!(simulator().simulate(&expr, &options, &mut rng()).is_err());
    }

    #[test]
    fn partitions_merge_into_one_result() {
        let sim = simulator();
        let expr = ExpressionDefinition::new(
            "joyful",
            vec![ExpressionNode::compare("emotions.joy", CompareOperator::Gte, 0.3)],
        );
        let compiled = CompiledExpression::compile(&expr).unwrap();
        let options = SimulationOptions::default().with_mode(SamplingMode::Dynamic);
        let mut r = rng();
        let a = sim.run_partition(&compiled, &options, 300, 0, &mut r);
        let b = sim.run_partition(&compiled, &options, 200, 300, &mut r);
        let expected = a.accumulator.trigger_count() + b.accumulator.trigger_count();
        let result = sim.finish(&compiled, &options, vec![a, b], &mut r).unwrap();
        assert_eq!(result.sample_count, 500);
        assert_eq!(result.trigger_count, expected);
        assert_eq!(result.sampling_mode, SamplingMode::Dynamic);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let config = SimulationConfig {
            seed: Some(99),
            ..Default::default()
        };
        let sim = MonteCarloSimulator::new(catalog(), config).unwrap();
        let expr = ExpressionDefinition::new(
            "joyful",
            vec![ExpressionNode::compare("emotions.joy", CompareOperator::Gte, 0.3)],
        );
        let options = sim.default_options().with_sample_count(1000);
        let a = sim.simulate_seeded(&expr, &options).unwrap();
        let b = sim.simulate_seeded(&expr, &options).unwrap();
        assert_eq!(a.trigger_count, b.trigger_count);
        assert_ne!(a.run_id, b.run_id);
    }
}
