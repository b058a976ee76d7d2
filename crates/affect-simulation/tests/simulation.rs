//! End-to-end simulation behaviour over a small prototype catalog.

use affect_simulation::*;
use affect_types::{
    CompareOperator, ExpressionDefinition, ExpressionNode, PrototypeCatalog, SamplingMode,
    SimulationConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn catalog() -> PrototypeCatalog {
    PrototypeCatalog::from_json(
        r#"[
            {"id": "joy", "type": "emotion", "weights": {"valence": 1.0},
             "gates": ["valence >= 0.1"]},
            {"id": "lust", "type": "sexual", "weights": {"sexual_arousal": 1.0}},
            {"id": "serene", "type": "mood", "weights": {"valence": 0.5, "threat": -0.5}}
        ]"#,
    )
    .unwrap()
}

fn simulator() -> MonteCarloSimulator {
    MonteCarloSimulator::new(catalog(), SimulationConfig::default()).unwrap()
}

fn leaf(var: &str, op: CompareOperator, value: f64) -> ExpressionNode {
    ExpressionNode::compare(var, op, value)
}

fn run(expr: &ExpressionDefinition, samples: usize, mode: SamplingMode, seed: u64) -> SimulationResult {
    let options = SimulationOptions::default()
        .with_sample_count(samples)
        .with_mode(mode);
    simulator()
        .simulate(expr, &options, &mut StdRng::seed_from_u64(seed))
        .unwrap()
}

#[test]
fn dynamic_deltas_mostly_stay_within_one_sigma() {
    let within = ExpressionDefinition::new(
        "within",
        vec![
            leaf("moodAxisDeltas.valence", CompareOperator::Lte, 15.0),
            leaf("moodAxisDeltas.valence", CompareOperator::Gte, -15.0),
        ],
    );
    let result = run(&within, 4000, SamplingMode::Dynamic, 1);
    assert!(result.trigger_rate > 0.6, "within rate {}", result.trigger_rate);

    let beyond = ExpressionDefinition::new(
        "beyond",
        vec![ExpressionNode::Or(vec![
            leaf("moodAxisDeltas.valence", CompareOperator::Gt, 15.0),
            leaf("moodAxisDeltas.valence", CompareOperator::Lt, -15.0),
        ])],
    );
    let result = run(&beyond, 4000, SamplingMode::Dynamic, 2);
    assert!(
        result.trigger_rate > 0.05 && result.trigger_rate < 0.5,
        "beyond rate {}",
        result.trigger_rate
    );
}

#[test]
fn previous_states_reach_meaningful_intensity() {
    let expr = ExpressionDefinition::new(
        "previous",
        vec![
            leaf("previousEmotions.joy", CompareOperator::Gte, 0.0),
            leaf("previousSexualStates.lust", CompareOperator::Gte, 0.0),
            leaf("previousMoodStates.serene", CompareOperator::Gte, 0.0),
        ],
    );
    let result = run(&expr, 2000, SamplingMode::Dynamic, 3);
    for id in ["0.0", "0.1", "0.2"] {
        let stat = result.clause(id).unwrap();
        assert!(stat.observed_max.unwrap() >= 0.3, "{} max {:?}", id, stat.observed_max);
    }
}

#[test]
fn persistence_expression_fires() {
    let expr = ExpressionDefinition::new(
        "joy_persists",
        vec![
            leaf("emotions.joy", CompareOperator::Gte, 0.4),
            leaf("previousEmotions.joy", CompareOperator::Gte, 0.4),
        ],
    );
    let result = run(&expr, 2000, SamplingMode::Dynamic, 4);
    assert!(result.trigger_count > 0);
}

#[test]
fn seeded_static_runs_agree() {
    let expr = ExpressionDefinition::new(
        "joyful",
        vec![leaf("emotions.joy", CompareOperator::Gte, 0.3)],
    );
    let a = run(&expr, 4000, SamplingMode::Static, 10);
    let b = run(&expr, 4000, SamplingMode::Static, 20);
    assert!((a.trigger_rate - b.trigger_rate).abs() < 0.05);
}

#[test]
fn three_rare_children_are_overconstrained() {
    let expr = ExpressionDefinition::new(
        "rare",
        vec![ExpressionNode::And(vec![
            leaf("moodAxes.valence", CompareOperator::Gte, 84.0),
            leaf("moodAxes.threat", CompareOperator::Gte, 84.0),
            leaf("moodAxes.arousal", CompareOperator::Gte, 84.0),
        ])],
    );
    let result = run(&expr, 10_000, SamplingMode::Static, 5);
    let flagged = result
        .overconstrained_conjunctions
        .iter()
        .find(|c| c.clause_id == "0.0")
        .expect("inner conjunction flagged");
    assert_eq!(flagged.rare_child_ids.len(), 3);
    assert!((flagged.naive_joint_probability - 0.000512).abs() < 2e-4);
}

#[test]
fn last_mile_blockers_are_attributed() {
    let expr = ExpressionDefinition::new(
        "narrow",
        vec![
            leaf("moodAxes.valence", CompareOperator::Gte, 0.0),
            leaf("moodAxes.threat", CompareOperator::Gte, 90.0),
        ],
    );
    let result = run(&expr, 2000, SamplingMode::Static, 6);
    let blockers = rank_last_mile_blockers(&result.clause_statistics, 1);
    assert_eq!(blockers[0].clause_id, "0.1");
    let threat = result.clause("0.1").unwrap();
    assert!(threat.last_mile_fail_count > threat.evaluated_count / 3);
}

#[test]
fn sensitivity_sweep_over_retained_samples() {
    let expr = ExpressionDefinition::new(
        "joyful",
        vec![leaf("emotions.joy", CompareOperator::Gte, 0.9)],
    );
    let options = SimulationOptions::default()
        .with_sample_count(1000)
        .storing_samples(200);
    let result = simulator()
        .simulate(&expr, &options, &mut StdRng::seed_from_u64(8))
        .unwrap();
    let sweep = SensitivityAnalyzer::new()
        .sweep_threshold(&expr, "0.0", &[0.1, 0.5, 0.9], &result.stored_contexts)
        .unwrap();
    assert_eq!(sweep.sample_count, 200);
    let rates: Vec<f64> = sweep.points.iter().map(|p| p.trigger_rate).collect();
    assert!(rates[0] >= rates[1] && rates[1] >= rates[2]);
    assert!(rates[0] > 0.2);
}

#[test]
fn results_serialize_with_camel_case_fields() {
    let expr = ExpressionDefinition::new("joyful", vec![leaf("emotions.joy", CompareOperator::Gte, 0.3)]);
    let result = run(&expr, 50, SamplingMode::Static, 9);
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("triggerRate").is_some());
    assert!(json.get("confidenceInterval").is_some());
    assert!(json["clauseStatistics"][0].get("lastMileFailCount").is_some());
}
