//! Property tests: gate implication and the convert-to-expression rule.

use affect_types::{Gate, GateOperator, Prototype, PrototypeKind};
use prototype_overlap::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

const AXES: [&str; 6] = ["valence", "arousal", "threat", "sexual_arousal", "harm_aversion", "mystery"];

fn arb_operator() -> impl Strategy<Value = GateOperator> {
    prop_oneof![
        Just(GateOperator::Gte),
        Just(GateOperator::Gt),
        Just(GateOperator::Lte),
        Just(GateOperator::Lt),
    ]
}

fn arb_gate() -> impl Strategy<Value = Gate> {
    (0..AXES.len(), arb_operator(), -1.2f64..1.2)
        .prop_map(|(axis, op, threshold)| Gate::new(AXES[axis], op, threshold))
}

fn arb_prototype(id: &'static str) -> impl Strategy<Value = Prototype> {
    prop::collection::vec(arb_gate(), 0..5)
        .prop_map(move |gates| Prototype::new(id, PrototypeKind::Emotion, [("valence", 1.0)], gates))
}

/// Metrics with no co-occurrence, so only implication-driven rules can match.
fn quiet_metrics(implication: GateImplicationResult) -> BehaviorMetrics {
    BehaviorMetrics {
        sample_count: 100,
        on_either_rate: 0.0,
        on_both_rate: 0.0,
        a_only_rate: 0.0,
        b_only_rate: 0.0,
        gate_overlap_ratio: 0.0,
        pearson: None,
        mean_abs_diff: 0.0,
        dominance_a: 0.0,
        dominance_b: 0.0,
        p_a_given_b: None,
        p_b_given_a: None,
        implication,
    }
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every gate set is equivalent to itself.
    #[test]
    fn self_implication_is_equal(p in arb_prototype("p")) {
        let r = GateImplicationEvaluator::new().evaluate(&p, &p);
        prop_assert!(r.a_implies_b);
        prop_assert!(r.b_implies_a);
        prop_assert_eq!(r.relation, GateRelation::Equal);
    }

    /// Swapping the arguments swaps the directions.
    #[test]
    fn implication_is_mirrored(a in arb_prototype("a"), b in arb_prototype("b")) {
        let evaluator = GateImplicationEvaluator::new();
        let ab = evaluator.evaluate(&a, &b);
        let ba = evaluator.evaluate(&b, &a);
        prop_assert_eq!(ab.a_implies_b, ba.b_implies_a);
        prop_assert_eq!(ab.b_implies_a, ba.a_implies_b);
    }

    /// Adding a gate never widens the region.
    #[test]
    fn extra_gate_implies_original(p in arb_prototype("p"), extra in arb_gate()) {
        let mut narrower = p.clone();
        narrower.gates.push(extra);
        let r = GateImplicationEvaluator::new().evaluate(&narrower, &p);
        prop_assert!(r.a_implies_b);
    }

    /// A calm variant converts exactly when its threat ceiling is low enough.
    #[test]
    fn convert_tracks_the_threat_ceiling(
        valence in -0.9f64..0.9,
        ceiling in -0.9f64..0.9,
        calm_first in any::<bool>(),
    ) {
        let base = vec![Gate::new("valence", GateOperator::Gte, valence)];
        let mut calm_gates = base.clone();
        calm_gates.push(Gate::new("threat", GateOperator::Lte, ceiling));
        let wide = Prototype::new("wide", PrototypeKind::Emotion, [("valence", 1.0)], base);
        let calm = Prototype::new("calm", PrototypeKind::Emotion, [("valence", 1.0)], calm_gates);
        let (a, b) = if calm_first { (&calm, &wide) } else { (&wide, &calm) };

        let implication = GateImplicationEvaluator::new().evaluate(a, b);
        prop_assert!(implication.is_one_way());
        let candidate = CandidateMetricsScorer::default().candidate(a, b);
        let c = OverlapClassifier::default().classify(&candidate, &quiet_metrics(implication));

        if ceiling <= CONVERT_MAX_THREAT_UPPER {
            prop_assert_eq!(c.overlap_type, OverlapType::ConvertToExpression);
        } else {
            prop_assert_eq!(c.overlap_type, OverlapType::NestedSiblings);
        }
        prop_assert_eq!(c.narrower_prototype.as_deref(), Some("calm"));
        prop_assert!((0.0..=1.0).contains(&c.confidence));
    }

    /// Without a threat bound a one-way implication only ever nests.
    #[test]
    fn narrowing_without_threat_never_converts(
        floor in -0.9f64..0.5,
        step in 0.05f64..0.4,
        narrow_first in any::<bool>(),
    ) {
        let wide = Prototype::new(
            "wide",
            PrototypeKind::Emotion,
            [("valence", 1.0)],
            vec![Gate::new("valence", GateOperator::Gte, floor)],
        );
        let narrow = Prototype::new(
            "narrow",
            PrototypeKind::Emotion,
            [("valence", 1.0)],
            vec![Gate::new("valence", GateOperator::Gte, floor + step)],
        );
        let (a, b) = if narrow_first { (&narrow, &wide) } else { (&wide, &narrow) };

        let implication = GateImplicationEvaluator::new().evaluate(a, b);
        prop_assert!(implication.is_one_way());
        let candidate = CandidateMetricsScorer::default().candidate(a, b);
        let c = OverlapClassifier::default().classify(&candidate, &quiet_metrics(implication));

        prop_assert_eq!(c.overlap_type, OverlapType::NestedSiblings);
        prop_assert!(c
            .all_matching_classifications
            .iter()
            .all(|m| m.overlap_type != OverlapType::ConvertToExpression));
        prop_assert_eq!(c.narrower_prototype.as_deref(), Some("narrow"));
    }
}
