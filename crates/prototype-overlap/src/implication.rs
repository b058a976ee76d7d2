//! Deterministic gate implication by interval arithmetic.
//!
//! Each prototype's gates are intersected per axis into an interval
//! `[lower, upper]` with strictness flags. Prototype A implies B when A's
//! interval lies inside B's on every axis either of them constrains. An
//! absent bound stands for the axis's normalized domain bound when the axis
//! is known and for infinity otherwise.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use affect_types::{AxisRef, Gate, Prototype};

/// One end of an interval.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Bound {
    pub value: f64,
    /// The bound excludes `value` itself.
    pub strict: bool,
}

impl Bound {
    fn inclusive(value: f64) -> Self {
        Self {
            value,
            strict: false,
        }
    }
}

/// Intersection of every gate a prototype places on one axis.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisInterval {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
    pub unsatisfiable: bool,
}

impl AxisInterval {
    pub fn unbounded() -> Self {
        Self {
            lower: None,
            upper: None,
            unsatisfiable: false,
        }
    }

    /// Narrow the interval by one gate.
    pub fn constrain(&mut self, gate: &Gate) {
        let bound = Bound {
            value: gate.threshold,
            strict: gate.operator.is_strict(),
        };
        if gate.operator.is_lower_bound() {
            self.lower = Some(match self.lower {
                Some(cur) if tighter_lower(cur, bound) => cur,
                _ => bound,
            });
        } else {
            self.upper = Some(match self.upper {
                Some(cur) if tighter_upper(cur, bound) => cur,
                _ => bound,
            });
        }
    }

    /// Recompute emptiness against an optional axis domain.
    fn settle(&mut self, domain: Option<(f64, f64)>) {
        let lower = effective_lower(self.lower, domain);
        let upper = effective_upper(self.upper, domain);
        self.unsatisfiable = match (lower, upper) {
            (Some(l), Some(u)) => l.value > u.value || (l.value == u.value && (l.strict || u.strict)),
            _ => false,
        };
    }
}

impl fmt::Display for AxisInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unsatisfiable {
            return f.write_str("∅");
        }
        match self.lower {
            Some(b) => write!(f, "{}{}", if b.strict { "(" } else { "[" }, b.value)?,
            None => f.write_str("(-inf")?,
        }
        f.write_str(", ")?;
        match self.upper {
            Some(b) => write!(f, "{}{}", b.value, if b.strict { ")" } else { "]" }),
            None => f.write_str("+inf)"),
        }
    }
}

/// `cur` is at least as tight a lower bound as `new`.
fn tighter_lower(cur: Bound, new: Bound) -> bool {
    cur.value > new.value || (cur.value == new.value && (cur.strict || !new.strict))
}

/// `cur` is at least as tight an upper bound as `new`.
fn tighter_upper(cur: Bound, new: Bound) -> bool {
    cur.value < new.value || (cur.value == new.value && (cur.strict || !new.strict))
}

fn effective_lower(bound: Option<Bound>, domain: Option<(f64, f64)>) -> Option<Bound> {
    match (bound, domain) {
        (Some(b), Some((lo, _))) if b.value < lo => Some(Bound::inclusive(lo)),
        (Some(b), _) => Some(b),
        (None, Some((lo, _))) => Some(Bound::inclusive(lo)),
        (None, None) => None,
    }
}

fn effective_upper(bound: Option<Bound>, domain: Option<(f64, f64)>) -> Option<Bound> {
    match (bound, domain) {
        (Some(b), Some((_, hi))) if b.value > hi => Some(Bound::inclusive(hi)),
        (Some(b), _) => Some(b),
        (None, Some((_, hi))) => Some(Bound::inclusive(hi)),
        (None, None) => None,
    }
}

/// Whether `inner ⊆ outer` on an axis with the given domain.
fn contained(inner: &AxisInterval, outer: &AxisInterval, domain: Option<(f64, f64)>) -> bool {
    if inner.unsatisfiable {
        return true;
    }
    if outer.unsatisfiable {
        return false;
    }
    let lower_ok = match (effective_lower(inner.lower, domain), effective_lower(outer.lower, domain)) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(i), Some(o)) => tighter_lower(i, o),
    };
    let upper_ok = match (effective_upper(inner.upper, domain), effective_upper(outer.upper, domain)) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(i), Some(o)) => tighter_upper(i, o),
    };
    lower_ok && upper_ok
}

/// Per-axis intervals of one prototype.
pub fn gate_intervals(prototype: &Prototype) -> BTreeMap<String, AxisInterval> {
    let mut intervals: BTreeMap<String, AxisInterval> = BTreeMap::new();
    for gate in &prototype.gates {
        intervals
            .entry(gate.axis.clone())
            .or_insert_with(AxisInterval::unbounded)
            .constrain(gate);
    }
    for (axis, interval) in intervals.iter_mut() {
        interval.settle(domain_of(axis));
    }
    intervals
}

fn domain_of(axis: &str) -> Option<(f64, f64)> {
    AxisRef::parse(axis).map(|a| a.normalized_domain())
}

// ── Result ──────────────────────────────────────────────────────────────

/// How A's gate region relates to B's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateRelation {
    Equal,
    /// A's region lies strictly inside B's.
    Narrower,
    Wider,
    Incomparable,
}

/// Interval comparison on one axis.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisComparison {
    pub axis: String,
    pub a_interval: AxisInterval,
    pub b_interval: AxisInterval,
    pub a_within_b: bool,
    pub b_within_a: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateImplicationResult {
    pub a_implies_b: bool,
    pub b_implies_a: bool,
    pub relation: GateRelation,
    pub evidence: Vec<AxisComparison>,
    /// Axes on which containment fails in at least one direction.
    pub counter_example_axes: Vec<String>,
    pub a_unsatisfiable: bool,
    pub b_unsatisfiable: bool,
}

impl GateImplicationResult {
    /// Exactly one direction of implication holds.
    pub fn is_one_way(&self) -> bool {
        self.a_implies_b != self.b_implies_a
    }

    /// A's interval on `axis`, unbounded when A does not gate it.
    pub fn a_interval(&self, axis: &str) -> AxisInterval {
        self.evidence
            .iter()
            .find(|e| e.axis == axis)
            .map(|e| e.a_interval.clone())
            .unwrap_or_else(AxisInterval::unbounded)
    }

    pub fn b_interval(&self, axis: &str) -> AxisInterval {
        self.evidence
            .iter()
            .find(|e| e.axis == axis)
            .map(|e| e.b_interval.clone())
            .unwrap_or_else(AxisInterval::unbounded)
    }
}

/// Compares gate regions of two prototypes without sampling.
#[derive(Clone, Copy, Debug, Default)]
pub struct GateImplicationEvaluator;

impl GateImplicationEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, a: &Prototype, b: &Prototype) -> GateImplicationResult {
        let a_map = gate_intervals(a);
        let b_map = gate_intervals(b);
        let a_unsatisfiable = a_map.values().any(|i| i.unsatisfiable);
        let b_unsatisfiable = b_map.values().any(|i| i.unsatisfiable);

        let axes: BTreeSet<&String> = a_map.keys().chain(b_map.keys()).collect();
        let mut evidence = Vec::with_capacity(axes.len());
        let mut counter_example_axes = Vec::new();
        let (mut a_in_b, mut b_in_a) = (true, true);

        for axis in axes {
            let domain = domain_of(axis);
            let a_interval = a_map.get(axis).cloned().unwrap_or_else(AxisInterval::unbounded);
            let b_interval = b_map.get(axis).cloned().unwrap_or_else(AxisInterval::unbounded);
            let a_within_b = contained(&a_interval, &b_interval, domain);
            let b_within_a = contained(&b_interval, &a_interval, domain);
            a_in_b &= a_within_b;
            b_in_a &= b_within_a;
            if !(a_within_b && b_within_a) {
                counter_example_axes.push(axis.clone());
            }
            evidence.push(AxisComparison {
                axis: axis.clone(),
                a_interval,
                b_interval,
                a_within_b,
                b_within_a,
            });
        }

        // An empty region is contained in every region.
        let a_implies_b = a_unsatisfiable || a_in_b;
        let b_implies_a = b_unsatisfiable || b_in_a;
        let relation = match (a_implies_b, b_implies_a) {
            (true, true) => GateRelation::Equal,
            (true, false) => GateRelation::Narrower,
            (false, true) => GateRelation::Wider,
            (false, false) => GateRelation::Incomparable,
        };

        GateImplicationResult {
            a_implies_b,
            b_implies_a,
            relation,
            evidence,
            counter_example_axes,
            a_unsatisfiable,
            b_unsatisfiable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use affect_types::PrototypeKind;

    fn proto(gates: &[&str]) -> Prototype {
        Prototype::new(
            "p",
            PrototypeKind::Emotion,
            [("valence", 1.0)],
            gates.iter().map(|g| g.parse().unwrap()).collect(),
        )
    }

    #[test]
    fn self_implication_is_equal() {
        let a = proto(&["valence >= 0.2", "threat <= 0.3"]);
        let r = GateImplicationEvaluator::new().evaluate(&a, &a);
        assert!(r.a_implies_b && r.b_implies_a);
        assert_eq!(r.relation, GateRelation::Equal);
        assert!(r.counter_example_axes.is_empty());
    }

    #[test]
    fn tighter_threshold_is_narrower() {
        let a = proto(&["valence >= 0.5"]);
        let b = proto(&["valence >= 0.2"]);
        let r = GateImplicationEvaluator::new().evaluate(&a, &b);
        assert_eq!(r.relation, GateRelation::Narrower);
        let r = GateImplicationEvaluator::new().evaluate(&b, &a);
        assert_eq!(r.relation, GateRelation::Wider);
        assert_eq!(r.counter_example_axes, vec!["valence"]);
    }

    #[test]
    fn strictness_breaks_ties() {
        let a = proto(&["valence > 0.2"]);
        let b = proto(&["valence >= 0.2"]);
        let r = GateImplicationEvaluator::new().evaluate(&a, &b);
        assert!(r.a_implies_b);
        assert!(!r.b_implies_a);
    }

    #[test]
    fn extra_gate_narrows() {
        let a = proto(&["valence >= 0.2", "threat <= 0.2"]);
        let b = proto(&["valence >= 0.2"]);
        let r = GateImplicationEvaluator::new().evaluate(&a, &b);
        assert_eq!(r.relation, GateRelation::Narrower);
        assert_eq!(r.a_interval("threat").upper.map(|u| u.value), Some(0.2));
        assert!(r.b_interval("threat").upper.is_none());
    }

    #[test]
    fn bounds_at_the_domain_edge_are_redundant() {
        let a = proto(&["valence >= -1.0"]);
        let b = proto(&[]);
        let r = GateImplicationEvaluator::new().evaluate(&a, &b);
        assert_eq!(r.relation, GateRelation::Equal);
    }

    #[test]
    fn contradictory_gates_are_unsatisfiable() {
        let a = proto(&["valence >= 0.5", "valence < 0.5"]);
        let b = proto(&["threat >= 0.9"]);
        let r = GateImplicationEvaluator::new().evaluate(&a, &b);
        assert!(r.a_unsatisfiable);
        assert!(r.a_implies_b);
        assert!(!r.b_implies_a);

        let beyond = proto(&["sexual_arousal > 1.0"]);
        let r = GateImplicationEvaluator::new().evaluate(&beyond, &b);
        assert!(r.a_unsatisfiable);
    }

    #[test]
    fn crossing_intervals_are_incomparable() {
        let a = proto(&["valence >= 0.2", "valence <= 0.6"]);
        let b = proto(&["valence >= 0.4"]);
        let r = GateImplicationEvaluator::new().evaluate(&a, &b);
        assert_eq!(r.relation, GateRelation::Incomparable);
    }

    #[test]
    fn unknown_axes_are_unbounded() {
        let a = proto(&["mystery >= 0.2"]);
        let b = proto(&[]);
        let r = GateImplicationEvaluator::new().evaluate(&a, &b);
        assert!(r.a_implies_b);
        assert!(!r.b_implies_a);
    }

    #[test]
    fn interval_display() {
        let a = proto(&["valence > 0.2", "valence <= 0.6"]);
        let intervals = gate_intervals(&a);
        assert_eq!(intervals["valence"].to_string(), "(0.2, 0.6]");
    }
}
