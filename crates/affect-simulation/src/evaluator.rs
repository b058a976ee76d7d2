//! Expression evaluation with per-clause attribution.
//!
//! Expressions are compiled once into a flat pre-order node list with stable
//! clause ids (`"0"` is the root conjunction of prerequisites, `"0.1"` its
//! second child, and so on). Evaluation visits every node, with no short
//! circuit, so clause statistics cover the whole tree on every trial.

use serde::Serialize;

use affect_types::{
    CompareOperator, Comparison, DefinitionResult, ExpressionDefinition, ExpressionNode, Operand,
    MAX_EXPRESSION_DEPTH,
};

use crate::context::Context;
use crate::error::{EvaluationError, SimResult, SimulationError};
use crate::statistics::get_nested_value;

/// Tolerance for `==` / `!=` on numbers.
const EQ_TOLERANCE: f64 = 1e-9;

// ── Resolution ──────────────────────────────────────────────────────────

/// A value looked up from a context.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

/// Source of variable values for expression leaves.
pub trait VariableResolver {
    /// Look up a dotted path. `None` means undefined.
    fn lookup(&self, path: &str) -> Option<ResolvedValue>;
}

impl VariableResolver for Context {
    fn lookup(&self, path: &str) -> Option<ResolvedValue> {
        self.resolve(path).map(ResolvedValue::Number)
    }
}

impl VariableResolver for serde_json::Value {
    fn lookup(&self, path: &str) -> Option<ResolvedValue> {
        match get_nested_value(self, path)? {
            serde_json::Value::Number(n) => n.as_f64().map(ResolvedValue::Number),
            serde_json::Value::Bool(b) => Some(ResolvedValue::Bool(*b)),
            serde_json::Value::String(s) => Some(ResolvedValue::Text(s.clone())),
            _ => None,
        }
    }
}

// ── Compiled form ───────────────────────────────────────────────────────

/// Node type, as reported in statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseType {
    And,
    Or,
    Leaf,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClauseKind {
    And { children: Vec<usize> },
    Or { children: Vec<usize> },
    Leaf(Comparison),
}

/// One node of a compiled expression.
#[derive(Clone, Debug, PartialEq)]
pub struct ClauseNode {
    pub id: String,
    pub depth: usize,
    pub kind: ClauseKind,
    pub description: String,
}

impl ClauseNode {
    pub fn clause_type(&self) -> ClauseType {
        match self.kind {
            ClauseKind::And { .. } => ClauseType::And,
            ClauseKind::Or { .. } => ClauseType::Or,
            ClauseKind::Leaf(_) => ClauseType::Leaf,
        }
    }

    pub fn children(&self) -> &[usize] {
        match &self.kind {
            ClauseKind::And { children } | ClauseKind::Or { children } => children,
            ClauseKind::Leaf(_) => &[],
        }
    }

    pub fn comparison(&self) -> Option<&Comparison> {
        match &self.kind {
            ClauseKind::Leaf(cmp) => Some(cmp),
            _ => None,
        }
    }

    /// Numeric threshold of a leaf, if any.
    pub fn threshold(&self) -> Option<f64> {
        self.comparison().and_then(|c| c.value.as_number())
    }
}

/// An expression flattened into pre-order clause nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledExpression {
    expression_id: String,
    nodes: Vec<ClauseNode>,
}

impl CompiledExpression {
    /// Validate and flatten a definition.
    pub fn compile(definition: &ExpressionDefinition) -> DefinitionResult<Self> {
        definition.validate()?;
        let mut nodes = Vec::new();
        flatten(&definition.root(), "0".to_string(), 0, &mut nodes);
        Ok(Self {
            expression_id: definition.id.clone(),
            nodes,
        })
    }

    pub fn expression_id(&self) -> &str {
        &self.expression_id
    }

    pub fn nodes(&self) -> &[ClauseNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, clause_id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == clause_id)
    }

    pub fn leaf_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n.kind, ClauseKind::Leaf(_)))
            .map(|(i, _)| i)
    }

    /// Copy of this expression with one numeric leaf's threshold replaced.
    pub fn with_threshold(&self, clause_id: &str, threshold: f64) -> SimResult<Self> {
        let idx = self
            .find(clause_id)
            .ok_or_else(|| SimulationError::UnknownClause(clause_id.to_string()))?;
        let invalid = |reason: &str| SimulationError::InvalidClause {
            clause_id: clause_id.to_string(),
            reason: reason.to_string(),
        };
        if !threshold.is_finite() {
            return Err(invalid("threshold is not finite"));
        }
        let mut copy = self.clone();
        let node = &mut copy.nodes[idx];
        match &mut node.kind {
            ClauseKind::Leaf(cmp) if cmp.value.as_number().is_some() => {
                cmp.value = Operand::Number(threshold);
                node.description = cmp.to_string();
            }
            ClauseKind::Leaf(_) => return Err(invalid("operand is not numeric")),
            _ => return Err(invalid("not a comparison")),
        }
        Ok(copy)
    }

    /// Root outcome if leaf `leaf` had the opposite result.
    pub fn passes_with_flipped(
        &self,
        outcomes: &[ClauseOutcome],
        leaf: usize,
    ) -> Result<bool, EvaluationError> {
        if leaf >= self.nodes.len() || outcomes.len() != self.nodes.len() {
            return Err(EvaluationError::ClauseOutOfBounds(leaf));
        }
        Ok(self.recompute(0, outcomes, leaf))
    }

    fn recompute(&self, idx: usize, outcomes: &[ClauseOutcome], flipped: usize) -> bool {
        match &self.nodes[idx].kind {
            ClauseKind::And { children } => children
                .iter()
                .all(|&c| self.recompute(c, outcomes, flipped)),
            ClauseKind::Or { children } => children
                .iter()
                .any(|&c| self.recompute(c, outcomes, flipped)),
            ClauseKind::Leaf(_) => outcomes[idx].passed != (idx == flipped),
        }
    }
}

fn flatten(node: &ExpressionNode, id: String, depth: usize, nodes: &mut Vec<ClauseNode>) -> usize {
    let idx = nodes.len();
    nodes.push(ClauseNode {
        id: id.clone(),
        depth,
        kind: ClauseKind::And { children: vec![] },
        description: String::new(),
    });
    let (kind, description) = match node {
        ExpressionNode::And(children) => {
            let ids = flatten_children(children, &id, depth, nodes);
            let desc = format!("all of {} clauses", ids.len());
            (ClauseKind::And { children: ids }, desc)
        }
        ExpressionNode::Or(children) => {
            let ids = flatten_children(children, &id, depth, nodes);
            let desc = format!("any of {} clauses", ids.len());
            (ClauseKind::Or { children: ids }, desc)
        }
        ExpressionNode::Compare(cmp) => (ClauseKind::Leaf(cmp.clone()), cmp.to_string()),
    };
    nodes[idx].kind = kind;
    nodes[idx].description = description;
    idx
}

fn flatten_children(
    children: &[ExpressionNode],
    parent: &str,
    depth: usize,
    nodes: &mut Vec<ClauseNode>,
) -> Vec<usize> {
    children
        .iter()
        .enumerate()
        .map(|(i, c)| flatten(c, format!("{}.{}", parent, i), depth + 1, nodes))
        .collect()
}

// ── Evaluation ──────────────────────────────────────────────────────────

/// Result of one node on one trial.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseOutcome {
    pub passed: bool,
    /// Numeric value seen by a leaf.
    pub observed: Option<f64>,
    /// The leaf's variable was undefined.
    pub missing: bool,
}

/// Human-readable record of one node's outcome.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseAttribution {
    pub clause_id: String,
    pub kind: ClauseType,
    pub passed: bool,
    pub observed_value: Option<f64>,
    pub message: String,
}

/// Outcome of evaluating a compiled expression once.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Evaluation {
    pub passed: bool,
    /// Indexed like [`CompiledExpression::nodes`].
    pub outcomes: Vec<ClauseOutcome>,
}

impl Evaluation {
    /// Per-node attribution messages.
    pub fn attribution(&self, compiled: &CompiledExpression) -> Vec<ClauseAttribution> {
        compiled
            .nodes()
            .iter()
            .zip(&self.outcomes)
            .map(|(node, outcome)| {
                let verdict = if outcome.passed { "passed" } else { "failed" };
                let message = match &node.kind {
                    ClauseKind::Leaf(cmp) if outcome.missing => {
                        format!("{} failed: {} is undefined", node.description, cmp.var)
                    }
                    ClauseKind::Leaf(_) => match outcome.observed {
                        Some(v) => format!("{} {} (observed {})", node.description, verdict, v),
                        None => format!("{} {} (type mismatch)", node.description, verdict),
                    },
                    _ => {
                        let failing = node
                            .children()
                            .iter()
                            .filter(|&&c| !self.outcomes[c].passed)
                            .count();
                        format!("{} {} ({} failing)", node.description, verdict, failing)
                    }
                };
                ClauseAttribution {
                    clause_id: node.id.clone(),
                    kind: node.clause_type(),
                    passed: outcome.passed,
                    observed_value: outcome.observed,
                    message,
                }
            })
            .collect()
    }
}

/// Evaluates expressions against any [`VariableResolver`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every node of a compiled expression.
    pub fn evaluate<V: VariableResolver + ?Sized>(
        &self,
        compiled: &CompiledExpression,
        resolver: &V,
    ) -> Result<Evaluation, EvaluationError> {
        let mut outcomes = vec![ClauseOutcome::default(); compiled.len()];
        let passed = if compiled.is_empty() {
            true
        } else {
            self.visit(compiled, 0, resolver, &mut outcomes)?
        };
        Ok(Evaluation { passed, outcomes })
    }

    /// Evaluate an uncompiled tree; no attribution is kept.
    pub fn evaluate_node<V: VariableResolver + ?Sized>(
        &self,
        node: &ExpressionNode,
        resolver: &V,
    ) -> Result<bool, EvaluationError> {
        let depth = node.depth();
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(EvaluationError::DepthExceeded {
                depth,
                limit: MAX_EXPRESSION_DEPTH,
            });
        }
        self.eval_tree(node, resolver)
    }

    fn eval_tree<V: VariableResolver + ?Sized>(
        &self,
        node: &ExpressionNode,
        resolver: &V,
    ) -> Result<bool, EvaluationError> {
        match node {
            ExpressionNode::And(children) => {
                let mut all = true;
                for c in children {
                    all &= self.eval_tree(c, resolver)?;
                }
                Ok(all)
            }
            ExpressionNode::Or(children) => {
                let mut any = false;
                for c in children {
                    any |= self.eval_tree(c, resolver)?;
                }
                Ok(any)
            }
            ExpressionNode::Compare(cmp) => Ok(leaf(cmp, resolver)?.passed),
        }
    }

    fn visit<V: VariableResolver + ?Sized>(
        &self,
        compiled: &CompiledExpression,
        idx: usize,
        resolver: &V,
        outcomes: &mut [ClauseOutcome],
    ) -> Result<bool, EvaluationError> {
        let node = compiled
            .nodes()
            .get(idx)
            .ok_or(EvaluationError::ClauseOutOfBounds(idx))?;
        let outcome = match &node.kind {
            ClauseKind::And { children } => {
                let mut all = true;
                for &c in children {
                    all &= self.visit(compiled, c, resolver, outcomes)?;
                }
                ClauseOutcome {
                    passed: all,
                    ..Default::default()
                }
            }
            ClauseKind::Or { children } => {
                let mut any = false;
                for &c in children {
                    any |= self.visit(compiled, c, resolver, outcomes)?;
                }
                ClauseOutcome {
                    passed: any,
                    ..Default::default()
                }
            }
            ClauseKind::Leaf(cmp) => leaf(cmp, resolver)?,
        };
        let passed = outcome.passed;
        outcomes[idx] = outcome;
        Ok(passed)
    }
}

fn leaf<V: VariableResolver + ?Sized>(
    cmp: &Comparison,
    resolver: &V,
) -> Result<ClauseOutcome, EvaluationError> {
    let Some(value) = resolver.lookup(&cmp.var) else {
        return Ok(ClauseOutcome {
            passed: false,
            observed: None,
            missing: true,
        });
    };
    let observed = match &value {
        ResolvedValue::Number(n) if !n.is_finite() => {
            return Err(EvaluationError::NonFiniteValue {
                path: cmp.var.clone(),
                value: *n,
            });
        }
        ResolvedValue::Number(n) => Some(*n),
        _ => None,
    };
    Ok(ClauseOutcome {
        passed: compare(cmp.op, &value, &cmp.value),
        observed,
        missing: false,
    })
}

/// Mismatched operand types fail closed, including under `!=`.
fn compare(op: CompareOperator, left: &ResolvedValue, right: &Operand) -> bool {
    match (left, right) {
        (ResolvedValue::Number(a), Operand::Number(b)) => match op {
            CompareOperator::Gte => a >= b,
            CompareOperator::Lte => a <= b,
            CompareOperator::Gt => a > b,
            CompareOperator::Lt => a < b,
            CompareOperator::Eq => (a - b).abs() <= EQ_TOLERANCE,
            CompareOperator::Ne => (a - b).abs() > EQ_TOLERANCE,
        },
        (ResolvedValue::Bool(a), Operand::Bool(b)) => match op {
            CompareOperator::Eq => a == b,
            CompareOperator::Ne => a != b,
            _ => false,
        },
        (ResolvedValue::Text(a), Operand::Text(b)) => match op {
            CompareOperator::Eq => a == b,
            CompareOperator::Ne => a != b,
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(var: &str, op: CompareOperator, value: f64) -> ExpressionNode {
        ExpressionNode::compare(var, op, value)
    }

    fn compiled(nodes: Vec<ExpressionNode>) -> CompiledExpression {
        CompiledExpression::compile(&ExpressionDefinition::new("test", nodes)).unwrap()
    }

    #[test]
    fn clause_ids_are_pre_order() {
        let c = compiled(vec![ExpressionNode::Or(vec![
            leaf("a.x", CompareOperator::Gt, 1.0),
            leaf("a.y", CompareOperator::Gt, 1.0),
        ])]);
        let ids: Vec<&str> = c.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "0.0", "0.0.0", "0.0.1"]);
        assert_eq!(c.nodes()[2].depth, 2);
        assert_eq!(c.leaf_indices().count(), 2);
    }

    #[test]
    fn no_short_circuit() {
        let c = compiled(vec![
            leaf("emotions.joy", CompareOperator::Gte, 0.9),
            leaf("emotions.fear", CompareOperator::Lt, 0.2),
        ]);
        let ctx = json!({"emotions": {"joy": 0.1, "fear": 0.1}});
        let eval = ExpressionEvaluator::new().evaluate(&c, &ctx).unwrap();
        assert!(!eval.passed);
        assert!(!eval.outcomes[1].passed);
        assert!(eval.outcomes[2].passed);
        assert_eq!(eval.outcomes[2].observed, Some(0.1));
    }

    #[test]
    fn empty_expression_is_true() {
        let c = compiled(vec![]);
        let eval = ExpressionEvaluator::new().evaluate(&c, &json!({})).unwrap();
        assert!(eval.passed);
    }

    #[test]
    fn missing_variable_fails_and_is_flagged() {
        let c = compiled(vec![leaf("emotions.joy", CompareOperator::Lt, 1.0)]);
        let eval = ExpressionEvaluator::new().evaluate(&c, &json!({"emotions": {}})).unwrap();
        assert!(!eval.passed);
        assert!(eval.outcomes[1].missing);
        let attribution = eval.attribution(&c);
        assert!(attribution[1].message.contains("undefined"));
    }

    #[test]
    fn type_mismatch_fails_closed() {
        let node = ExpressionNode::Compare(Comparison::new(
            "state.label",
            CompareOperator::Ne,
            Operand::Number(1.0),
        ));
        let ctx = json!({"state": {"label": "calm", "flag": true}});
        let ev = ExpressionEvaluator::new();
        assert!(!ev.evaluate_node(&node, &ctx).unwrap());

        let text = ExpressionNode::Compare(Comparison::new(
            "state.label",
            CompareOperator::Eq,
            Operand::Text("calm".into()),
        ));
        assert!(ev.evaluate_node(&text, &ctx).unwrap());

        let flag = ExpressionNode::Compare(Comparison::new(
            "state.flag",
            CompareOperator::Gte,
            Operand::Bool(true),
        ));
        assert!(!ev.evaluate_node(&flag, &ctx).unwrap());
    }

    #[test]
    fn depth_limit_is_enforced_on_raw_trees() {
        let mut node = leaf("a.b", CompareOperator::Gt, 0.0);
        for _ in 0..MAX_EXPRESSION_DEPTH {
            node = ExpressionNode::And(vec![node]);
        }
        let err = ExpressionEvaluator::new()
            .evaluate_node(&node, &json!({"a": {"b": 1}}))
            .unwrap_err();
        assert!(matches!(err, EvaluationError::DepthExceeded { .. }));
    }

    struct NanResolver;

    impl VariableResolver for NanResolver {
        fn lookup(&self, _path: &str) -> Option<ResolvedValue> {
            Some(ResolvedValue::Number(f64::NAN))
        }
    }

    #[test]
    fn non_finite_value_is_a_fault() {
        let c = compiled(vec![leaf("emotions.joy", CompareOperator::Gte, 0.5)]);
        let err = ExpressionEvaluator::new().evaluate(&c, &NanResolver).unwrap_err();
        assert!(matches!(err, EvaluationError::NonFiniteValue { .. }));
    }

    #[test]
    fn flipping_a_sole_blocker_passes_the_root() {
        let c = compiled(vec![
            leaf("a.x", CompareOperator::Gte, 0.5),
            leaf("a.y", CompareOperator::Gte, 0.5),
        ]);
        let eval = ExpressionEvaluator::new()
            .evaluate(&c, &json!({"a": {"x": 0.9, "y": 0.1}}))
            .unwrap();
        assert!(!eval.passed);
        assert!(c.passes_with_flipped(&eval.outcomes, 2).unwrap());
        assert!(!c.passes_with_flipped(&eval.outcomes, 1).unwrap());
        assert!(c.passes_with_flipped(&eval.outcomes, 99).is_err());
    }

    #[test]
    fn with_threshold_replaces_leaf_value() {
        let c = compiled(vec![leaf("a.x", CompareOperator::Gte, 0.5)]);
        let relaxed = c.with_threshold("0.0", 0.1).unwrap();
        assert_eq!(relaxed.nodes()[1].threshold(), Some(0.1));
        assert_eq!(c.nodes()[1].threshold(), Some(0.5));
        assert!(matches!(
            c.with_threshold("0.7", 0.1),
            Err(SimulationError::UnknownClause(_))
        ));
        assert!(matches!(
            c.with_threshold("0", 0.1),
            Err(SimulationError::InvalidClause { .. })
        ));
    }

    #[test]
    fn context_resolver_reads_groups() {
        let ctx = Context::default();
        assert_eq!(ctx.lookup("emotions.joy"), None);
    }
}
