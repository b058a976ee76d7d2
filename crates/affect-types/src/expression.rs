//! Trigger expression definitions.
//!
//! An expression is a list of prerequisites whose conjunction is the
//! trigger condition. Each prerequisite holds a boolean tree:
//!
//! ```json
//! {"and": [
//!     {"compare": {"var": "emotions.joy", "op": ">=", "value": 0.5}},
//!     {"or": [
//!         {"compare": {"var": "moodAxes.threat", "op": "<", "value": 20}},
//!         {"compare": {"var": "previousEmotions.joy", "op": ">=", "value": 0.4}}
//!     ]}
//! ]}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DefinitionError, DefinitionResult};

/// Deepest tree accepted at load time.
pub const MAX_EXPRESSION_DEPTH: usize = 64;

/// Comparison operator used by expression leaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOperator {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl CompareOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    /// Whether the comparison is ordering-based (only valid on numbers).
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Gte | Self::Lte | Self::Gt | Self::Lt)
    }

    /// `true` when a larger left-hand value makes the comparison easier to pass.
    pub fn favors_high_values(&self) -> bool {
        matches!(self, Self::Gte | Self::Gt)
    }
}

impl fmt::Display for CompareOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Right-hand side of a comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Operand {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// A leaf comparison `var op value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Dotted path into the evaluation context, e.g. `emotions.joy`.
    pub var: String,
    pub op: CompareOperator,
    pub value: Operand,
}

impl Comparison {
    pub fn new(var: impl Into<String>, op: CompareOperator, value: Operand) -> Self {
        Self {
            var: var.into(),
            op,
            value,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.var, self.op, self.value)
    }
}

/// Boolean expression tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionNode {
    And(Vec<ExpressionNode>),
    Or(Vec<ExpressionNode>),
    Compare(Comparison),
}

impl ExpressionNode {
    /// Shorthand for a numeric leaf.
    pub fn compare(var: impl Into<String>, op: CompareOperator, value: f64) -> Self {
        Self::Compare(Comparison::new(var, op, Operand::Number(value)))
    }

    pub fn depth(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                1 + children.iter().map(|c| c.depth()).max().unwrap_or(0)
            }
            Self::Compare(_) => 1,
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                children.iter().map(|c| c.leaf_count()).sum()
            }
            Self::Compare(_) => 1,
        }
    }

    fn validate_leaves(&self, id: &str) -> DefinitionResult<()> {
        match self {
            Self::And(children) | Self::Or(children) => {
                children.iter().try_for_each(|c| c.validate_leaves(id))
            }
            Self::Compare(cmp) => {
                if cmp.var.trim().is_empty() || cmp.var.split('.').any(|s| s.is_empty()) {
                    return Err(DefinitionError::MalformedExpression {
                        id: id.to_string(),
                        reason: format!("invalid variable path `{}`", cmp.var),
                    });
                }
                if let Operand::Number(n) = cmp.value {
                    if !n.is_finite() {
                        return Err(DefinitionError::MalformedExpression {
                            id: id.to_string(),
                            reason: format!("non-finite threshold in `{}`", cmp),
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

/// One prerequisite of an expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub logic: ExpressionNode,
}

/// A trigger expression: the conjunction of its prerequisites.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpressionDefinition {
    pub id: String,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
}

impl ExpressionDefinition {
    pub fn new(id: impl Into<String>, logic: Vec<ExpressionNode>) -> Self {
        Self {
            id: id.into(),
            prerequisites: logic.into_iter().map(|logic| Prerequisite { logic }).collect(),
        }
    }

    /// Parse and validate a JSON expression definition.
    pub fn from_json(json: &str) -> DefinitionResult<Self> {
        let def: Self =
            serde_json::from_str(json).map_err(|e| DefinitionError::Malformed(e.to_string()))?;
        def.validate()?;
        Ok(def)
    }

    /// Structural checks run once before any simulation.
    pub fn validate(&self) -> DefinitionResult<()> {
        if self.id.trim().is_empty() {
            return Err(DefinitionError::MalformedExpression {
                id: self.id.clone(),
                reason: "missing id".into(),
            });
        }
        for prereq in &self.prerequisites {
            let depth = prereq.logic.depth();
            if depth > MAX_EXPRESSION_DEPTH {
                return Err(DefinitionError::MalformedExpression {
                    id: self.id.clone(),
                    reason: format!("depth {} exceeds limit {}", depth, MAX_EXPRESSION_DEPTH),
                });
            }
            prereq.logic.validate_leaves(&self.id)?;
        }
        Ok(())
    }

    /// The root tree: conjunction of all prerequisites.
    pub fn root(&self) -> ExpressionNode {
        ExpressionNode::And(self.prerequisites.iter().map(|p| p.logic.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_tree() {
        let json = r#"{
            "id": "joy_persists",
            "prerequisites": [
                {"logic": {"and": [
                    {"compare": {"var": "emotions.joy", "op": ">=", "value": 0.5}},
                    {"or": [
                        {"compare": {"var": "moodAxes.threat", "op": "<", "value": 20}},
                        {"compare": {"var": "previousEmotions.joy", "op": ">=", "value": 0.4}}
                    ]}
                ]}}
            ]
        }"#;
        let def = ExpressionDefinition::from_json(json).unwrap();
        assert_eq!(def.prerequisites.len(), 1);
        let logic = &def.prerequisites[0].logic;
        assert_eq!(logic.depth(), 3);
        assert_eq!(logic.leaf_count(), 3);
    }

    #[test]
    fn operands_keep_their_type() {
        let json = r#"{"compare": {"var": "a.b", "op": "==", "value": "calm"}}"#;
        let node: ExpressionNode = serde_json::from_str(json).unwrap();
        match node {
            ExpressionNode::Compare(c) => assert_eq!(c.value, Operand::Text("calm".into())),
            _ => panic!("expected leaf"),
        }
    }

    #[test]
    fn empty_prerequisites_are_valid() {
        let def = ExpressionDefinition::from_json(r#"{"id": "always"}"#).unwrap();
        assert!(def.prerequisites.is_empty());
        assert_eq!(def.root(), ExpressionNode::And(vec![]));
    }

    #[test]
    fn rejects_malformed_paths_and_depth() {
        let def = ExpressionDefinition::new(
            "bad",
            vec![ExpressionNode::compare("emotions..joy", CompareOperator::Gte, 0.1)],
        );
        assert!(def.validate().is_err());

        let mut node = ExpressionNode::compare("emotions.joy", CompareOperator::Gte, 0.1);
        for _ in 0..MAX_EXPRESSION_DEPTH {
            node = ExpressionNode::And(vec![node]);
        }
        let def = ExpressionDefinition::new("deep", vec![node]);
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("depth"));
    }

    #[test]
    fn missing_id_is_rejected() {
        let def = ExpressionDefinition::new(" ", vec![]);
        assert!(def.validate().is_err());
    }
}
