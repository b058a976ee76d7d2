//! Prototype definitions: weighted, gated projections from axes to intensity.
//!
//! Definitions arrive loosely shaped ([`PrototypeDefinition`]) and are
//! validated once into [`Prototype`], whose weights and gates carry resolved
//! axis references. Nothing downstream re-checks the shape.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::axis::AxisRef;
use crate::error::{DefinitionError, DefinitionResult};

// ── Kind ────────────────────────────────────────────────────────────────

/// Which context group a prototype's intensity lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrototypeKind {
    Emotion,
    Mood,
    Sexual,
}

impl fmt::Display for PrototypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emotion => write!(f, "emotion"),
            Self::Mood => write!(f, "mood"),
            Self::Sexual => write!(f, "sexual"),
        }
    }
}

// ── Gates ───────────────────────────────────────────────────────────────

/// Comparison operator allowed in a gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateOperator {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
}

impl GateOperator {
    pub fn apply(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gte => value >= threshold,
            Self::Lte => value <= threshold,
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }

    /// Whether the operator constrains the lower end of an interval.
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, Self::Gte | Self::Gt)
    }

    /// Whether the bound it imposes excludes the threshold itself.
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Gt | Self::Lt)
    }
}

impl FromStr for GateOperator {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">=" => Ok(Self::Gte),
            "<=" => Ok(Self::Lte),
            ">" => Ok(Self::Gt),
            "<" => Ok(Self::Lt),
            other => Err(DefinitionError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for GateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A threshold constraint on one normalized axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub axis: String,
    pub operator: GateOperator,
    pub threshold: f64,
}

impl Gate {
    pub fn new(axis: impl Into<String>, operator: GateOperator, threshold: f64) -> Self {
        Self {
            axis: axis.into(),
            operator,
            threshold,
        }
    }

    /// Resolved axis, or `None` when the name is outside every group.
    pub fn axis_ref(&self) -> Option<AxisRef> {
        AxisRef::parse(&self.axis)
    }

    pub fn passes(&self, value: f64) -> bool {
        self.operator.apply(value, self.threshold)
    }
}

impl FromStr for Gate {
    type Err = DefinitionError;

    /// Parse the compact `"axis op threshold"` form, e.g. `"threat <= 0.20"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DefinitionError::InvalidGate {
            gate: s.to_string(),
            reason: reason.to_string(),
        };
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(invalid("expected `axis operator threshold`"));
        }
        let operator = parts[1].parse::<GateOperator>()?;
        let threshold: f64 = parts[2]
            .parse()
            .map_err(|_| invalid("threshold is not a number"))?;
        if !threshold.is_finite() {
            return Err(invalid("threshold is not finite"));
        }
        Ok(Gate::new(parts[0], operator, threshold))
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.axis, self.operator, self.threshold)
    }
}

/// Gate as written in a definition file: compact string or structured.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GateDefinition {
    Compact(String),
    Structured {
        axis: String,
        operator: String,
        threshold: f64,
    },
}

impl GateDefinition {
    pub fn to_gate(&self) -> DefinitionResult<Gate> {
        match self {
            Self::Compact(s) => s.parse(),
            Self::Structured {
                axis,
                operator,
                threshold,
            } => {
                if !threshold.is_finite() {
                    return Err(DefinitionError::InvalidGate {
                        gate: format!("{} {} {}", axis, operator, threshold),
                        reason: "threshold is not finite".into(),
                    });
                }
                Ok(Gate::new(axis.clone(), operator.parse()?, *threshold))
            }
        }
    }
}

// ── Definitions ─────────────────────────────────────────────────────────

/// A prototype exactly as supplied by a catalog file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrototypeDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PrototypeKind,
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub gates: Vec<GateDefinition>,
}

/// One term of a prototype's weighted sum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub axis: String,
    pub coefficient: f64,
    #[serde(skip)]
    pub axis_ref: Option<AxisRef>,
}

/// A validated, immutable prototype.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prototype {
    pub id: String,
    pub kind: PrototypeKind,
    pub weights: Vec<Weight>,
    pub gates: Vec<Gate>,
}

impl Prototype {
    /// Build a prototype directly from weights and gates.
    pub fn new<'a, W>(id: impl Into<String>, kind: PrototypeKind, weights: W, gates: Vec<Gate>) -> Self
    where
        W: IntoIterator<Item = (&'a str, f64)>,
    {
        let weights = weights
            .into_iter()
            .map(|(axis, coefficient)| Weight {
                axis: axis.to_string(),
                coefficient,
                axis_ref: AxisRef::parse(axis),
            })
            .collect();
        Self {
            id: id.into(),
            kind,
            weights,
            gates,
        }
    }

    /// Weight coefficient for an axis name, zero when absent.
    pub fn weight(&self, axis: &str) -> f64 {
        self.weights
            .iter()
            .find(|w| w.axis == axis)
            .map(|w| w.coefficient)
            .unwrap_or(0.0)
    }

    /// Axis names whose finite |weight| exceeds `epsilon`.
    pub fn active_axes(&self, epsilon: f64) -> Vec<&str> {
        self.weights
            .iter()
            .filter(|w| w.coefficient.is_finite() && w.coefficient.abs() > epsilon)
            .map(|w| w.axis.as_str())
            .collect()
    }
}

impl TryFrom<PrototypeDefinition> for Prototype {
    type Error = DefinitionError;

    fn try_from(def: PrototypeDefinition) -> Result<Self, Self::Error> {
        let weights = def
            .weights
            .ok_or_else(|| DefinitionError::MissingWeights(def.id.clone()))?;
        for (axis, w) in &weights {
            if AxisRef::parse(axis).is_none() {
                debug!(prototype = %def.id, axis = %axis, "weight references unknown axis");
            }
            if !w.is_finite() {
                debug!(prototype = %def.id, axis = %axis, "non-finite weight will be ignored");
            }
        }
        let gates = def
            .gates
            .iter()
            .map(GateDefinition::to_gate)
            .collect::<DefinitionResult<Vec<_>>>()?;
        Ok(Prototype::new(
            def.id,
            def.kind,
            weights.iter().map(|(k, v)| (k.as_str(), *v)),
            gates,
        ))
    }
}

// ── Catalog ─────────────────────────────────────────────────────────────

/// A validated prototype population with unique ids.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PrototypeCatalog {
    prototypes: Vec<Prototype>,
}

impl PrototypeCatalog {
    pub fn new(prototypes: Vec<Prototype>) -> DefinitionResult<Self> {
        let mut seen = HashSet::new();
        for p in &prototypes {
            if !seen.insert((p.kind, p.id.as_str())) {
                return Err(DefinitionError::DuplicatePrototype(p.id.clone()));
            }
        }
        Ok(Self { prototypes })
    }

    /// Validate a batch of raw definitions.
    pub fn from_definitions(defs: Vec<PrototypeDefinition>) -> DefinitionResult<Self> {
        let prototypes = defs
            .into_iter()
            .map(Prototype::try_from)
            .collect::<DefinitionResult<Vec<_>>>()?;
        Self::new(prototypes)
    }

    /// Parse and validate a JSON array of definitions.
    pub fn from_json(json: &str) -> DefinitionResult<Self> {
        let defs: Vec<PrototypeDefinition> =
            serde_json::from_str(json).map_err(|e| DefinitionError::Malformed(e.to_string()))?;
        Self::from_definitions(defs)
    }

    pub fn all(&self) -> &[Prototype] {
        &self.prototypes
    }

    pub fn of_kind(&self, kind: PrototypeKind) -> impl Iterator<Item = &Prototype> {
        self.prototypes.iter().filter(move |p| p.kind == kind)
    }

    pub fn get(&self, kind: PrototypeKind, id: &str) -> Option<&Prototype> {
        self.prototypes.iter().find(|p| p.kind == kind && p.id == id)
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}
