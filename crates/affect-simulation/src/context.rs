//! Per-trial evaluation context.
//!
//! A [`Context`] is the flattened, read-only view an expression reads from.
//! It is built once per trial from a temporal pair and the trait state, and
//! keeps every prototype's raw sum and gate flag for integrity checks.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use affect_types::{
    AxisState, MoodAxis, NormalizedAxes, Prototype, PrototypeCatalog, PrototypeKind, SexualAxis,
    TraitAxis, TraitState, SEXUAL_AROUSAL_AXIS,
};

/// Named groups addressable by the first segment of a variable path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextGroup {
    MoodAxes,
    /// Raw sexual axes in their own ranges, plus the derived `sexual_arousal`
    /// which is already normalized to [0, 1].
    SexualAxes,
    AffectTraits,
    Emotions,
    SexualStates,
    MoodStates,
    PreviousMoodAxes,
    /// Same units as [`ContextGroup::SexualAxes`].
    PreviousSexualAxes,
    PreviousEmotions,
    PreviousSexualStates,
    PreviousMoodStates,
    MoodAxisDeltas,
    SexualAxisDeltas,
}

impl ContextGroup {
    pub const ALL: [ContextGroup; 13] = [
        ContextGroup::MoodAxes,
        ContextGroup::SexualAxes,
        ContextGroup::AffectTraits,
        ContextGroup::Emotions,
        ContextGroup::SexualStates,
        ContextGroup::MoodStates,
        ContextGroup::PreviousMoodAxes,
        ContextGroup::PreviousSexualAxes,
        ContextGroup::PreviousEmotions,
        ContextGroup::PreviousSexualStates,
        ContextGroup::PreviousMoodStates,
        ContextGroup::MoodAxisDeltas,
        ContextGroup::SexualAxisDeltas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MoodAxes => "moodAxes",
            Self::SexualAxes => "sexualAxes",
            Self::AffectTraits => "affectTraits",
            Self::Emotions => "emotions",
            Self::SexualStates => "sexualStates",
            Self::MoodStates => "moodStates",
            Self::PreviousMoodAxes => "previousMoodAxes",
            Self::PreviousSexualAxes => "previousSexualAxes",
            Self::PreviousEmotions => "previousEmotions",
            Self::PreviousSexualStates => "previousSexualStates",
            Self::PreviousMoodStates => "previousMoodStates",
            Self::MoodAxisDeltas => "moodAxisDeltas",
            Self::SexualAxisDeltas => "sexualAxisDeltas",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == name)
    }

    /// Group that holds intensities of `kind` at the current or previous instant.
    pub fn for_prototype(kind: PrototypeKind, previous: bool) -> Self {
        match (kind, previous) {
            (PrototypeKind::Emotion, false) => Self::Emotions,
            (PrototypeKind::Emotion, true) => Self::PreviousEmotions,
            (PrototypeKind::Sexual, false) => Self::SexualStates,
            (PrototypeKind::Sexual, true) => Self::PreviousSexualStates,
            (PrototypeKind::Mood, false) => Self::MoodStates,
            (PrototypeKind::Mood, true) => Self::PreviousMoodStates,
        }
    }
}

impl fmt::Display for ContextGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of projecting one prototype onto one axis state.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrototypeEvaluation {
    pub prototype_id: String,
    pub kind: PrototypeKind,
    /// Weighted sum before normalization and gating.
    pub raw_sum: f64,
    /// Gated intensity in [0, 1].
    pub intensity: f64,
    pub gate_pass: bool,
}

/// Read-only evaluation context for one trial.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    values: BTreeMap<ContextGroup, BTreeMap<String, f64>>,
    current: Vec<PrototypeEvaluation>,
    previous: Vec<PrototypeEvaluation>,
}

impl Context {
    pub fn get(&self, group: ContextGroup, key: &str) -> Option<f64> {
        self.values.get(&group)?.get(key).copied()
    }

    /// Resolve a dotted `group.key` path.
    pub fn resolve(&self, path: &str) -> Option<f64> {
        let (group, key) = path.split_once('.')?;
        self.get(ContextGroup::parse(group)?, key)
    }

    pub fn group(&self, group: ContextGroup) -> Option<&BTreeMap<String, f64>> {
        self.values.get(&group)
    }

    /// Prototype projections at the current instant.
    pub fn current_evaluations(&self) -> &[PrototypeEvaluation] {
        &self.current
    }

    /// Prototype projections at the previous instant.
    pub fn previous_evaluations(&self) -> &[PrototypeEvaluation] {
        &self.previous
    }

    fn insert(&mut self, group: ContextGroup, key: impl Into<String>, value: f64) {
        self.values.entry(group).or_default().insert(key.into(), value);
    }
}

/// Projects axis states through the prototype catalog into contexts.
#[derive(Clone, Debug)]
pub struct ContextBuilder {
    catalog: PrototypeCatalog,
}

impl ContextBuilder {
    pub fn new(catalog: PrototypeCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PrototypeCatalog {
        &self.catalog
    }

    /// Build the context for one trial.
    pub fn build_context(
        &self,
        current: &AxisState,
        previous: &AxisState,
        traits: &TraitState,
    ) -> Context {
        let mut ctx = Context::default();

        insert_axes(&mut ctx, current, ContextGroup::MoodAxes, ContextGroup::SexualAxes);
        insert_axes(
            &mut ctx,
            previous,
            ContextGroup::PreviousMoodAxes,
            ContextGroup::PreviousSexualAxes,
        );
        for axis in TraitAxis::ALL {
            ctx.insert(ContextGroup::AffectTraits, axis.name(), traits.get(axis));
        }
        for axis in MoodAxis::ALL {
            ctx.insert(
                ContextGroup::MoodAxisDeltas,
                axis.name(),
                current.mood(axis) - previous.mood(axis),
            );
        }
        for axis in SexualAxis::ALL {
            ctx.insert(
                ContextGroup::SexualAxisDeltas,
                axis.name(),
                current.sexual(axis) - previous.sexual(axis),
            );
        }

        // Each instant is projected from its own state; previous intensities
        // are never derived from current ones.
        let now = NormalizedAxes::from_state(current, traits);
        let before = NormalizedAxes::from_state(previous, traits);
        for prototype in self.catalog.all() {
            let cur = Self::evaluate_prototype(prototype, &now);
            let prev = Self::evaluate_prototype(prototype, &before);
            ctx.insert(
                ContextGroup::for_prototype(prototype.kind, false),
                prototype.id.as_str(),
                cur.intensity,
            );
            ctx.insert(
                ContextGroup::for_prototype(prototype.kind, true),
                prototype.id.as_str(),
                prev.intensity,
            );
            ctx.current.push(cur);
            ctx.previous.push(prev);
        }
        ctx
    }

    /// Gated, normalized weighted sum of one prototype.
    pub fn evaluate_prototype(prototype: &Prototype, axes: &NormalizedAxes) -> PrototypeEvaluation {
        let mut raw_sum = 0.0;
        let mut weight_norm = 0.0;
        for w in &prototype.weights {
            let Some(axis) = w.axis_ref else { continue };
            let term = w.coefficient * axes.get(axis);
            if !term.is_finite() {
                continue;
            }
            raw_sum += term;
            weight_norm += w.coefficient.abs();
        }
        let gate_pass = Self::gate_passes(prototype, axes);
        let intensity = if gate_pass && weight_norm > 0.0 {
            (raw_sum / weight_norm).clamp(0.0, 1.0)
        } else {
            0.0
        };
        PrototypeEvaluation {
            prototype_id: prototype.id.clone(),
            kind: prototype.kind,
            raw_sum,
            intensity,
            gate_pass,
        }
    }

    /// Conjunction of all gates. A gate on an unknown axis fails.
    pub fn gate_passes(prototype: &Prototype, axes: &NormalizedAxes) -> bool {
        prototype.gates.iter().all(|gate| match gate.axis_ref() {
            Some(axis) => gate.passes(axes.get(axis)),
            None => false,
        })
    }
}

fn insert_axes(ctx: &mut Context, state: &AxisState, mood: ContextGroup, sexual: ContextGroup) {
    for axis in MoodAxis::ALL {
        ctx.insert(mood, axis.name(), state.mood(axis));
    }
    for axis in SexualAxis::ALL {
        ctx.insert(sexual, axis.name(), state.sexual(axis));
    }
    ctx.insert(sexual, SEXUAL_AROUSAL_AXIS, state.sexual_arousal());
}
