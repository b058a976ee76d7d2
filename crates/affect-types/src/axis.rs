//! Affect axes and bounded axis states.
//!
//! Three axis families exist:
//!
//! ```text
//!   mood    (7)  valence, arousal, agency_control, threat, engagement,
//!                future_expectancy, self_evaluation          [-100, 100]
//!   sexual  (3)  sex_excitation [0,100], sex_inhibition [0,100],
//!                baseline_libido [-50, 50]
//!   trait   (3)  affective_empathy, cognitive_empathy, harm_aversion [0, 100]
//! ```
//!
//! Prototypes and gates never see raw values. They read the normalized view
//! ([`NormalizedAxes`]) where mood axes live in [-1, 1], excitation/inhibition
//! and traits in [0, 1], baseline libido in [-1, 1], plus the derived
//! `sexual_arousal` in [0, 1].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DefinitionError, DefinitionResult};

/// Shared range of every mood axis.
pub const MOOD_AXIS_RANGE: (f64, f64) = (-100.0, 100.0);

/// Range of every affect trait axis.
pub const TRAIT_AXIS_RANGE: (f64, f64) = (0.0, 100.0);

/// Name of the derived sexual-arousal axis.
pub const SEXUAL_AROUSAL_AXIS: &str = "sexual_arousal";

// ── Mood axes ───────────────────────────────────────────────────────────

/// The seven mood axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodAxis {
    Valence,
    Arousal,
    AgencyControl,
    Threat,
    Engagement,
    FutureExpectancy,
    SelfEvaluation,
}

impl MoodAxis {
    pub const ALL: [MoodAxis; 7] = [
        MoodAxis::Valence,
        MoodAxis::Arousal,
        MoodAxis::AgencyControl,
        MoodAxis::Threat,
        MoodAxis::Engagement,
        MoodAxis::FutureExpectancy,
        MoodAxis::SelfEvaluation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Valence => "valence",
            Self::Arousal => "arousal",
            Self::AgencyControl => "agency_control",
            Self::Threat => "threat",
            Self::Engagement => "engagement",
            Self::FutureExpectancy => "future_expectancy",
            Self::SelfEvaluation => "self_evaluation",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn range(&self) -> (f64, f64) {
        MOOD_AXIS_RANGE
    }
}

impl FromStr for MoodAxis {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| DefinitionError::UnknownAxis(s.to_string()))
    }
}

// ── Sexual axes ─────────────────────────────────────────────────────────

/// The three sexual axes; each carries its own range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SexualAxis {
    SexExcitation,
    SexInhibition,
    BaselineLibido,
}

impl SexualAxis {
    pub const ALL: [SexualAxis; 3] = [
        SexualAxis::SexExcitation,
        SexualAxis::SexInhibition,
        SexualAxis::BaselineLibido,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SexExcitation => "sex_excitation",
            Self::SexInhibition => "sex_inhibition",
            Self::BaselineLibido => "baseline_libido",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn range(&self) -> (f64, f64) {
        match self {
            Self::SexExcitation | Self::SexInhibition => (0.0, 100.0),
            Self::BaselineLibido => (-50.0, 50.0),
        }
    }
}

impl FromStr for SexualAxis {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| DefinitionError::UnknownAxis(s.to_string()))
    }
}

// ── Trait axes ──────────────────────────────────────────────────────────

/// Stable personality traits; constant within one trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitAxis {
    AffectiveEmpathy,
    CognitiveEmpathy,
    HarmAversion,
}

impl TraitAxis {
    pub const ALL: [TraitAxis; 3] = [
        TraitAxis::AffectiveEmpathy,
        TraitAxis::CognitiveEmpathy,
        TraitAxis::HarmAversion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AffectiveEmpathy => "affective_empathy",
            Self::CognitiveEmpathy => "cognitive_empathy",
            Self::HarmAversion => "harm_aversion",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl FromStr for TraitAxis {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| DefinitionError::UnknownAxis(s.to_string()))
    }
}

// ── Axis references ─────────────────────────────────────────────────────

/// A resolved reference to any axis a prototype weight or gate may name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AxisRef {
    Mood(MoodAxis),
    Sexual(SexualAxis),
    SexualArousal,
    Trait(TraitAxis),
}

impl AxisRef {
    /// Resolve an axis name. Returns `None` for names outside all groups.
    pub fn parse(name: &str) -> Option<Self> {
        if name == SEXUAL_AROUSAL_AXIS {
            return Some(Self::SexualArousal);
        }
        if let Ok(m) = name.parse::<MoodAxis>() {
            return Some(Self::Mood(m));
        }
        if let Ok(s) = name.parse::<SexualAxis>() {
            return Some(Self::Sexual(s));
        }
        name.parse::<TraitAxis>().ok().map(Self::Trait)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mood(a) => a.name(),
            Self::Sexual(a) => a.name(),
            Self::SexualArousal => SEXUAL_AROUSAL_AXIS,
            Self::Trait(a) => a.name(),
        }
    }

    /// Domain of the axis in normalized units.
    pub fn normalized_domain(&self) -> (f64, f64) {
        match self {
            Self::Mood(_) => (-1.0, 1.0),
            Self::Sexual(SexualAxis::BaselineLibido) => (-1.0, 1.0),
            Self::Sexual(_) => (0.0, 1.0),
            Self::SexualArousal => (0.0, 1.0),
            Self::Trait(_) => (0.0, 1.0),
        }
    }
}

impl fmt::Display for AxisRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ── Axis state ──────────────────────────────────────────────────────────

/// A bounded snapshot of the mood and sexual axes (raw units).
///
/// Construction rejects out-of-range values; use [`AxisState::clamped`]
/// when a value is known to need clamping (temporal deltas).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AxisState {
    mood: [f64; 7],
    sexual: [f64; 3],
}

impl AxisState {
    /// Build a validated state from raw values.
    pub fn new(mood: [f64; 7], sexual: [f64; 3]) -> DefinitionResult<Self> {
        for axis in MoodAxis::ALL {
            check_range(axis.name(), mood[axis.index()], axis.range())?;
        }
        for axis in SexualAxis::ALL {
            check_range(axis.name(), sexual[axis.index()], axis.range())?;
        }
        Ok(Self { mood, sexual })
    }

    /// Build a state from named values. Axes not mentioned default to the
    /// neutral point (0, or the range minimum if 0 lies outside the range).
    pub fn from_named<'a, I>(values: I) -> DefinitionResult<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut mood = [0.0; 7];
        let mut sexual = [0.0; 3];
        for (name, value) in values {
            if let Ok(axis) = name.parse::<MoodAxis>() {
                mood[axis.index()] = value;
            } else if let Ok(axis) = name.parse::<SexualAxis>() {
                sexual[axis.index()] = value;
            } else {
                return Err(DefinitionError::UnknownAxis(name.to_string()));
            }
        }
        Self::new(mood, sexual)
    }

    /// Build a state by clamping every value into its range.
    pub fn clamped(mood: [f64; 7], sexual: [f64; 3]) -> Self {
        let mut m = mood;
        let mut s = sexual;
        for axis in MoodAxis::ALL {
            let (lo, hi) = axis.range();
            m[axis.index()] = clamp_finite(m[axis.index()], lo, hi);
        }
        for axis in SexualAxis::ALL {
            let (lo, hi) = axis.range();
            s[axis.index()] = clamp_finite(s[axis.index()], lo, hi);
        }
        Self { mood: m, sexual: s }
    }

    /// Neutral state: every axis at 0.
    pub fn neutral() -> Self {
        Self {
            mood: [0.0; 7],
            sexual: [0.0; 3],
        }
    }

    pub fn mood(&self, axis: MoodAxis) -> f64 {
        self.mood[axis.index()]
    }

    pub fn sexual(&self, axis: SexualAxis) -> f64 {
        self.sexual[axis.index()]
    }

    pub fn mood_values(&self) -> &[f64; 7] {
        &self.mood
    }

    pub fn sexual_values(&self) -> &[f64; 3] {
        &self.sexual
    }

    /// Look up a raw value by axis name.
    pub fn get(&self, name: &str) -> Option<f64> {
        match AxisRef::parse(name)? {
            AxisRef::Mood(a) => Some(self.mood(a)),
            AxisRef::Sexual(a) => Some(self.sexual(a)),
            _ => None,
        }
    }

    /// Derived sexual arousal in [0, 1].
    pub fn sexual_arousal(&self) -> f64 {
        let raw = self.sexual(SexualAxis::SexExcitation) - self.sexual(SexualAxis::SexInhibition)
            + self.sexual(SexualAxis::BaselineLibido);
        (raw / 100.0).clamp(0.0, 1.0)
    }
}

/// Trait values (raw units, [0, 100]).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraitState {
    values: [f64; 3],
}

impl TraitState {
    pub fn new(values: [f64; 3]) -> DefinitionResult<Self> {
        for axis in TraitAxis::ALL {
            check_range(axis.name(), values[axis.index()], TRAIT_AXIS_RANGE)?;
        }
        Ok(Self { values })
    }

    /// Build traits by clamping every value into [0, 100].
    pub fn clamped(values: [f64; 3]) -> Self {
        let (lo, hi) = TRAIT_AXIS_RANGE;
        Self {
            values: values.map(|v| clamp_finite(v, lo, hi)),
        }
    }

    /// Mid-range traits (50 on every axis).
    pub fn average() -> Self {
        Self { values: [50.0; 3] }
    }

    pub fn get(&self, axis: TraitAxis) -> f64 {
        self.values[axis.index()]
    }

    pub fn values(&self) -> &[f64; 3] {
        &self.values
    }
}

impl Default for TraitState {
    fn default() -> Self {
        Self::average()
    }
}

// ── Normalized view ─────────────────────────────────────────────────────

/// Normalized axis values as seen by prototype weights and gates.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedAxes {
    mood: [f64; 7],
    sexual: [f64; 3],
    sexual_arousal: f64,
    traits: [f64; 3],
}

impl NormalizedAxes {
    pub fn from_state(state: &AxisState, traits: &TraitState) -> Self {
        let mut mood = [0.0; 7];
        for axis in MoodAxis::ALL {
            mood[axis.index()] = state.mood(axis) / 100.0;
        }
        let sexual = [
            state.sexual(SexualAxis::SexExcitation) / 100.0,
            state.sexual(SexualAxis::SexInhibition) / 100.0,
            state.sexual(SexualAxis::BaselineLibido) / 50.0,
        ];
        let mut t = [0.0; 3];
        for axis in TraitAxis::ALL {
            t[axis.index()] = traits.get(axis) / 100.0;
        }
        Self {
            mood,
            sexual,
            sexual_arousal: state.sexual_arousal(),
            traits: t,
        }
    }

    pub fn get(&self, axis: AxisRef) -> f64 {
        match axis {
            AxisRef::Mood(a) => self.mood[a.index()],
            AxisRef::Sexual(a) => self.sexual[a.index()],
            AxisRef::SexualArousal => self.sexual_arousal,
            AxisRef::Trait(a) => self.traits[a.index()],
        }
    }
}

fn check_range(axis: &str, value: f64, (min, max): (f64, f64)) -> DefinitionResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(DefinitionError::AxisOutOfRange {
            axis: axis.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn clamp_finite(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        (lo + hi) / 2.0
    } else {
        value.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_names_round_trip() {
        for axis in MoodAxis::ALL {
            assert_eq!(axis.name().parse::<MoodAxis>().unwrap(), axis);
        }
        for axis in SexualAxis::ALL {
            assert_eq!(axis.name().parse::<SexualAxis>().unwrap(), axis);
        }
        assert_eq!(AxisRef::parse("sexual_arousal"), Some(AxisRef::SexualArousal));
        assert_eq!(
            AxisRef::parse("harm_aversion"),
            Some(AxisRef::Trait(TraitAxis::HarmAversion))
        );
        assert_eq!(AxisRef::parse("not_an_axis"), None);
    }

    #[test]
    fn out_of_range_is_rejected_not_clamped() {
        let err = AxisState::from_named([("valence", 150.0)]).unwrap_err();
        assert!(matches!(err, DefinitionError::AxisOutOfRange { .. }));

        let err = AxisState::from_named([("baseline_libido", -60.0)]).unwrap_err();
        assert!(err.to_string().contains("baseline_libido"));

        assert!(AxisState::from_named([("threat", f64::NAN)]).is_err());
    }

    #[test]
    fn unknown_axis_is_rejected() {
        let err = AxisState::from_named([("confidence", 10.0)]).unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownAxis(_)));
    }

    #[test]
    fn clamped_state_stays_in_range() {
        let s = AxisState::clamped([250.0; 7], [-10.0, 120.0, 90.0]);
        assert_eq!(s.mood(MoodAxis::Threat), 100.0);
        assert_eq!(s.sexual(SexualAxis::SexExcitation), 0.0);
        assert_eq!(s.sexual(SexualAxis::SexInhibition), 100.0);
        assert_eq!(s.sexual(SexualAxis::BaselineLibido), 50.0);
    }

    #[test]
    fn normalization_maps_to_unit_domains() {
        let state = AxisState::from_named([
            ("valence", -50.0),
            ("sex_excitation", 80.0),
            ("sex_inhibition", 20.0),
            ("baseline_libido", 25.0),
        ])
        .unwrap();
        let n = NormalizedAxes::from_state(&state, &TraitState::average());
        assert!((n.get(AxisRef::Mood(MoodAxis::Valence)) + 0.5).abs() < 1e-12);
        assert!((n.get(AxisRef::Sexual(SexualAxis::BaselineLibido)) - 0.5).abs() < 1e-12);
        // (80 - 20 + 25) / 100
        assert!((n.get(AxisRef::SexualArousal) - 0.85).abs() < 1e-12);
        assert!((n.get(AxisRef::Trait(TraitAxis::CognitiveEmpathy)) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn sexual_arousal_is_clamped() {
        let s = AxisState::from_named([("sex_inhibition", 100.0)]).unwrap();
        assert_eq!(s.sexual_arousal(), 0.0);
    }
}
