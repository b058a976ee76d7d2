//! Population-level complexity of a prototype catalog.
//!
//! A prototype's complexity is the number of axes it actively weights. Over
//! a large enough population the analyzer reports the distribution of that
//! count, prototypes far from the mean, and axis bundles that keep appearing
//! together. A large bundle shared by many prototypes hints at a missing
//! composite axis.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use affect_simulation::{
    compute_distribution_stats, detect_outliers, histogram, quartiles, DistributionStats, Quartiles,
};
use affect_types::{ComplexityConfig, Prototype, PrototypeDefinition, PrototypeKind};

use crate::error::OverlapResult;

/// Active-axis count of one prototype.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrototypeComplexity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PrototypeKind,
    pub complexity: usize,
    pub active_axes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityOutlier {
    pub id: String,
    pub complexity: usize,
    /// Signed distance from the mean in standard deviations.
    pub z_score: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityOutliers {
    pub high: Vec<ComplexityOutlier>,
    pub low: Vec<ComplexityOutlier>,
}

/// Axes that co-occur as active weights across prototypes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisBundle {
    /// Sorted axis names.
    pub axes: Vec<String>,
    /// Prototypes weighting every axis of the bundle.
    pub frequency: usize,
    pub support: f64,
    pub suggested_name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ConsiderNewAxis,
    ReduceComplexity,
    BalanceComplexity,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub kind: RecommendationKind,
    /// Bundle name or prototype id.
    pub target: String,
    /// The statistic the recommendation rests on.
    pub basis: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityAnalysis {
    pub total_prototypes: usize,
    pub per_prototype: Vec<PrototypeComplexity>,
    /// complexity -> number of prototypes.
    pub histogram: BTreeMap<usize, usize>,
    pub distribution: Option<DistributionStats>,
    pub quartiles: Option<Quartiles>,
    pub outliers: ComplexityOutliers,
    pub bundles: Vec<AxisBundle>,
    pub recommendations: Vec<Recommendation>,
}

impl ComplexityAnalysis {
    pub fn is_empty(&self) -> bool {
        self.total_prototypes == 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct PrototypeComplexityAnalyzer {
    config: ComplexityConfig,
}

impl PrototypeComplexityAnalyzer {
    pub fn new(config: ComplexityConfig) -> OverlapResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ComplexityConfig {
        &self.config
    }

    /// Analyze raw definitions; entries without weights are excluded.
    pub fn analyze(&self, definitions: &[PrototypeDefinition]) -> ComplexityAnalysis {
        let eps = self.config.active_weight_epsilon;
        let entries: Vec<_> = definitions
            .iter()
            .filter_map(|def| {
                let weights = def.weights.as_ref().filter(|w| !w.is_empty())?;
                let axes: BTreeSet<String> = weights
                    .iter()
                    .filter(|(_, w)| w.is_finite() && w.abs() > eps)
                    .map(|(axis, _)| axis.clone())
                    .collect();
                Some((def.id.clone(), def.kind, axes))
            })
            .collect();
        self.analyze_entries(entries)
    }

    pub fn analyze_optional(&self, definitions: Option<&[PrototypeDefinition]>) -> ComplexityAnalysis {
        definitions.map(|d| self.analyze(d)).unwrap_or_default()
    }

    /// Analyze already validated prototypes.
    pub fn analyze_prototypes(&self, prototypes: &[Prototype]) -> ComplexityAnalysis {
        let eps = self.config.active_weight_epsilon;
        let entries: Vec<_> = prototypes
            .iter()
            .filter(|p| !p.weights.is_empty())
            .map(|p| {
                let axes: BTreeSet<String> = p.active_axes(eps).into_iter().map(str::to_string).collect();
                (p.id.clone(), p.kind, axes)
            })
            .collect();
        self.analyze_entries(entries)
    }

    fn analyze_entries(&self, entries: Vec<(String, PrototypeKind, BTreeSet<String>)>) -> ComplexityAnalysis {
        let total_prototypes = entries.len();
        if total_prototypes == 0 {
            debug!("no weighted prototypes to analyze");
            return ComplexityAnalysis::default();
        }

        let counts: Vec<usize> = entries.iter().map(|(_, _, axes)| axes.len()).collect();
        let mut analysis = ComplexityAnalysis {
            total_prototypes,
            histogram: histogram(&counts),
            ..Default::default()
        };

        if total_prototypes >= self.config.min_prototypes_for_analysis {
            let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
            analysis.distribution = compute_distribution_stats(&values);
            analysis.quartiles = quartiles(&values);

            let found = detect_outliers(&values, self.config.outlier_std_dev_threshold);
            let outlier = |i: usize| ComplexityOutlier {
                id: entries[i].0.clone(),
                complexity: counts[i],
                z_score: (values[i] - found.mean) / found.std_dev,
            };
            analysis.outliers = ComplexityOutliers {
                high: found.high.iter().map(|&i| outlier(i)).collect(),
                low: found.low.iter().map(|&i| outlier(i)).collect(),
            };

            let transactions: Vec<&BTreeSet<String>> = entries.iter().map(|(_, _, axes)| axes).collect();
            analysis.bundles = self.bundles(&transactions);
            analysis.recommendations = self.recommend(&analysis);
        } else {
            debug!(
                total = total_prototypes,
                required = self.config.min_prototypes_for_analysis,
                "population too small for distribution analysis"
            );
        }

        analysis.per_prototype = entries
            .into_iter()
            .map(|(id, kind, axes)| PrototypeComplexity {
                id,
                kind,
                complexity: axes.len(),
                active_axes: axes.into_iter().collect(),
            })
            .collect();

        info!(
            total = analysis.total_prototypes,
            bundles = analysis.bundles.len(),
            high_outliers = analysis.outliers.high.len(),
            low_outliers = analysis.outliers.low.len(),
            recommendations = analysis.recommendations.len(),
            "complexity analysis complete"
        );
        analysis
    }

    /// Level-wise Apriori search over the configured size range, optionally
    /// keeping closed itemsets only. Sorted by support, then size.
    fn bundles(&self, transactions: &[&BTreeSet<String>]) -> Vec<AxisBundle> {
        let n = transactions.len() as f64;
        let min_support = self.config.min_bundle_support;
        let max_size = self.config.max_bundle_size;
        let count = |set: &[String]| {
            transactions
                .iter()
                .filter(|t| set.iter().all(|axis| t.contains(axis)))
                .count()
        };

        let singletons: BTreeSet<&String> = transactions.iter().flat_map(|t| t.iter()).collect();
        let mut level: Vec<Vec<String>> = singletons.into_iter().map(|a| vec![a.clone()]).collect();
        let mut frequent: Vec<(Vec<String>, usize)> = Vec::new();

        for size in 1..=max_size {
            let counted: Vec<(Vec<String>, usize)> = level
                .into_iter()
                .map(|set| {
                    let c = count(&set);
                    (set, c)
                })
                .filter(|(_, c)| *c > 0 && *c as f64 / n >= min_support)
                .collect();
            if counted.is_empty() {
                break;
            }
            level = if size < max_size {
                next_candidates(&counted)
            } else {
                Vec::new()
            };
            frequent.extend(counted);
        }

        let mut bundles: Vec<AxisBundle> = frequent
            .iter()
            .filter(|(set, _)| set.len() >= self.config.min_bundle_size)
            .filter(|(set, freq)| {
                !self.config.closed_bundles_only
                    || !frequent.iter().any(|(sup, f)| {
                        f == freq && sup.len() == set.len() + 1 && set.iter().all(|a| sup.contains(a))
                    })
            })
            .map(|(set, freq)| AxisBundle {
                suggested_name: suggested_name(set),
                axes: set.clone(),
                frequency: *freq,
                support: *freq as f64 / n,
            })
            .collect();
        bundles.sort_by(|x, y| {
            y.frequency
                .cmp(&x.frequency)
                .then(y.axes.len().cmp(&x.axes.len()))
                .then_with(|| x.axes.cmp(&y.axes))
        });
        bundles
    }

    fn recommend(&self, analysis: &ComplexityAnalysis) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for bundle in &analysis.bundles {
            let large = bundle.axes.len() >= self.config.large_bundle_size;
            if large && bundle.support >= self.config.high_bundle_support {
                out.push(Recommendation {
                    kind: RecommendationKind::ConsiderNewAxis,
                    target: bundle.suggested_name.clone(),
                    basis: format!(
                        "axes [{}] co-occur in {}/{} prototypes (support {:.2} >= {:.2})",
                        bundle.axes.join(", "),
                        bundle.frequency,
                        analysis.total_prototypes,
                        bundle.support,
                        self.config.high_bundle_support
                    ),
                });
            }
        }
        let mean = analysis.distribution.as_ref().map(|d| d.mean).unwrap_or(0.0);
        for (kind, outliers, direction) in [
            (RecommendationKind::ReduceComplexity, &analysis.outliers.high, "above"),
            (RecommendationKind::BalanceComplexity, &analysis.outliers.low, "below"),
        ] {
            for o in outliers {
                out.push(Recommendation {
                    kind,
                    target: o.id.clone(),
                    basis: format!(
                        "complexity {} is {:.2} std devs {} the mean {:.2}",
                        o.complexity,
                        o.z_score.abs(),
                        direction,
                        mean
                    ),
                });
            }
        }
        out
    }
}

/// Join frequent k-sets sharing a (k-1)-prefix, pruning candidates with an
/// infrequent subset.
fn next_candidates(frequent: &[(Vec<String>, usize)]) -> Vec<Vec<String>> {
    let known: BTreeSet<&[String]> = frequent.iter().map(|(s, _)| s.as_slice()).collect();
    let mut out = Vec::new();
    for (i, (x, _)) in frequent.iter().enumerate() {
        for (y, _) in &frequent[i + 1..] {
            let k = x.len();
            if x[..k - 1] != y[..k - 1] || x[k - 1] >= y[k - 1] {
                continue;
            }
            let mut candidate = x.clone();
            candidate.push(y[k - 1].clone());
            let all_subsets_frequent = (0..candidate.len()).all(|skip| {
                let subset: Vec<String> = candidate
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != skip)
                    .map(|(_, a)| a.clone())
                    .collect();
                known.contains(subset.as_slice())
            });
            if all_subsets_frequent {
                out.push(candidate);
            }
        }
    }
    out
}

fn suggested_name(axes: &[String]) -> String {
    format!("{}_composite", axes.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: &str, axes: &[&str]) -> PrototypeDefinition {
        PrototypeDefinition {
            id: id.to_string(),
            kind: PrototypeKind::Emotion,
            weights: Some(axes.iter().map(|a| (a.to_string(), 0.5)).collect()),
            gates: vec![],
        }
    }

    fn weightless(id: &str) -> PrototypeDefinition {
        PrototypeDefinition {
            id: id.to_string(),
            kind: PrototypeKind::Emotion,
            weights: None,
            gates: vec![],
        }
    }

    #[test]
    fn empty_and_weightless_inputs_are_neutral() {
        let analyzer = PrototypeComplexityAnalyzer::default();
        for analysis in [
            analyzer.analyze(&[]),
            analyzer.analyze_optional(None),
            analyzer.analyze(&[weightless("a"), weightless("b")]),
            analyzer.analyze_prototypes(&[]),
        ] {
            assert_eq!(analysis.total_prototypes, 0);
            assert!(analysis.per_prototype.is_empty());
            assert!(analysis.histogram.is_empty());
            assert!(analysis.bundles.is_empty());
            assert!(analysis.recommendations.is_empty());
            assert!(analysis.distribution.is_none());
        }
    }

    #[test]
    fn small_populations_skip_statistics() {
        let analysis = PrototypeComplexityAnalyzer::default().analyze(&[
            def("a", &["valence", "arousal"]),
            def("b", &["valence"]),
            weightless("c"),
        ]);
        assert_eq!(analysis.total_prototypes, 2);
        assert_eq!(analysis.histogram, BTreeMap::from([(1, 1), (2, 1)]));
        assert!(analysis.distribution.is_none());
        assert!(analysis.bundles.is_empty());
    }

    #[test]
    fn inactive_weights_do_not_count() {
        let mut d = def("a", &["valence"]);
        if let Some(w) = d.weights.as_mut() {
            w.insert("arousal".into(), 0.01);
            w.insert("threat".into(), f64::NAN);
        }
        let analysis = PrototypeComplexityAnalyzer::default().analyze(&[d]);
        assert_eq!(analysis.per_prototype[0].complexity, 1);
        assert_eq!(analysis.per_prototype[0].active_axes, vec!["valence"]);
    }

    fn nested_population() -> Vec<PrototypeDefinition> {
        vec![
            def("p1", &["valence", "arousal", "threat"]),
            def("p2", &["valence", "arousal", "threat"]),
            def("p3", &["valence", "arousal", "threat"]),
            def("p4", &["valence", "arousal"]),
            def("p5", &["engagement"]),
        ]
    }

    fn bundle_summary(analysis: &ComplexityAnalysis) -> Vec<(Vec<&str>, usize)> {
        analysis
            .bundles
            .iter()
            .map(|b| (b.axes.iter().map(String::as_str).collect(), b.frequency))
            .collect()
    }

    #[test]
    fn every_frequent_bundle_is_reported_by_support() {
        let analysis = PrototypeComplexityAnalyzer::default().analyze(&nested_population());
        assert_eq!(
            bundle_summary(&analysis),
            vec![
                (vec!["arousal", "valence"], 4),
                (vec!["arousal", "threat", "valence"], 3),
                (vec!["arousal", "threat"], 3),
                (vec!["threat", "valence"], 3),
            ]
        );
        assert!((analysis.bundles[0].support - 0.8).abs() < 1e-12);
        assert!((analysis.bundles[3].support - 0.6).abs() < 1e-12);

        let rec = &analysis.recommendations;
        assert_eq!(rec.len(), 1);
        assert_eq!(rec[0].kind, RecommendationKind::ConsiderNewAxis);
        assert_eq!(rec[0].target, "arousal_threat_valence_composite");
    }

    #[test]
    fn closed_filter_drops_absorbed_bundles() {
        let analyzer = PrototypeComplexityAnalyzer::new(ComplexityConfig {
            closed_bundles_only: true,
            ..Default::default()
        })
        .unwrap();
        let analysis = analyzer.analyze(&nested_population());
        assert_eq!(
            bundle_summary(&analysis),
            vec![
                (vec!["arousal", "valence"], 4),
                (vec!["arousal", "threat", "valence"], 3),
            ]
        );
    }

    #[test]
    fn large_bundle_size_is_configurable() {
        let analyzer = PrototypeComplexityAnalyzer::new(ComplexityConfig {
            large_bundle_size: 2,
            ..Default::default()
        })
        .unwrap();
        let analysis = analyzer.analyze(&nested_population());
        let targets: Vec<&str> = analysis
            .recommendations
            .iter()
            .filter(|r| r.kind == RecommendationKind::ConsiderNewAxis)
            .map(|r| r.target.as_str())
            .collect();
        assert_eq!(
            targets,
            vec![
                "arousal_valence_composite",
                "arousal_threat_valence_composite",
                "arousal_threat_composite",
                "threat_valence_composite",
            ]
        );

        let analyzer = PrototypeComplexityAnalyzer::new(ComplexityConfig {
            large_bundle_size: 4,
            ..Default::default()
        })
        .unwrap();
        assert!(analyzer.analyze(&nested_population()).recommendations.is_empty());
    }

    #[test]
    fn outliers_drive_recommendations() {
        let mut defs: Vec<PrototypeDefinition> = (0..9)
            .map(|i| def(&format!("p{}", i), &["valence", "arousal"]))
            .collect();
        defs.push(def(
            "sprawling",
            &["valence", "arousal", "threat", "engagement", "agency_control", "self_evaluation", "future_expectancy"],
        ));
        let analysis = PrototypeComplexityAnalyzer::default().analyze(&defs);
        let dist = analysis.distribution.as_ref().unwrap();
        assert!((dist.mean - 2.5).abs() < 1e-12);
        assert_eq!(analysis.outliers.high.len(), 1);
        assert_eq!(analysis.outliers.high[0].id, "sprawling");
        assert!((analysis.outliers.high[0].z_score - 3.0).abs() < 1e-9);
        assert!(analysis.outliers.low.is_empty());
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.kind == RecommendationKind::ReduceComplexity && r.target == "sprawling"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ComplexityConfig {
            min_bundle_size: 1,
            ..Default::default()
        };
        assert!(PrototypeComplexityAnalyzer::new(config).is_err());

        let config = ComplexityConfig {
            large_bundle_size: 1,
            ..Default::default()
        };
        assert!(PrototypeComplexityAnalyzer::new(config).is_err());
    }
}
