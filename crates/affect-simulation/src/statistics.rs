//! Statistical helpers shared by the simulator and the overlap analysis.
//!
//! Degenerate inputs (empty slices, zero variance, mismatched lengths) yield
//! `None` or empty results; nothing here panics on data.

use std::collections::BTreeMap;

use serde::Serialize;

/// Summary of a sample distribution.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionStats {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub median: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub iqr: f64,
}

/// Indices of values beyond `k` standard deviations of the mean.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outliers {
    pub high: Vec<usize>,
    pub low: Vec<usize>,
    pub mean: f64,
    pub std_dev: f64,
}

impl Outliers {
    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.low.is_empty()
    }
}

/// A closed interval on a proportion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

impl ConfidenceInterval {
    pub fn contains(&self, p: f64) -> bool {
        self.low <= p && p <= self.high
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

fn finite_sorted(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    v.sort_by(f64::total_cmp);
    v
}

/// Linear-interpolation percentile of pre-sorted data; `p` in [0, 1].
fn interpolate(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Percentile by linear interpolation; non-finite values are ignored.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    interpolate(&finite_sorted(values), p)
}

/// Count, mean, population std-dev, median and tail percentiles.
pub fn compute_distribution_stats(values: &[f64]) -> Option<DistributionStats> {
    let sorted = finite_sorted(values);
    let count = sorted.len();
    if count == 0 {
        return None;
    }
    let n = count as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let median = if count % 2 == 1 {
        sorted[count / 2]
    } else {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    };
    Some(DistributionStats {
        count,
        mean,
        std_dev: variance.sqrt(),
        median,
        p50: interpolate(&sorted, 0.50)?,
        p90: interpolate(&sorted, 0.90)?,
        p95: interpolate(&sorted, 0.95)?,
        min: sorted[0],
        max: sorted[count - 1],
    })
}

pub fn quartiles(values: &[f64]) -> Option<Quartiles> {
    let sorted = finite_sorted(values);
    let q1 = interpolate(&sorted, 0.25)?;
    let q2 = interpolate(&sorted, 0.50)?;
    let q3 = interpolate(&sorted, 0.75)?;
    Some(Quartiles {
        q1,
        q2,
        q3,
        iqr: q3 - q1,
    })
}

/// Frequency of each discrete value.
pub fn histogram(values: &[usize]) -> BTreeMap<usize, usize> {
    let mut bins = BTreeMap::new();
    for &v in values {
        *bins.entry(v).or_insert(0) += 1;
    }
    bins
}

/// Values more than `k` population std-devs above or below the mean.
pub fn detect_outliers(values: &[f64], k: f64) -> Outliers {
    let Some(stats) = compute_distribution_stats(values) else {
        return Outliers::default();
    };
    let mut out = Outliers {
        mean: stats.mean,
        std_dev: stats.std_dev,
        ..Default::default()
    };
    if stats.std_dev <= 0.0 || !k.is_finite() {
        return out;
    }
    let band = k * stats.std_dev;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        if v > stats.mean + band {
            out.high.push(i);
        } else if v < stats.mean - band {
            out.low.push(i);
        }
    }
    out
}

/// Follow a dotted path through nested JSON objects (and array indices).
pub fn get_nested_value<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(value, |current, segment| match current {
        serde_json::Value::Object(map) => map.get(segment),
        serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Wilson score interval for `successes / trials`.
///
/// Zero trials yield `[0, 0]`. The returned interval always contains the
/// point estimate, rounding included.
pub fn wilson_interval(successes: usize, trials: usize, z: f64) -> ConfidenceInterval {
    if trials == 0 {
        return ConfidenceInterval::default();
    }
    let n = trials as f64;
    let p = (successes.min(trials)) as f64 / n;
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let centre = (p + z2 / (2.0 * n)) / denom;
    let margin = z * ((p * (1.0 - p) / n) + z2 / (4.0 * n * n)).sqrt() / denom;
    ConfidenceInterval {
        low: (centre - margin).clamp(0.0, 1.0).min(p),
        high: (centre + margin).clamp(0.0, 1.0).max(p),
    }
}

/// Pearson correlation; `None` when undefined.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    let r = cov / (vx.sqrt() * vy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn distribution_stats_basic() {
        let s = compute_distribution_stats(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.count, 4);
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert!((s.median - 2.5).abs() < 1e-12);
        assert!((s.std_dev - 1.25f64.sqrt()).abs() < 1e-12);
        // rank 0.9 * 3 = 2.7 -> 3 + 0.7
        assert!((s.p90 - 3.7).abs() < 1e-12);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(compute_distribution_stats(&[]).is_none());
        assert!(compute_distribution_stats(&[f64::NAN]).is_none());
        assert!(quartiles(&[]).is_none());
        assert!(percentile(&[], 0.5).is_none());
        assert!(detect_outliers(&[], 2.0).is_empty());
        assert!(detect_outliers(&[3.0, 3.0, 3.0], 2.0).is_empty());
        assert!(pearson_correlation(&[1.0], &[1.0]).is_none());
        assert!(pearson_correlation(&[1.0, 1.0], &[1.0, 2.0]).is_none());
        assert!(pearson_correlation(&[1.0, 2.0], &[1.0]).is_none());
        assert!(histogram(&[]).is_empty());
    }

    #[test]
    fn quartiles_interpolate() {
        let q = quartiles(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(q.q1, 2.0);
        assert_eq!(q.q2, 3.0);
        assert_eq!(q.q3, 4.0);
        assert_eq!(q.iqr, 2.0);
    }

    #[test]
    fn outliers_split_high_and_low() {
        let mut values = vec![5.0; 20];
        values.push(50.0);
        values.push(-40.0);
        let o = detect_outliers(&values, 2.0);
        assert_eq!(o.high, vec![20]);
        assert_eq!(o.low, vec![21]);
    }

    #[test]
    fn histogram_counts() {
        let h = histogram(&[1, 2, 2, 3, 3, 3]);
        assert_eq!(h.get(&3), Some(&3));
        assert_eq!(h.get(&1), Some(&1));
    }

    #[test]
    fn nested_lookup() {
        let v = json!({"a": {"b": {"c": 3}}, "list": [10, 20]});
        assert_eq!(get_nested_value(&v, "a.b.c"), Some(&json!(3)));
        assert_eq!(get_nested_value(&v, "list.1"), Some(&json!(20)));
        assert!(get_nested_value(&v, "a.x.c").is_none());
        assert!(get_nested_value(&v, "a.b.c.d").is_none());
        assert!(get_nested_value(&v, "").is_none());
    }

    #[test]
    fn wilson_contains_estimate() {
        for (k, n) in [(0, 10), (10, 10), (3, 7), (1, 10_000), (5000, 10_000)] {
            let ci = wilson_interval(k, n, 1.96);
            let p = k as f64 / n as f64;
            assert!(ci.contains(p), "{:?} does not contain {}", ci, p);
            assert!(ci.low >= 0.0 && ci.high <= 1.0);
        }
        assert_eq!(wilson_interval(0, 0, 1.96), ConfidenceInterval::default());
    }

    #[test]
    fn wilson_matches_reference_value() {
        // 50 / 100 at z = 1.96: [0.4038, 0.5962]
        let ci = wilson_interval(50, 100, 1.96);
        assert!((ci.low - 0.4038).abs() < 1e-3);
        assert!((ci.high - 0.5962).abs() < 1e-3);
    }

    #[test]
    fn pearson_perfect_and_inverse() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson_correlation(&xs, &ys).unwrap() - 1.0).abs() < 1e-12);
        let zs = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson_correlation(&xs, &zs).unwrap() + 1.0).abs() < 1e-12);
    }
}
