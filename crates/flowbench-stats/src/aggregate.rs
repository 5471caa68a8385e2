//! Per-metric aggregates: mean, min, max, population std-dev, nearest-rank
//! percentiles.

use crate::sample::MetricSeries;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric name to a single aggregate value.
pub type StatisticalResult = BTreeMap<String, f64>;

/// The six aggregates reported for one flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResults {
    pub mean: StatisticalResult,
    pub min: StatisticalResult,
    pub max: StatisticalResult,
    pub std_dev: StatisticalResult,
    pub p75: StatisticalResult,
    pub p95: StatisticalResult,
}

impl BenchmarkResults {
    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// `(stat name, result)` pairs in report order.
    pub fn stats(&self) -> [(&'static str, &StatisticalResult); 6] {
        [
            ("mean", &self.mean),
            ("min", &self.min),
            ("max", &self.max),
            ("stdDev", &self.std_dev),
            ("p75", &self.p75),
            ("p95", &self.p95),
        ]
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Population standard deviation; exactly 0 for a single value.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    match values.len() {
        0 => None,
        1 => Some(0.0),
        _ => {
            let avg = mean(values)?;
            let squared: Vec<f64> = values.iter().map(|v| (v - avg).powi(2)).collect();
            mean(&squared).map(f64::sqrt)
        }
    }
}

/// Nearest-rank percentile without interpolation:
/// `sorted[floor(p / 100 * len)]`, index clamped to the last element.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = ((p / 100.0) * sorted.len() as f64).floor();
    let index = if rank.is_nan() || rank < 0.0 {
        0
    } else {
        (rank as usize).min(sorted.len() - 1)
    };
    Some(sorted.get(index).copied().unwrap_or(0.0))
}

fn per_metric(series: &MetricSeries, calc: impl Fn(&[f64]) -> Option<f64>) -> StatisticalResult {
    series
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .filter_map(|(name, values)| calc(values).map(|v| (name.clone(), v)))
        .collect()
}

/// Aggregate every non-empty series. Empty series are omitted from all six
/// results rather than reported as 0 or NaN.
pub fn aggregate(series: &MetricSeries) -> BenchmarkResults {
    BenchmarkResults {
        mean: per_metric(series, mean),
        min: per_metric(series, min),
        max: per_metric(series, max),
        std_dev: per_metric(series, std_dev),
        p75: per_metric(series, |v| percentile(v, 75.0)),
        p95: per_metric(series, |v| percentile(v, 95.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_has_zero_std_dev() {
        assert_eq!(std_dev(&[42.0]), Some(0.0));
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn population_std_dev() {
        // mean 5, squared diffs 9,1,1,1,0,0,4,16 -> 32/8 = 4 -> 2
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(std_dev(&v), Some(2.0));
    }

    #[test]
    fn nearest_rank_percentiles() {
        let v: Vec<f64> = (1..=10).map(f64::from).collect();
        // floor(0.75 * 10) = 7 -> 8th smallest
        assert_eq!(percentile(&v, 75.0), Some(8.0));
        // floor(0.95 * 10) = 9 -> 10th smallest
        assert_eq!(percentile(&v, 95.0), Some(10.0));
        assert_eq!(percentile(&[3.0, 1.0, 2.0], 75.0), Some(3.0));
        assert_eq!(percentile(&[7.0], 95.0), Some(7.0));
    }

    #[test]
    fn percentile_clamps_out_of_range_ranks() {
        let v = [5.0, 1.0, 9.0];
        assert_eq!(percentile(&v, 100.0), Some(9.0));
        assert_eq!(percentile(&v, 250.0), Some(9.0));
        assert_eq!(percentile(&v, -10.0), Some(1.0));
        assert_eq!(percentile(&v, f64::NAN), Some(1.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn aggregate_omits_empty_series() {
        let mut series = MetricSeries::new();
        series.insert("inp".into(), vec![10.0, 11.0, 12.0, 13.0]);
        series.insert("fcp".into(), vec![]);

        let results = aggregate(&series);
        assert_eq!(results.mean.get("inp"), Some(&11.5));
        assert_eq!(results.min.get("inp"), Some(&10.0));
        assert_eq!(results.max.get("inp"), Some(&13.0));
        assert_eq!(results.p75.get("inp"), Some(&13.0));
        assert_eq!(results.p95.get("inp"), Some(&13.0));
        for (_, stat) in results.stats() {
            assert!(!stat.contains_key("fcp"));
        }
    }

    #[test]
    fn serializes_with_camel_case_std_dev() {
        let mut series = MetricSeries::new();
        series.insert("load".into(), vec![100.0]);
        let json = serde_json::to_value(aggregate(&series)).unwrap();
        assert_eq!(json["stdDev"]["load"], 0.0);
        assert_eq!(json["p95"]["load"], 100.0);
    }
}
