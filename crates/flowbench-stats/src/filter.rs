//! Data-quality filtering: timeout/sentinel removal, then IQR outliers.
//!
//! Both passes are pure: they take a slice and return a new vector.

use crate::extract::{MetricCatalog, MetricKind};
use crate::sample::MetricSeries;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest sample that gets a quartile split. Shorter series pass through.
pub const MIN_OUTLIER_SAMPLES: usize = 4;

pub const DEFAULT_INTERACTION_TIMEOUT_MS: f64 = 2000.0;
pub const DEFAULT_GENERIC_TIMEOUT_MS: f64 = 60_000.0;
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FilterPolicy {
    /// Master switch; when off, series pass through untouched.
    pub enabled: bool,
    /// Ceiling for `interaction` metrics (wait-for-next-paint timeout).
    pub interaction_timeout_ms: f64,
    /// Ceiling for other `duration` metrics.
    pub generic_timeout_ms: f64,
    /// Tukey fence multiplier.
    pub iqr_multiplier: f64,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            interaction_timeout_ms: DEFAULT_INTERACTION_TIMEOUT_MS,
            generic_timeout_ms: DEFAULT_GENERIC_TIMEOUT_MS,
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
        }
    }
}

impl FilterPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.interaction_timeout_ms > 0.0) {
            return Err("filters.interaction_timeout_ms must be > 0".to_string());
        }
        if !(self.generic_timeout_ms > 0.0) {
            return Err("filters.generic_timeout_ms must be > 0".to_string());
        }
        if !(self.iqr_multiplier >= 0.0) || !self.iqr_multiplier.is_finite() {
            return Err("filters.iqr_multiplier must be a finite value >= 0".to_string());
        }
        Ok(())
    }

    /// Threshold and zero-sentinel flag for a metric kind; `None` means no
    /// timeout pass.
    pub fn timeout_for(&self, kind: MetricKind) -> Option<TimeoutRule> {
        match kind {
            MetricKind::Interaction => Some(TimeoutRule {
                threshold_ms: self.interaction_timeout_ms,
                zero_is_sentinel: true,
            }),
            MetricKind::Duration => Some(TimeoutRule {
                threshold_ms: self.generic_timeout_ms,
                zero_is_sentinel: false,
            }),
            MetricKind::Count | MetricKind::Score => None,
        }
    }

    /// Filter every series in `series`. Metrics left with no values are
    /// dropped from the output.
    pub fn apply(&self, series: &MetricSeries, catalog: &MetricCatalog) -> FilterOutcome {
        if !self.enabled {
            return FilterOutcome {
                series: series.clone(),
                notes: Vec::new(),
            };
        }

        let mut out = MetricSeries::new();
        let mut notes = Vec::new();

        for (name, values) in series {
            let kind = catalog.kind_of(name).unwrap_or(MetricKind::Score);
            let mut current = values.clone();

            if let Some(rule) = self.timeout_for(kind) {
                let kept = filter_timeouts(&current, rule);
                if kept.len() < current.len() {
                    notes.push(DataQualityNote::new(
                        name,
                        FilterStage::Timeout,
                        current.len() - kept.len(),
                        kept.len(),
                    ));
                }
                current = kept;
            }

            let kept = remove_outliers(&current, self.iqr_multiplier);
            if kept.len() < current.len() {
                notes.push(DataQualityNote::new(
                    name,
                    FilterStage::Outlier,
                    current.len() - kept.len(),
                    kept.len(),
                ));
            }
            current = kept;

            if current.is_empty() {
                tracing::debug!(metric = %name, "no samples left after filtering");
                continue;
            }
            out.insert(name.clone(), current);
        }

        for note in &notes {
            tracing::debug!(
                metric = %note.metric,
                stage = ?note.stage,
                removed = note.removed,
                remaining = note.remaining,
                "data-quality filter removed samples"
            );
        }

        FilterOutcome { series: out, notes }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutRule {
    pub threshold_ms: f64,
    pub zero_is_sentinel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    Timeout,
    Outlier,
}

/// One removal step, kept for the data-quality section of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityNote {
    pub metric: String,
    pub stage: FilterStage,
    pub removed: usize,
    pub remaining: usize,
}

impl DataQualityNote {
    pub fn new(metric: &str, stage: FilterStage, removed: usize, remaining: usize) -> Self {
        Self {
            metric: metric.to_string(),
            stage,
            removed,
            remaining,
        }
    }
}

impl fmt::Display for DataQualityNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.stage {
            FilterStage::Timeout => "timed-out",
            FilterStage::Outlier => "outlier",
        };
        write!(
            f,
            "{}: removed {} {} value(s), {} remaining",
            self.metric, self.removed, what, self.remaining
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    pub series: MetricSeries,
    pub notes: Vec<DataQualityNote>,
}

/// Drop values above the threshold, negative sentinels, non-finite values
/// and, when the rule says so, zeros. Order is preserved.
pub fn filter_timeouts(values: &[f64], rule: TimeoutRule) -> Vec<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v >= 0.0 && *v <= rule.threshold_ms)
        .filter(|v| !(rule.zero_is_sentinel && *v == 0.0))
        .collect()
}

/// Q1 and Q3 by linear interpolation between closest ranks.
/// `sorted` must be ascending and non-empty.
pub fn quartiles(sorted: &[f64]) -> Option<(f64, f64)> {
    if sorted.is_empty() {
        return None;
    }
    Some((quantile_sorted(sorted, 0.25), quantile_sorted(sorted, 0.75)))
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Tukey-fence outlier removal. Input order is preserved; series shorter
/// than [`MIN_OUTLIER_SAMPLES`] come back unchanged.
pub fn remove_outliers(values: &[f64], multiplier: f64) -> Vec<f64> {
    if values.len() < MIN_OUTLIER_SAMPLES {
        return values.to_vec();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let Some((q1, q3)) = quartiles(&sorted) else {
        return values.to_vec();
    };
    let iqr = q3 - q1;
    let lower = q1 - multiplier * iqr;
    let upper = q3 + multiplier * iqr;

    values
        .iter()
        .copied()
        .filter(|v| *v >= lower && *v <= upper)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MetricSpec;

    const INTERACTION: TimeoutRule = TimeoutRule {
        threshold_ms: 2000.0,
        zero_is_sentinel: true,
    };

    #[test]
    fn timeout_filter_drops_sentinels_and_slow_values() {
        let kept = filter_timeouts(&[150.0, 200.0, -1.0, 5000.0, 300.0], INTERACTION);
        assert_eq!(kept, vec![150.0, 200.0, 300.0]);
    }

    #[test]
    fn timeout_filter_keeps_zero_for_durations() {
        let rule = TimeoutRule {
            threshold_ms: 60_000.0,
            zero_is_sentinel: false,
        };
        assert_eq!(filter_timeouts(&[0.0, 12.0], rule), vec![0.0, 12.0]);
        assert_eq!(filter_timeouts(&[0.0, 12.0], INTERACTION), vec![12.0]);
        assert_eq!(filter_timeouts(&[f64::NAN, f64::INFINITY, 3.0], rule), vec![3.0]);
    }

    #[test]
    fn iqr_removes_the_obvious_outlier() {
        let kept = remove_outliers(&[10.0, 11.0, 12.0, 13.0, 1000.0], DEFAULT_IQR_MULTIPLIER);
        assert_eq!(kept, vec![10.0, 11.0, 12.0, 13.0]);
        assert_eq!(
            remove_outliers(&[10.0, 12.0, 11.0, 13.0, 1000.0], DEFAULT_IQR_MULTIPLIER),
            vec![10.0, 12.0, 11.0, 13.0]
        );
        let mean = kept.iter().sum::<f64>() / kept.len() as f64;
        assert_eq!(mean, 11.5);
    }

    #[test]
    fn iqr_is_identity_below_four_samples() {
        assert_eq!(remove_outliers(&[], 1.5), Vec::<f64>::new());
        assert_eq!(remove_outliers(&[5.0], 1.5), vec![5.0]);
        assert_eq!(remove_outliers(&[1.0, 1000.0, 2.0], 1.5), vec![1.0, 1000.0, 2.0]);
    }

    #[test]
    fn iqr_second_pass_removes_nothing() {
        let inputs: [&[f64]; 3] = [
            &[10.0, 12.0, 11.0, 13.0, 1000.0],
            &[48.0, 52.0, 50.0, 51.0, 49.0, 47.0, 400.0, 53.0],
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        ];
        for input in inputs {
            let once = remove_outliers(input, DEFAULT_IQR_MULTIPLIER);
            assert!(once.len() >= MIN_OUTLIER_SAMPLES);
            let twice = remove_outliers(&once, DEFAULT_IQR_MULTIPLIER);
            assert_eq!(once, twice, "second pass changed {input:?}");
        }
    }

    #[test]
    fn quartiles_interpolate() {
        assert_eq!(quartiles(&[10.0, 11.0, 12.0, 13.0, 1000.0]), Some((11.0, 13.0)));
        assert_eq!(quartiles(&[1.0, 2.0, 3.0, 4.0]), Some((1.75, 3.25)));
        assert_eq!(quartiles(&[]), None);
    }

    #[test]
    fn policy_applies_both_passes_and_records_notes() {
        let mut catalog = MetricCatalog::new();
        catalog.upsert(MetricSpec::new("inp", "inp", MetricKind::Interaction).unwrap());
        catalog.upsert(MetricSpec::new("renderCount", "renderCount", MetricKind::Count).unwrap());

        let mut series = MetricSeries::new();
        series.insert("inp".into(), vec![-1.0, 40.0, 41.0, 42.0, 43.0, 900.0, 2500.0]);
        series.insert("renderCount".into(), vec![0.0, 0.0]);

        let outcome = FilterPolicy::default().apply(&series, &catalog);

        assert_eq!(outcome.series["inp"], vec![40.0, 41.0, 42.0, 43.0]);
        assert_eq!(outcome.series["renderCount"], vec![0.0, 0.0]);
        assert_eq!(
            outcome.notes,
            vec![
                DataQualityNote::new("inp", FilterStage::Timeout, 2, 5),
                DataQualityNote::new("inp", FilterStage::Outlier, 1, 4),
            ]
        );
        assert_eq!(
            outcome.notes[0].to_string(),
            "inp: removed 2 timed-out value(s), 5 remaining"
        );
        // input untouched
        assert_eq!(series["inp"].len(), 7);
    }

    #[test]
    fn metric_with_no_survivors_is_dropped() {
        let mut catalog = MetricCatalog::new();
        catalog.upsert(MetricSpec::new("inp", "inp", MetricKind::Interaction).unwrap());
        let mut series = MetricSeries::new();
        series.insert("inp".into(), vec![-1.0, 0.0, 3000.0]);

        let outcome = FilterPolicy::default().apply(&series, &catalog);
        assert!(outcome.series.is_empty());
        assert_eq!(outcome.notes.len(), 1);
    }

    #[test]
    fn disabled_policy_is_passthrough() {
        let policy = FilterPolicy {
            enabled: false,
            ..FilterPolicy::default()
        };
        let mut series = MetricSeries::new();
        series.insert("inp".into(), vec![-1.0, 5000.0]);
        let outcome = policy.apply(&series, &MetricCatalog::standard());
        assert_eq!(outcome.series, series);
        assert!(outcome.notes.is_empty());
    }

    #[test]
    fn validate_rejects_nonsense_thresholds() {
        let bad = FilterPolicy {
            interaction_timeout_ms: 0.0,
            ..FilterPolicy::default()
        };
        assert!(bad.validate().is_err());
        assert!(FilterPolicy::default().validate().is_ok());
    }
}
