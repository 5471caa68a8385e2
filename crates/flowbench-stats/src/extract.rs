//! Metric extraction: resolve every catalog path against every sample.

use crate::error::{StatsError, StatsResult};
use crate::path::MetricPath;
use crate::sample::{MetricSeries, RawSample};
use serde::{Deserialize, Serialize};

/// How a metric is measured; decides which timeout threshold applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Elapsed time in ms (page-load marks, render time, TBT).
    #[default]
    Duration,
    /// Interaction-to-paint timings; zero or negative means the paint
    /// callback never fired.
    Interaction,
    /// Counters (renders, requests, scroll events).
    Count,
    /// Unitless scores and ratios.
    Score,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    pub name: String,
    pub path: MetricPath,
    pub kind: MetricKind,
}

impl MetricSpec {
    pub fn new(name: impl Into<String>, path: &str, kind: MetricKind) -> StatsResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StatsError::EmptyName {
                path: path.to_string(),
            });
        }
        Ok(Self {
            name,
            path: MetricPath::parse(path)?,
            kind,
        })
    }
}

/// Page-load marks reported by the driver's `collect_metrics`.
pub const PAGE_LOAD_METRICS: &[(&str, &str, MetricKind)] = &[
    ("uiStartup", "UI Startup", MetricKind::Duration),
    ("load", "navigation[0].load", MetricKind::Duration),
    ("domContentLoaded", "navigation[0].domContentLoaded", MetricKind::Duration),
    ("domInteractive", "navigation[0].domInteractive", MetricKind::Duration),
    ("firstPaint", "paint[\"first-paint\"]", MetricKind::Duration),
    ("backgroundConnect", "Background Connect", MetricKind::Duration),
    ("firstReactRender", "First Render", MetricKind::Duration),
    ("getState", "Get State", MetricKind::Duration),
    ("initialActions", "Initial Actions", MetricKind::Duration),
    ("loadScripts", "Load Scripts", MetricKind::Duration),
    ("setupPageLoad", "Setup Page Load", MetricKind::Duration),
    ("numNetworkReqs", "numNetworkReqs", MetricKind::Count),
];

/// Interaction, render and lazy-loading metrics produced by in-page
/// instrumentation. Name and path are identical.
pub const INTERACTION_METRICS: &[(&str, MetricKind)] = &[
    ("inp", MetricKind::Interaction),
    ("inpCount", MetricKind::Count),
    ("renderCount", MetricKind::Count),
    ("renderTime", MetricKind::Duration),
    ("averageRenderTime", MetricKind::Duration),
    ("interactionLatency", MetricKind::Duration),
    ("fcp", MetricKind::Duration),
    ("lcp", MetricKind::Duration),
    ("tti", MetricKind::Duration),
    ("tbt", MetricKind::Duration),
    ("cls", MetricKind::Score),
    ("fid", MetricKind::Interaction),
    ("networkLatency", MetricKind::Duration),
    ("networkBandwidth", MetricKind::Score),
    ("networkCacheHits", MetricKind::Count),
    ("networkCacheMisses", MetricKind::Count),
    ("networkCachePartial", MetricKind::Count),
    ("scrollToLoadLatency", MetricKind::Duration),
    ("timeToFirstVisibleAsset", MetricKind::Duration),
    ("timeTo75PercentLoaded", MetricKind::Duration),
    ("scrollEventCount", MetricKind::Count),
    ("totalScrollDistance", MetricKind::Count),
    ("assetsLoadedPerScroll", MetricKind::Score),
    ("cumulativeLoadTime", MetricKind::Duration),
];

/// Ordered set of metrics to extract. Names are unique; inserting an
/// existing name replaces its spec in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricCatalog {
    specs: Vec<MetricSpec>,
}

impl MetricCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in catalog: page-load marks followed by interaction metrics.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for (name, path, kind) in PAGE_LOAD_METRICS {
            catalog.upsert(
                MetricSpec::new(*name, path, *kind).expect("built-in metric paths are valid"),
            );
        }
        for (name, kind) in INTERACTION_METRICS {
            catalog.upsert(
                MetricSpec::new(*name, name, *kind).expect("built-in metric paths are valid"),
            );
        }
        catalog
    }

    pub fn upsert(&mut self, spec: MetricSpec) {
        match self.specs.iter_mut().find(|s| s.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetricSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.get(name).map(|s| s.kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Build one ascending-sorted series per catalog metric.
///
/// Samples whose path is missing or non-numeric are skipped for that metric;
/// metrics with no values at all are absent from the result.
pub fn extract_series(samples: &[RawSample], catalog: &MetricCatalog) -> MetricSeries {
    let mut series = MetricSeries::new();
    for spec in catalog.iter() {
        let mut values: Vec<f64> = samples
            .iter()
            .filter_map(|s| spec.path.resolve_number(&s.metrics))
            .collect();
        if values.is_empty() {
            continue;
        }
        values.sort_by(f64::total_cmp);
        series.insert(spec.name.clone(), values);
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(run: u32, metrics: serde_json::Value) -> RawSample {
        RawSample::new("tab-switching", run, metrics, 0)
    }

    #[test]
    fn standard_catalog_builds() {
        let catalog = MetricCatalog::standard();
        assert_eq!(
            catalog.len(),
            PAGE_LOAD_METRICS.len() + INTERACTION_METRICS.len()
        );
        assert_eq!(catalog.kind_of("inp"), Some(MetricKind::Interaction));
        assert_eq!(
            catalog.get("load").map(|s| s.path.as_str()),
            Some("navigation[0].load")
        );
    }

    #[test]
    fn upsert_replaces_existing_spec_in_place() {
        let mut catalog = MetricCatalog::standard();
        let before = catalog.len();
        catalog.upsert(MetricSpec::new("inp", "custom.inp", MetricKind::Duration).unwrap());
        assert_eq!(catalog.len(), before);
        assert_eq!(catalog.kind_of("inp"), Some(MetricKind::Duration));
        assert_eq!(catalog.iter().position(|s| s.name == "inp"), Some(12));
    }

    #[test]
    fn extraction_sorts_and_skips_unresolvable_values() {
        let samples = vec![
            sample(0, json!({ "navigation": [{ "load": 900.0 }], "inp": 48 })),
            sample(1, json!({ "navigation": [], "inp": 32 })),
            sample(2, json!({ "navigation": [{ "load": 700.0 }], "inp": null })),
        ];
        let series = extract_series(&samples, &MetricCatalog::standard());

        assert_eq!(series["load"], vec![700.0, 900.0]);
        assert_eq!(series["inp"], vec![32.0, 48.0]);
        assert!(!series.contains_key("fcp"));
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(matches!(
            MetricSpec::new("  ", "inp", MetricKind::Count),
            Err(StatsError::EmptyName { .. })
        ));
    }
}
