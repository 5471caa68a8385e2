use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One measured iteration's metric bag.
///
/// `metrics` is kept as raw JSON so nested paths (`navigation[0].load`)
/// resolve against exactly what the driver reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub flow: String,
    pub run: u32,
    pub metrics: serde_json::Value,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl RawSample {
    pub fn new(flow: impl Into<String>, run: u32, metrics: serde_json::Value, timestamp: i64) -> Self {
        Self {
            flow: flow.into(),
            run,
            metrics,
            timestamp,
        }
    }
}

/// Metric name to ascending-sorted values.
pub type MetricSeries = BTreeMap<String, Vec<f64>>;

/// Group samples by flow name, keeping each flow's recording order.
pub fn group_by_flow(samples: Vec<RawSample>) -> BTreeMap<String, Vec<RawSample>> {
    let mut grouped: BTreeMap<String, Vec<RawSample>> = BTreeMap::new();
    for sample in samples {
        grouped.entry(sample.flow.clone()).or_default().push(sample);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn groups_preserve_run_order() {
        let samples = vec![
            RawSample::new("token-send", 0, json!({}), 1),
            RawSample::new("tab-switching", 0, json!({}), 2),
            RawSample::new("token-send", 1, json!({}), 3),
        ];
        let grouped = group_by_flow(samples);
        assert_eq!(grouped.len(), 2);
        let runs: Vec<u32> = grouped["token-send"].iter().map(|s| s.run).collect();
        assert_eq!(runs, vec![0, 1]);
    }
}
