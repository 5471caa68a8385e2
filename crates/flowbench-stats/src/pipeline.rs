use crate::aggregate::{aggregate, BenchmarkResults};
use crate::extract::{extract_series, MetricCatalog};
use crate::filter::{DataQualityNote, FilterPolicy};
use crate::sample::RawSample;

/// Output of the extract -> filter -> aggregate pipeline for one flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub results: BenchmarkResults,
    pub notes: Vec<DataQualityNote>,
    pub sample_count: usize,
}

/// Run the full statistics pipeline over one flow's measured samples.
pub fn analyze(samples: &[RawSample], catalog: &MetricCatalog, policy: &FilterPolicy) -> Analysis {
    let raw = extract_series(samples, catalog);
    let filtered = policy.apply(&raw, catalog);
    Analysis {
        results: aggregate(&filtered.series),
        notes: filtered.notes,
        sample_count: samples.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn end_to_end_over_samples() {
        let inps = [10.0, 12.0, 11.0, 13.0, 1000.0];
        let samples: Vec<RawSample> = inps
            .iter()
            .enumerate()
            .map(|(i, inp)| {
                RawSample::new(
                    "tab-switching",
                    i as u32,
                    json!({ "inp": inp, "renderCount": 3, "navigation": [{ "load": 500 }] }),
                    0,
                )
            })
            .collect();

        let analysis = analyze(&samples, &MetricCatalog::standard(), &FilterPolicy::default());

        assert_eq!(analysis.sample_count, 5);
        assert_eq!(analysis.results.mean["inp"], 11.5);
        assert_eq!(analysis.results.mean["renderCount"], 3.0);
        assert_eq!(analysis.results.std_dev["load"], 0.0);
        assert_eq!(analysis.notes.len(), 1);
        assert_eq!(analysis.notes[0].metric, "inp");
    }
}
