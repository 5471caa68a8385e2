use anyhow::Context;
use chrono::Utc;
use flowbench_core::config::BenchConfig;
use flowbench_core::flows::display_name;
use flowbench_core::report::json::prepare_output_path;
use flowbench_core::report::{
    BenchmarkOutput, BenchmarkRunReport, FlowRunReport, FlowRunStatus, ResultsByFlow,
};
use flowbench_stats::{analyze, group_by_flow, RawSample};
use tracing::info;

use super::super::args::AnalyzeArgs;

pub fn run(args: AnalyzeArgs) -> anyhow::Result<i32> {
    let cfg = BenchConfig::load(args.config.as_deref())?;
    let catalog = cfg.catalog()?;

    let text = std::fs::read_to_string(&args.samples)
        .with_context(|| format!("failed to read samples {}", args.samples.display()))?;
    let samples: Vec<RawSample> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse samples {}", args.samples.display()))?;

    if let Some(out) = &args.out {
        prepare_output_path(out)?;
    }

    let start = Utc::now();
    let mut reports = Vec::new();
    let mut results = ResultsByFlow::new();
    for (flow, samples) in group_by_flow(samples) {
        let analysis = analyze(&samples, &catalog, &cfg.filters);
        info!(
            flow = %flow,
            samples = analysis.sample_count,
            removed = analysis.notes.iter().map(|n| n.removed).sum::<usize>(),
            "analyzed"
        );

        let count = analysis.sample_count as u32;
        let mut report = FlowRunReport::pending(&flow, 0, count, 0);
        report.status = FlowRunStatus::Success;
        report.iterations_completed = count;
        report.data_quality = analysis.notes;
        reports.push(report);
        results.insert(display_name(&flow), analysis.results);
    }

    let output = BenchmarkOutput {
        report: BenchmarkRunReport::build(
            uuid::Uuid::new_v4().to_string(),
            start,
            Utc::now(),
            reports,
        ),
        results,
    };
    super::emit_output(&output, args.out.as_deref(), args.quiet)
}
