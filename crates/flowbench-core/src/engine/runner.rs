use chrono::Utc;
use flowbench_stats::{analyze, BenchmarkResults, FilterPolicy, MetricCatalog, RawSample};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::measure::{measure_browser_load, IterationPlan};
use super::retry::{retry_with_tracking, RetryPolicy};
use crate::config::{BenchConfig, RunSettings};
use crate::driver::SessionLauncher;
use crate::flows::{Flow, FlowContext, FlowRegistry};
use crate::report::progress::FlowResultsSink;
use crate::report::{BenchmarkRunReport, FlowRunReport, FlowRunStatus, ResultsByFlow, RunArtifacts};
use crate::telemetry::{measurements, MeasurementSink};

/// Runs the configured flows one after another and records a report for each.
///
/// Nothing a flow does can abort the run: errors and panics are caught at the
/// flow boundary and turned into a `failed` report.
pub struct BenchmarkRunner {
    pub launcher: Arc<dyn SessionLauncher>,
    pub registry: FlowRegistry,
    pub settings: RunSettings,
    pub ctx: FlowContext,
    pub catalog: MetricCatalog,
    pub filters: FilterPolicy,
    pub sinks: Vec<Arc<dyn MeasurementSink>>,
    pub run_id: String,
}

/// A flow that produced results: `(display name, results)`.
type Produced = Option<(String, BenchmarkResults)>;

impl BenchmarkRunner {
    pub fn from_config(
        config: &BenchConfig,
        launcher: Arc<dyn SessionLauncher>,
    ) -> anyhow::Result<Self> {
        let catalog = config.catalog()?;
        Ok(Self {
            launcher,
            registry: FlowRegistry::standard(&config.run.pacing),
            settings: config.run.clone(),
            ctx: FlowContext::from_config(config),
            catalog,
            filters: config.filters.clone(),
            sinks: Vec::new(),
            run_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn with_registry(mut self, registry: FlowRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn MeasurementSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Run every flow in `settings.flows`. `on_flow_results` is called after
    /// each flow that produced results, before the next one starts.
    pub async fn run(&self, on_flow_results: Option<FlowResultsSink>) -> RunArtifacts {
        let start = Utc::now();
        info!(
            run_id = %self.run_id,
            flows = self.settings.flows.len(),
            browser_loads = self.settings.browser_loads,
            iterations = self.settings.iterations,
            "benchmark run started"
        );

        let mut reports = Vec::with_capacity(self.settings.flows.len());
        let mut results = ResultsByFlow::new();

        for name in &self.settings.flows {
            let (mut report, produced) =
                match AssertUnwindSafe(self.run_flow(name)).catch_unwind().await {
                    Ok(done) => done,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(flow = %name, panic = %message, "flow panicked");
                        let mut report = self.pending_report(name);
                        report.fail(format!("Unhandled error: {message}"));
                        (report, None)
                    }
                };

            if let Some((display, flow_results)) = produced {
                self.publish(&display, &flow_results, &mut report).await;
                if let Some(sink) = &on_flow_results {
                    sink(&display, &flow_results);
                }
                results.insert(display, flow_results);
            }

            info!(
                flow = %name,
                status = report.status.as_str(),
                iterations = report.iterations_completed,
                retries = report.retries_used,
                "flow finished"
            );
            reports.push(report);
        }

        let report = BenchmarkRunReport::build(self.run_id.clone(), start, Utc::now(), reports);
        info!(
            run_id = %self.run_id,
            successful = report.summary.successful_flows,
            failed = report.summary.failed_flows,
            skipped = report.summary.skipped_flows,
            duration_ms = report.duration_ms,
            "benchmark run finished"
        );
        RunArtifacts { report, results }
    }

    fn pending_report(&self, name: &str) -> FlowRunReport {
        FlowRunReport::pending(
            name,
            self.settings.retries,
            self.settings.iterations,
            self.settings.browser_loads,
        )
    }

    async fn run_flow(&self, name: &str) -> (FlowRunReport, Produced) {
        let mut report = self.pending_report(name);
        let Some(flow) = self.registry.resolve(name) else {
            warn!(flow = %name, "unknown flow, skipping");
            report.skip(format!("Unknown flow: {name}"));
            return (report, None);
        };

        report.status = FlowRunStatus::Running;
        info!(flow = %name, "starting flow");

        let samples = self.run_browser_loads(flow.as_ref(), &mut report).await;
        if samples.is_empty() {
            error!(flow = %name, "no successful results, skipping statistics");
            report.fail("No successful results obtained");
            return (report, None);
        }

        debug!(
            flow = %name,
            raw = %serde_json::to_string(&samples).unwrap_or_default(),
            "raw samples"
        );

        let analysis = analyze(&samples, &self.catalog, &self.filters);
        for note in &analysis.notes {
            info!(flow = %name, note = %note, "data quality");
        }
        report.data_quality = analysis.notes;
        report.status = FlowRunStatus::Success;
        (report, Some((flow.id().display_name(), analysis.results)))
    }

    async fn run_browser_loads(
        &self,
        flow: &dyn Flow,
        report: &mut FlowRunReport,
    ) -> Vec<RawSample> {
        let settings = &self.settings;
        let policy = RetryPolicy::new(
            settings.retries,
            Duration::from_millis(settings.retry_delay_ms),
        );
        let plan = IterationPlan::for_flow(flow.id(), settings.iterations, settings.warmups);
        let launcher = self.launcher.as_ref();
        let ctx = &self.ctx;
        let name = flow.id().as_str();

        let mut samples = Vec::new();
        for load in 1..=settings.browser_loads {
            info!(flow = name, browser_load = load, of = settings.browser_loads, "browser load");
            let run_offset = (load - 1) * plan.iterations;
            let outcome = retry_with_tracking(policy, move |attempt| {
                debug!(flow = name, browser_load = load, attempt, "launching session");
                measure_browser_load(launcher, flow, ctx, plan, load, run_offset)
            })
            .await;

            let messages = outcome
                .failure_messages()
                .into_iter()
                .map(|m| format!("Browser load {load}: {m}"));

            if outcome.succeeded() {
                report.retries_used = report.retries_used.max(outcome.retries_used());
                report.warnings.extend(messages);
                let load_samples = outcome.into_value().unwrap_or_default();
                report.iterations_completed += load_samples.len() as u32;
                report.browser_loads_completed += 1;
                samples.extend(load_samples);
            } else {
                error!(flow = name, browser_load = load, "browser load failed after retries");
                // Aborted loads count the whole budget, like exhausted ones.
                report.retries_used = report.retries_used.max(settings.retries);
                report.errors.extend(messages);
            }
        }
        samples
    }

    /// Push a flow's aggregates to every sink. Sink failures become warnings.
    async fn publish(&self, display: &str, results: &BenchmarkResults, report: &mut FlowRunReport) {
        if self.sinks.is_empty() {
            return;
        }
        let batch = measurements(&self.run_id, display, results);
        for sink in &self.sinks {
            if let Err(e) = sink.record(&batch).await {
                warn!(sink = sink.name(), error = %e, "measurement sink failed");
                report
                    .warnings
                    .push(format!("Telemetry {}: {e}", sink.name()));
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "flow panicked".to_string()
    }
}
