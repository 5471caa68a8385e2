//! Run and per-flow reports.

pub mod console;
pub mod json;
pub mod progress;

use chrono::{DateTime, Utc};
use flowbench_stats::{BenchmarkResults, DataQualityNote};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowRunStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl FlowRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowRunStatus::Pending => "pending",
            FlowRunStatus::Running => "running",
            FlowRunStatus::Success => "success",
            FlowRunStatus::Failed => "failed",
            FlowRunStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowRunStatus::Success | FlowRunStatus::Failed | FlowRunStatus::Skipped
        )
    }

    pub fn icon(&self) -> &'static str {
        match self {
            FlowRunStatus::Success => "✅",
            FlowRunStatus::Failed => "❌",
            FlowRunStatus::Skipped => "⏭️",
            FlowRunStatus::Running => "🔄",
            FlowRunStatus::Pending => "⏳",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRunReport {
    pub flow_name: String,
    pub status: FlowRunStatus,
    pub retries_used: u32,
    pub total_retries: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_quality: Vec<DataQualityNote>,
    pub iterations_completed: u32,
    pub iterations_requested: u32,
    pub browser_loads_completed: u32,
    pub browser_loads_requested: u32,
}

impl FlowRunReport {
    pub fn pending(
        flow_name: impl Into<String>,
        total_retries: u32,
        iterations_requested: u32,
        browser_loads_requested: u32,
    ) -> Self {
        Self {
            flow_name: flow_name.into(),
            status: FlowRunStatus::Pending,
            retries_used: 0,
            total_retries,
            errors: Vec::new(),
            warnings: Vec::new(),
            data_quality: Vec::new(),
            iterations_completed: 0,
            iterations_requested,
            browser_loads_completed: 0,
            browser_loads_requested,
        }
    }

    pub fn skip(&mut self, warning: impl Into<String>) {
        self.status = FlowRunStatus::Skipped;
        self.warnings.push(warning.into());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = FlowRunStatus::Failed;
        self.errors.push(error.into());
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_flows: usize,
    pub successful_flows: usize,
    pub failed_flows: usize,
    pub skipped_flows: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[FlowRunReport]) -> Self {
        let count = |status: FlowRunStatus| reports.iter().filter(|r| r.status == status).count();
        Self {
            total_flows: reports.len(),
            successful_flows: count(FlowRunStatus::Success),
            failed_flows: count(FlowRunStatus::Failed),
            skipped_flows: count(FlowRunStatus::Skipped),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRunReport {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    /// 1 when any flow failed, else 0.
    pub exit_code: i32,
    pub flow_reports: Vec<FlowRunReport>,
    pub summary: RunSummary,
}

impl BenchmarkRunReport {
    pub fn build(
        run_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        flow_reports: Vec<FlowRunReport>,
    ) -> Self {
        let summary = RunSummary::from_reports(&flow_reports);
        Self {
            run_id: run_id.into(),
            start_time,
            end_time,
            duration_ms: (end_time - start_time).num_milliseconds(),
            exit_code: if summary.failed_flows > 0 { 1 } else { 0 },
            flow_reports,
            summary,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.summary.failed_flows == 0
    }
}

/// Results keyed by flow display name.
pub type ResultsByFlow = BTreeMap<String, BenchmarkResults>;

/// The persisted document: `{ report, results }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkOutput {
    pub report: BenchmarkRunReport,
    pub results: ResultsByFlow,
}

/// What [`crate::engine::BenchmarkRunner::run`] hands back.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub report: BenchmarkRunReport,
    pub results: ResultsByFlow,
}

impl RunArtifacts {
    pub fn into_output(self) -> BenchmarkOutput {
        BenchmarkOutput {
            report: self.report,
            results: self.results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn report(name: &str, status: FlowRunStatus) -> FlowRunReport {
        let mut r = FlowRunReport::pending(name, 3, 10, 2);
        r.status = status;
        r
    }

    #[test]
    fn summary_counts_and_exit_code() {
        let start = Utc::now();
        let end = start + Duration::milliseconds(65_000);
        let run = BenchmarkRunReport::build(
            "run-1",
            start,
            end,
            vec![
                report("tab-switching", FlowRunStatus::Success),
                report("token-send", FlowRunStatus::Failed),
                report("bogus", FlowRunStatus::Skipped),
            ],
        );
        assert_eq!(run.duration_ms, 65_000);
        assert_eq!(run.exit_code, 1);
        assert_eq!(
            run.summary,
            RunSummary {
                total_flows: 3,
                successful_flows: 1,
                failed_flows: 1,
                skipped_flows: 1
            }
        );
        assert!(!run.succeeded());
    }

    #[test]
    fn report_serializes_camel_case() {
        let mut r = report("tab-switching", FlowRunStatus::Success);
        r.iterations_completed = 20;
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["flowName"], "tab-switching");
        assert_eq!(v["status"], "success");
        assert_eq!(v["iterationsCompleted"], 20);
        assert_eq!(v["browserLoadsRequested"], 2);
        assert!(v.get("dataQuality").is_none());
    }

    #[test]
    fn terminal_states() {
        assert!(!FlowRunStatus::Running.is_terminal());
        assert!(FlowRunStatus::Skipped.is_terminal());
    }
}
