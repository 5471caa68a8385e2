//! Measurement sinks: push every aggregate somewhere besides the report.

use async_trait::async_trait;
use flowbench_stats::BenchmarkResults;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// One aggregate value, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub run_id: String,
    pub flow: String,
    /// `mean`, `min`, `max`, `stdDev`, `p75` or `p95`.
    pub stat: String,
    pub metric: String,
    pub value: f64,
}

/// Flatten results into one measurement per (stat, metric) pair.
pub fn measurements(run_id: &str, flow: &str, results: &BenchmarkResults) -> Vec<Measurement> {
    results
        .stats()
        .iter()
        .flat_map(|(stat, values)| {
            values.iter().map(move |(metric, value)| Measurement {
                run_id: run_id.to_string(),
                flow: flow.to_string(),
                stat: (*stat).to_string(),
                metric: metric.clone(),
                value: *value,
            })
        })
        .collect()
}

#[async_trait]
pub trait MeasurementSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn record(&self, batch: &[Measurement]) -> anyhow::Result<()>;
}

/// Emits each measurement as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl MeasurementSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn record(&self, batch: &[Measurement]) -> anyhow::Result<()> {
        for m in batch {
            tracing::info!(
                target: "flowbench::measurement",
                run_id = %m.run_id,
                flow = %m.flow,
                stat = %m.stat,
                metric = %m.metric,
                value = m.value,
            );
        }
        Ok(())
    }
}

/// Appends one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MeasurementSink for JsonlSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn record(&self, batch: &[Measurement]) -> anyhow::Result<()> {
        let mut buf = String::new();
        for m in batch {
            buf.push_str(&serde_json::to_string(m)?);
            buf.push('\n');
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
