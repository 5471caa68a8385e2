//! Benchmark orchestration for wallet UI flows.
//!
//! A [`engine::BenchmarkRunner`] drives each configured flow through a
//! [`driver::SessionLauncher`] (live WebDriver or a recorded replay), feeds
//! the samples through the `flowbench-stats` pipeline and produces a
//! [`report::BenchmarkRunReport`] alongside the per-flow aggregates.

pub mod config;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod flows;
pub mod instrumentation;
pub mod report;
pub mod telemetry;

pub use config::BenchConfig;
pub use engine::BenchmarkRunner;
pub use errors::{BenchError, BenchResult};
pub use flows::{FlowId, FlowRegistry};
pub use report::{BenchmarkOutput, BenchmarkRunReport, FlowRunReport, FlowRunStatus, RunArtifacts};
