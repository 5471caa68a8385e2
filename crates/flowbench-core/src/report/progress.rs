//! Per-flow completion callback. The runner calls it after each successful
//! flow so callers can persist results before the whole run finishes.

use flowbench_stats::BenchmarkResults;
use std::sync::Arc;

/// Receives `(display name, results)` for every flow that produced results.
pub type FlowResultsSink = Arc<dyn Fn(&str, &BenchmarkResults) + Send + Sync>;
