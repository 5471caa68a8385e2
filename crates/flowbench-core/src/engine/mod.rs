//! Flow orchestration: browser loads, retries and iteration bookkeeping.

pub mod measure;
pub mod retry;
pub mod runner;

pub use measure::{measure_browser_load, IterationPlan};
pub use retry::{retry_with_tracking, Attempt, RetryOutcome, RetryPolicy};
pub use runner::BenchmarkRunner;
