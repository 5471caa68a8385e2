//! Statistics core for flowbench.
//!
//! Turns raw per-iteration metric bags into per-flow aggregates:
//!
//! - [`extract`]: resolve metric paths (`navigation[0].load`) into sorted series
//! - [`filter`]: drop timed-out sentinels, then IQR outliers
//! - [`aggregate`]: mean / min / max / stdDev / nearest-rank p75 and p95
//!
//! Every stage is a pure function over immutable input.

pub mod aggregate;
pub mod error;
pub mod extract;
pub mod filter;
pub mod path;
pub mod pipeline;
pub mod sample;

pub use aggregate::{aggregate, percentile, BenchmarkResults, StatisticalResult};
pub use error::{StatsError, StatsResult};
pub use extract::{extract_series, MetricCatalog, MetricKind, MetricSpec};
pub use filter::{DataQualityNote, FilterOutcome, FilterPolicy, FilterStage};
pub use path::MetricPath;
pub use pipeline::{analyze, Analysis};
pub use sample::{group_by_flow, MetricSeries, RawSample};
