//! Error types for the statistics pipeline.

/// Errors raised while building a metric catalog.
///
/// Extraction, filtering and aggregation never fail; only malformed
/// configuration (bad paths, duplicate names) is reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    /// A metric path could not be parsed.
    #[error("invalid metric path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A metric name is empty.
    #[error("metric name must not be empty (path '{path}')")]
    EmptyName { path: String },
}

pub type StatsResult<T> = Result<T, StatsError>;
