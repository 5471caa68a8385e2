//! Error types for flow execution.

/// Errors raised by drivers, flows and the orchestrator.
///
/// Everything below the flow boundary is recovered by the orchestrator;
/// these never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Flow name not present in the registry.
    #[error("unknown flow: {name}")]
    UnknownFlow { name: String },

    /// A fresh browser session could not be started.
    #[error("failed to launch browser session: {message}")]
    SessionLaunch { message: String },

    /// Selector matched nothing.
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// A local wait ran out.
    #[error("timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    /// Transport or protocol failure talking to the browser.
    #[error("driver error: {message}")]
    Driver { message: String },

    /// In-page script threw.
    #[error("script error: {message}")]
    Script { message: String },

    /// A browser load finished without a single measured iteration.
    #[error("{message}")]
    NoResults { message: String },

    /// Replay recording has no entries left for this flow.
    #[error("replay recording exhausted for flow {flow}")]
    ReplayExhausted { flow: String },

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    pub fn timeout(what: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            what: what.into(),
            timeout_ms,
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownFlow { .. } => "unknown_flow",
            Self::SessionLaunch { .. } => "session_launch",
            Self::ElementNotFound { .. } => "element_not_found",
            Self::Timeout { .. } => "timeout",
            Self::Driver { .. } => "driver",
            Self::Script { .. } => "script",
            Self::NoResults { .. } => "no_results",
            Self::ReplayExhausted { .. } => "replay_exhausted",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }

    /// Transient browser hiccups are worth another browser load attempt;
    /// configuration and exhausted recordings are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SessionLaunch { .. }
                | Self::ElementNotFound { .. }
                | Self::Timeout { .. }
                | Self::Driver { .. }
                | Self::Script { .. }
                | Self::NoResults { .. }
                | Self::Io(_)
        )
    }
}

pub type BenchResult<T> = Result<T, BenchError>;
