//! `flowbench.yaml` configuration.

use anyhow::Context;
use flowbench_stats::{FilterPolicy, MetricCatalog, MetricKind, MetricSpec, StatsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::flows::FlowId;

pub const DEFAULT_CONFIG_PATH: &str = "flowbench.yaml";

pub const DEFAULT_BROWSER_LOADS: u32 = 10;
pub const DEFAULT_ITERATIONS: u32 = 10;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_PAINT_TIMEOUT_MS: u64 = 2000;

/// Wallet password used by the e2e fixtures.
pub const DEFAULT_PASSWORD: &str = "correct horse battery staple";
/// Public recovery phrase of the e2e fixture wallet.
pub const DEFAULT_SRP: &str =
    "spread raise short crane omit tent fringe mandate neglect detail suspect cradle";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    pub run: RunSettings,
    pub filters: FilterPolicy,
    /// Extra or replacement metric definitions on top of the built-in catalog.
    pub metrics: Vec<MetricOverride>,
    pub driver: DriverConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RunSettings {
    /// Flow names in execution order. Unknown names are reported as skipped.
    pub flows: Vec<String>,
    pub browser_loads: u32,
    pub iterations: u32,
    /// Discarded iterations per browser load before measuring.
    pub warmups: u32,
    /// Extra attempts per browser load after the first.
    pub retries: u32,
    pub retry_delay_ms: u64,
    /// Ceiling for the wait-for-next-paint after a tracked click.
    pub paint_timeout_ms: u64,
    pub pacing: Pacing,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            flows: FlowId::ALL.iter().map(|f| f.as_str().to_string()).collect(),
            browser_loads: DEFAULT_BROWSER_LOADS,
            iterations: DEFAULT_ITERATIONS,
            warmups: 0,
            retries: DEFAULT_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            paint_timeout_ms: DEFAULT_PAINT_TIMEOUT_MS,
            pacing: Pacing::default(),
        }
    }
}

/// Settle delays around each measured iteration, in milliseconds.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Pacing {
    pub before_flow_ms: u64,
    pub after_flow_ms: u64,
    pub between_iterations_ms: u64,
    /// Extra wait after unlock when the balance never showed up.
    pub balance_fallback_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            before_flow_ms: 500,
            after_flow_ms: 1000,
            between_iterations_ms: 1000,
            balance_fallback_ms: 5000,
        }
    }
}

impl Pacing {
    /// All waits disabled; used by replays and tests.
    pub fn none() -> Self {
        Self {
            before_flow_ms: 0,
            after_flow_ms: 0,
            between_iterations_ms: 0,
            balance_fallback_ms: 0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MetricOverride {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub kind: MetricKind,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Webdriver,
    Replay,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    pub kind: DriverKind,
    /// Recordings file for `kind: replay`.
    pub replay_file: Option<PathBuf>,
    pub webdriver_url: String,
    /// Base URL of the installed extension, e.g. `chrome-extension://<id>`.
    pub extension_url: Option<String>,
    pub browser: Browser,
    pub headless: bool,
    /// Extra browser command-line arguments, e.g. `--load-extension=dist/chrome`.
    pub args: Vec<String>,
    pub password: String,
    pub srp: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: DriverKind::default(),
            replay_file: None,
            webdriver_url: "http://localhost:9515".to_string(),
            extension_url: None,
            browser: Browser::default(),
            headless: false,
            args: Vec::new(),
            password: DEFAULT_PASSWORD.to_string(),
            srp: DEFAULT_SRP.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Emit every aggregate as a structured log event.
    pub log: bool,
    /// Append every aggregate as one JSON line to this file.
    pub jsonl: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log: true,
            jsonl: None,
        }
    }
}

impl BenchConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `flowbench.yaml` in the
    /// working directory is used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_PATH);
                    Self::default()
                }
            }
        };
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid config: {}", e))?;
        Ok(config)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.run.browser_loads == 0 {
            return Err("run.browser_loads must be >= 1".to_string());
        }
        if self.run.iterations == 0 {
            return Err("run.iterations must be >= 1".to_string());
        }
        if self.run.paint_timeout_ms == 0 {
            return Err("run.paint_timeout_ms must be > 0".to_string());
        }
        self.filters.validate()?;
        if self.driver.kind == DriverKind::Replay && self.driver.replay_file.is_none() {
            return Err("driver.replay_file is required when driver.kind is replay".to_string());
        }
        self.catalog().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Built-in metric catalog with `metrics` overrides applied.
    pub fn catalog(&self) -> StatsResult<MetricCatalog> {
        let mut catalog = MetricCatalog::standard();
        for m in &self.metrics {
            catalog.upsert(MetricSpec::new(m.name.clone(), &m.path, m.kind)?);
        }
        Ok(catalog)
    }
}
