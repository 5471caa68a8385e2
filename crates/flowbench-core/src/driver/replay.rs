//! Offline driver that replays recorded metric bags.
//!
//! A recordings file maps flow names to an ordered list of iterations:
//!
//! ```json
//! {
//!   "tab-switching": [
//!     { "metrics": { "inp": 48, "renderCount": 12 } },
//!     { "error": "element not found: [data-testid=\"account-menu-icon\"]" }
//!   ]
//! }
//! ```
//!
//! Each measured or warmup iteration consumes one entry. A plain array of
//! raw samples (the `analyze` input format) is accepted as well.

use async_trait::async_trait;
use flowbench_stats::RawSample;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{Driver, FixtureSpec, Selector, SessionLauncher};
use crate::errors::{BenchError, BenchResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedIteration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
    /// Replayed as a driver failure for this iteration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecordedIteration {
    pub fn metrics(metrics: Value) -> Self {
        Self {
            metrics: Some(metrics),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            metrics: None,
            error: Some(message.into()),
        }
    }
}

pub type Recordings = BTreeMap<String, Vec<RecordedIteration>>;

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordingFile {
    ByFlow(Recordings),
    Samples(Vec<RawSample>),
}

type Queues = Arc<Mutex<BTreeMap<String, VecDeque<RecordedIteration>>>>;

#[derive(Debug, Clone)]
pub struct ReplayLauncher {
    queues: Queues,
}

impl ReplayLauncher {
    pub fn new(recordings: Recordings) -> Self {
        let queues = recordings
            .into_iter()
            .map(|(flow, entries)| (flow, VecDeque::from(entries)))
            .collect();
        Self {
            queues: Arc::new(Mutex::new(queues)),
        }
    }

    pub fn from_samples(samples: Vec<RawSample>) -> Self {
        let mut recordings = Recordings::new();
        for sample in samples {
            recordings
                .entry(sample.flow)
                .or_default()
                .push(RecordedIteration::metrics(sample.metrics));
        }
        Self::new(recordings)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read recordings {}", path.display()))?;
        let parsed: RecordingFile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse recordings {}", path.display()))?;
        Ok(match parsed {
            RecordingFile::ByFlow(recordings) => Self::new(recordings),
            RecordingFile::Samples(samples) => Self::from_samples(samples),
        })
    }

    /// Entries not yet consumed for `flow`.
    pub async fn remaining(&self, flow: &str) -> usize {
        self.queues.lock().await.get(flow).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl SessionLauncher for ReplayLauncher {
    async fn launch(&self, fixture: &FixtureSpec) -> BenchResult<Box<dyn Driver>> {
        tracing::debug!(flow = %fixture.flow, "replay session started");
        Ok(Box::new(ReplayDriver {
            flow: fixture.flow.as_str().to_string(),
            queues: Arc::clone(&self.queues),
        }))
    }
}

/// Every page interaction succeeds instantly; only `collect_metrics`
/// consults the recording.
struct ReplayDriver {
    flow: String,
    queues: Queues,
}

#[async_trait]
impl Driver for ReplayDriver {
    async fn navigate(&mut self, _route: &str) -> BenchResult<()> {
        Ok(())
    }

    async fn wait_for(&mut self, _selector: &Selector, _timeout: Duration) -> BenchResult<()> {
        Ok(())
    }

    async fn is_present(&mut self, _selector: &Selector) -> BenchResult<bool> {
        Ok(false)
    }

    async fn click(&mut self, _selector: &Selector) -> BenchResult<()> {
        Ok(())
    }

    async fn fill(&mut self, _selector: &Selector, _text: &str) -> BenchResult<()> {
        Ok(())
    }

    async fn scroll_by(&mut self, _selector: &Selector, _pixels: i64) -> BenchResult<()> {
        Ok(())
    }

    async fn execute_script(&mut self, _script: &str, _args: Vec<Value>) -> BenchResult<Value> {
        Ok(Value::Null)
    }

    async fn collect_metrics(&mut self) -> BenchResult<Value> {
        let next = self
            .queues
            .lock()
            .await
            .get_mut(&self.flow)
            .and_then(VecDeque::pop_front);

        match next {
            None => Err(BenchError::ReplayExhausted {
                flow: self.flow.clone(),
            }),
            Some(RecordedIteration {
                error: Some(message),
                ..
            }) => Err(BenchError::driver(message)),
            Some(RecordedIteration { metrics, .. }) => {
                Ok(metrics.unwrap_or_else(|| Value::Object(Default::default())))
            }
        }
    }

    async fn delay(&mut self, _duration: Duration) {}

    async fn close(&mut self) -> BenchResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::FlowId;
    use serde_json::json;

    #[tokio::test]
    async fn entries_are_consumed_in_order() {
        let mut recordings = Recordings::new();
        recordings.insert(
            "tab-switching".into(),
            vec![
                RecordedIteration::metrics(json!({ "inp": 40 })),
                RecordedIteration::failure("stale element"),
            ],
        );
        let launcher = ReplayLauncher::new(recordings);
        let mut driver = launcher.launch(&FlowId::TabSwitching.fixture()).await.unwrap();

        assert_eq!(driver.collect_metrics().await.unwrap(), json!({ "inp": 40 }));
        let err = driver.collect_metrics().await.unwrap_err();
        assert_eq!(err.to_string(), "driver error: stale element");
        let err = driver.collect_metrics().await.unwrap_err();
        assert!(matches!(err, BenchError::ReplayExhausted { .. }));
    }

    #[tokio::test]
    async fn queues_are_shared_across_sessions() {
        let launcher = ReplayLauncher::from_samples(vec![
            RawSample::new("token-send", 0, json!({ "inp": 1 }), 0),
            RawSample::new("token-send", 1, json!({ "inp": 2 }), 0),
        ]);
        let fixture = FlowId::TokenSend.fixture();

        let mut first = launcher.launch(&fixture).await.unwrap();
        first.collect_metrics().await.unwrap();
        first.close().await.unwrap();

        let mut second = launcher.launch(&fixture).await.unwrap();
        assert_eq!(second.collect_metrics().await.unwrap(), json!({ "inp": 2 }));
        assert_eq!(launcher.remaining("token-send").await, 0);
    }

    #[test]
    fn parses_both_file_shapes() {
        let dir = tempfile::tempdir().unwrap();

        let by_flow = dir.path().join("by_flow.json");
        std::fs::write(&by_flow, r#"{ "import-srp": [ { "metrics": { "load": 900 } } ] }"#).unwrap();
        assert!(ReplayLauncher::from_file(&by_flow).is_ok());

        let samples = dir.path().join("samples.json");
        std::fs::write(
            &samples,
            r#"[ { "flow": "import-srp", "run": 0, "metrics": { "load": 900 }, "timestamp": 0 } ]"#,
        )
        .unwrap();
        assert!(ReplayLauncher::from_file(&samples).is_ok());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(ReplayLauncher::from_file(&broken).is_err());
    }
}
