//! W3C WebDriver client (chromedriver / geckodriver).
//!
//! Only the handful of endpoints flows need: session lifecycle, navigation,
//! element lookup, click, value, synchronous script execution.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{Driver, FixtureSpec, Selector, SessionLauncher};
use crate::config::{Browser, DriverConfig};
use crate::errors::{BenchError, BenchResult};
use crate::instrumentation::{CLEAR_NETWORK_SCRIPT, COLLECT_PAGE_METRICS_SCRIPT, SCROLL_SCRIPT};

/// Web element identifier key defined by the W3C spec.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    client: reqwest::Client,
    base_url: String,
    extension_url: String,
    browser: Browser,
    headless: bool,
    args: Vec<String>,
}

impl WebDriverLauncher {
    pub fn new(config: &DriverConfig) -> anyhow::Result<Self> {
        let extension_url = config
            .extension_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("driver.extension_url is required for webdriver runs"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url: config.webdriver_url.trim_end_matches('/').to_string(),
            extension_url: extension_url.trim_end_matches('/').to_string(),
            browser: config.browser.clone(),
            headless: config.headless,
            args: config.args.clone(),
        })
    }

    fn capabilities(&self) -> Value {
        let mut args = self.args.clone();
        match self.browser {
            Browser::Chrome => {
                if self.headless {
                    args.push("--headless=new".to_string());
                }
                json!({
                    "capabilities": {
                        "alwaysMatch": {
                            "browserName": "chrome",
                            "goog:chromeOptions": { "args": args }
                        }
                    }
                })
            }
            Browser::Firefox => {
                if self.headless {
                    args.push("-headless".to_string());
                }
                json!({
                    "capabilities": {
                        "alwaysMatch": {
                            "browserName": "firefox",
                            "moz:firefoxOptions": { "args": args }
                        }
                    }
                })
            }
        }
    }
}

#[async_trait]
impl SessionLauncher for WebDriverLauncher {
    async fn launch(&self, fixture: &FixtureSpec) -> BenchResult<Box<dyn Driver>> {
        for node in &fixture.local_nodes {
            debug!(port = node.port, chain_id = node.chain_id, "fixture expects local node");
        }

        let response = self
            .client
            .post(format!("{}/session", self.base_url))
            .json(&self.capabilities())
            .send()
            .await
            .map_err(|e| BenchError::SessionLaunch {
                message: format!("webdriver unreachable: {}", e),
            })?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| BenchError::SessionLaunch {
            message: format!("invalid new-session response: {}", e),
        })?;
        if !status.is_success() {
            return Err(BenchError::SessionLaunch {
                message: w3c_message(&body),
            });
        }
        let session_id = body
            .pointer("/value/sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BenchError::SessionLaunch {
                message: "new-session response carried no sessionId".to_string(),
            })?
            .to_string();
        info!(session = %session_id, flow = %fixture.flow, "browser session started");

        let mut session = WebDriverSession {
            client: self.client.clone(),
            session_url: format!("{}/session/{}", self.base_url, session_id),
            extension_url: self.extension_url.clone(),
        };
        if let Err(e) = session.navigate(fixture.start_route()).await {
            // Don't leak the browser when the start page never loads.
            let _ = session.close().await;
            return Err(e);
        }
        Ok(Box::new(session))
    }
}

struct WebDriverSession {
    client: reqwest::Client,
    session_url: String,
    extension_url: String,
}

impl WebDriverSession {
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        selector: Option<&Selector>,
    ) -> BenchResult<Value> {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.session_url, path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| BenchError::driver(format!("request failed: {}", e)))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| BenchError::driver(format!("invalid response body: {}", e)))?;

        if status.is_success() {
            return Ok(body.get("value").cloned().unwrap_or(Value::Null));
        }
        Err(map_w3c_error(&body, selector))
    }

    /// First element matching the selector, honouring the text filter.
    async fn find(&self, selector: &Selector) -> BenchResult<Option<String>> {
        let found = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": "css selector", "value": selector.css })),
                Some(selector),
            )
            .await?;
        let ids: Vec<String> = found
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let Some(wanted) = &selector.text else {
            return Ok(ids.into_iter().next());
        };
        for id in ids {
            let text = self
                .command(Method::GET, &format!("/element/{}/text", id), None, Some(selector))
                .await?;
            if text.as_str().map(str::trim) == Some(wanted.as_str()) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    async fn require(&self, selector: &Selector) -> BenchResult<String> {
        self.find(selector)
            .await?
            .ok_or_else(|| BenchError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    fn url_for(&self, route: &str) -> String {
        if route.contains("://") {
            route.to_string()
        } else {
            format!("{}/{}", self.extension_url, route.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl Driver for WebDriverSession {
    async fn navigate(&mut self, route: &str) -> BenchResult<()> {
        let url = self.url_for(route);
        self.command(Method::POST, "/url", Some(json!({ "url": url })), None)
            .await
            .map(|_| ())
    }

    async fn wait_for(&mut self, selector: &Selector, timeout: Duration) -> BenchResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.find(selector).await?.is_some() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BenchError::timeout(
                    selector.to_string(),
                    timeout.as_millis() as u64,
                ));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn is_present(&mut self, selector: &Selector) -> BenchResult<bool> {
        Ok(self.find(selector).await?.is_some())
    }

    async fn click(&mut self, selector: &Selector) -> BenchResult<()> {
        let id = self.require(selector).await?;
        self.command(
            Method::POST,
            &format!("/element/{}/click", id),
            Some(json!({})),
            Some(selector),
        )
        .await
        .map(|_| ())
    }

    async fn fill(&mut self, selector: &Selector, text: &str) -> BenchResult<()> {
        let id = self.require(selector).await?;
        self.command(
            Method::POST,
            &format!("/element/{}/clear", id),
            Some(json!({})),
            Some(selector),
        )
        .await?;
        self.command(
            Method::POST,
            &format!("/element/{}/value", id),
            Some(json!({ "text": text })),
            Some(selector),
        )
        .await
        .map(|_| ())
    }

    async fn scroll_by(&mut self, selector: &Selector, pixels: i64) -> BenchResult<()> {
        self.execute_script(SCROLL_SCRIPT, vec![json!(selector.css), json!(pixels)])
            .await
            .map(|_| ())
    }

    async fn execute_script(&mut self, script: &str, args: Vec<Value>) -> BenchResult<Value> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
            None,
        )
        .await
    }

    async fn collect_metrics(&mut self) -> BenchResult<Value> {
        self.execute_script(COLLECT_PAGE_METRICS_SCRIPT, Vec::new()).await
    }

    async fn clear_network_report(&mut self) -> BenchResult<()> {
        self.execute_script(CLEAR_NETWORK_SCRIPT, Vec::new())
            .await
            .map(|_| ())
    }

    async fn close(&mut self) -> BenchResult<()> {
        self.command(Method::DELETE, "", None, None).await.map(|_| ())
    }
}

fn w3c_message(body: &Value) -> String {
    let error = body.pointer("/value/error").and_then(Value::as_str);
    let message = body.pointer("/value/message").and_then(Value::as_str);
    match (error, message) {
        (Some(e), Some(m)) => format!("{}: {}", e, m),
        (Some(e), None) => e.to_string(),
        (None, Some(m)) => m.to_string(),
        (None, None) => body.to_string(),
    }
}

/// Map a W3C error payload (`{"value": {"error", "message"}}`) onto
/// [`BenchError`].
fn map_w3c_error(body: &Value, selector: Option<&Selector>) -> BenchError {
    let code = body
        .pointer("/value/error")
        .and_then(Value::as_str)
        .unwrap_or_default();
    match code {
        "no such element" | "stale element reference" => BenchError::ElementNotFound {
            selector: selector.map(Selector::to_string).unwrap_or_default(),
        },
        "timeout" | "script timeout" => BenchError::timeout(w3c_message(body), 0),
        "javascript error" => BenchError::script(w3c_message(body)),
        "session not created" | "invalid session id" => BenchError::SessionLaunch {
            message: w3c_message(body),
        },
        _ => BenchError::driver(w3c_message(body)),
    }
}
