//! Browser automation seam.
//!
//! Flows only talk to a [`Driver`]; a [`SessionLauncher`] hands out a fresh
//! one per browser load. Two implementations ship: [`webdriver`] drives a
//! real browser over the W3C WebDriver protocol, [`replay`] feeds recorded
//! metric bags back for offline runs.

pub mod replay;
pub mod webdriver;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::errors::BenchResult;
use crate::flows::FlowId;

pub use replay::{RecordedIteration, Recordings, ReplayLauncher};
pub use webdriver::WebDriverLauncher;

/// CSS selector, optionally narrowed to elements whose visible text matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub css: String,
    pub text: Option<String>,
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
        }
    }

    pub fn with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: Some(text.into()),
        }
    }

    pub fn test_id(id: &str) -> Self {
        Self::css(format!("[data-testid=\"{id}\"]"))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{} (text \"{}\")", self.css, text),
            None => f.write_str(&self.css),
        }
    }
}

#[async_trait]
pub trait Driver: Send {
    /// Open an extension page, e.g. `home.html`.
    async fn navigate(&mut self, route: &str) -> BenchResult<()>;

    /// Poll until the selector matches or `timeout` passes.
    async fn wait_for(&mut self, selector: &Selector, timeout: Duration) -> BenchResult<()>;

    async fn is_present(&mut self, selector: &Selector) -> BenchResult<bool>;

    async fn click(&mut self, selector: &Selector) -> BenchResult<()>;

    async fn fill(&mut self, selector: &Selector, text: &str) -> BenchResult<()>;

    /// Scroll the matched element (or the window) down by `pixels`.
    async fn scroll_by(&mut self, selector: &Selector, pixels: i64) -> BenchResult<()>;

    /// Run a script in the page. Arguments are exposed as `arguments[i]`;
    /// a returned promise is awaited.
    async fn execute_script(&mut self, script: &str, args: Vec<Value>) -> BenchResult<Value>;

    /// Page-load marks and request counts for the current page.
    async fn collect_metrics(&mut self) -> BenchResult<Value>;

    /// Forget requests seen so far so `numNetworkReqs` covers one iteration.
    async fn clear_network_report(&mut self) -> BenchResult<()> {
        Ok(())
    }

    async fn delay(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn close(&mut self) -> BenchResult<()>;
}

/// Which wallet state a browser load starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    /// Fresh install sitting on the onboarding welcome screen.
    Onboarding,
    /// Locked wallet with accounts, tokens and networks already set up.
    PowerUser,
}

/// Local dev-chain node a fixture expects to be reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNode {
    pub port: u16,
    pub chain_id: u64,
}

pub const PRIMARY_NODE: LocalNode = LocalNode {
    port: 8545,
    chain_id: 1337,
};

pub const SECONDARY_NODE: LocalNode = LocalNode {
    port: 8546,
    chain_id: 1338,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureSpec {
    pub flow: FlowId,
    pub kind: FixtureKind,
    pub local_nodes: Vec<LocalNode>,
}

impl FixtureSpec {
    pub fn start_route(&self) -> &'static str {
        match self.kind {
            FixtureKind::Onboarding => "home.html#onboarding/welcome",
            FixtureKind::PowerUser => "home.html",
        }
    }
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Start a fresh browser session with the extension loaded on the
    /// fixture's start page.
    async fn launch(&self, fixture: &FixtureSpec) -> BenchResult<Box<dyn Driver>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_display() {
        assert_eq!(
            Selector::test_id("unlock-submit").to_string(),
            "[data-testid=\"unlock-submit\"]"
        );
        assert_eq!(
            Selector::with_text("button", "Add a custom network").to_string(),
            "button (text \"Add a custom network\")"
        );
    }

    #[test]
    fn start_route_depends_on_fixture() {
        let onboarding = FlowId::ImportSrp.fixture();
        assert_eq!(onboarding.start_route(), "home.html#onboarding/welcome");
        assert_eq!(FlowId::TabSwitching.fixture().start_route(), "home.html");
    }
}
