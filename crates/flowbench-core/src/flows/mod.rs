//! Benchmarked user flows.
//!
//! The set of flows is closed: [`FlowId`] names every supported one and
//! [`FlowRegistry`] maps each to a [`Flow`] implementation. Names that don't
//! parse never reach a browser; the runner reports them as skipped.

pub mod catalog;
pub mod script;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BenchConfig, Pacing};
use crate::driver::{Driver, FixtureKind, FixtureSpec, PRIMARY_NODE, SECONDARY_NODE};
use crate::errors::{BenchError, BenchResult};

pub use script::{run_steps, tracked_click, Secret, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowId {
    TabSwitching,
    AccountSwitching,
    NetworkSwitching,
    NetworkAdding,
    ImportSrp,
    TokenSearch,
    TokenSend,
    TokensListScrolling,
    NftListScrolling,
}

impl FlowId {
    pub const ALL: [FlowId; 9] = [
        FlowId::TabSwitching,
        FlowId::AccountSwitching,
        FlowId::NetworkSwitching,
        FlowId::NetworkAdding,
        FlowId::ImportSrp,
        FlowId::TokenSearch,
        FlowId::TokenSend,
        FlowId::TokensListScrolling,
        FlowId::NftListScrolling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowId::TabSwitching => "tab-switching",
            FlowId::AccountSwitching => "account-switching",
            FlowId::NetworkSwitching => "network-switching",
            FlowId::NetworkAdding => "network-adding",
            FlowId::ImportSrp => "import-srp",
            FlowId::TokenSearch => "token-search",
            FlowId::TokenSend => "token-send",
            FlowId::TokensListScrolling => "tokens-list-scrolling",
            FlowId::NftListScrolling => "nft-list-scrolling",
        }
    }

    /// Onboarding flows start from a fresh install and measure once per load.
    pub fn is_onboarding(&self) -> bool {
        matches!(self, FlowId::ImportSrp)
    }

    pub fn fixture(&self) -> FixtureSpec {
        let (kind, local_nodes) = match self {
            FlowId::ImportSrp => (FixtureKind::Onboarding, vec![PRIMARY_NODE]),
            FlowId::NetworkAdding => (FixtureKind::PowerUser, vec![PRIMARY_NODE, SECONDARY_NODE]),
            _ => (FixtureKind::PowerUser, vec![PRIMARY_NODE]),
        };
        FixtureSpec {
            flow: *self,
            kind,
            local_nodes,
        }
    }

    /// Results key, e.g. `Power User: Tab Switching`.
    pub fn display_name(&self) -> String {
        display_name(self.as_str())
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowId {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlowId::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| BenchError::UnknownFlow {
                name: s.to_string(),
            })
    }
}

/// `token-send` -> `Power User: Token Send`.
pub fn display_name(flow: &str) -> String {
    let words: Vec<String> = flow
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    format!("Power User: {}", words.join(" "))
}

/// Per-run values flows need while driving the page.
#[derive(Clone)]
pub struct FlowContext {
    pub password: String,
    pub srp: String,
    /// Next-paint ceiling for tracked clicks.
    pub paint_timeout: Duration,
    pub pacing: Pacing,
}

impl fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowContext")
            .field("paint_timeout", &self.paint_timeout)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}

impl FlowContext {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            password: config.driver.password.clone(),
            srp: config.driver.srp.clone(),
            paint_timeout: Duration::from_millis(config.run.paint_timeout_ms),
            pacing: config.run.pacing.clone(),
        }
    }

    pub fn secret(&self, secret: Secret) -> &str {
        match secret {
            Secret::Password => &self.password,
            Secret::Srp => &self.srp,
        }
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::from_config(&BenchConfig::default())
    }
}

#[async_trait]
pub trait Flow: Send + Sync {
    fn id(&self) -> FlowId;

    /// Bring a fresh session to the flow's starting screen. Runs once per
    /// browser load; not timed.
    async fn prepare(&self, driver: &mut dyn Driver, ctx: &FlowContext) -> BenchResult<()>;

    /// The timed interaction.
    async fn run(&self, driver: &mut dyn Driver, ctx: &FlowContext) -> BenchResult<()>;
}

/// A flow described as a list of [`Step`]s.
#[derive(Debug, Clone)]
pub struct ScriptedFlow {
    pub id: FlowId,
    pub prelude: Vec<Step>,
    pub body: Vec<Step>,
}

#[async_trait]
impl Flow for ScriptedFlow {
    fn id(&self) -> FlowId {
        self.id
    }

    async fn prepare(&self, driver: &mut dyn Driver, ctx: &FlowContext) -> BenchResult<()> {
        run_steps(driver, &self.prelude, ctx).await
    }

    async fn run(&self, driver: &mut dyn Driver, ctx: &FlowContext) -> BenchResult<()> {
        run_steps(driver, &self.body, ctx).await
    }
}

#[derive(Clone, Default)]
pub struct FlowRegistry {
    flows: BTreeMap<FlowId, Arc<dyn Flow>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All nine flows with their built-in scripts.
    pub fn standard(pacing: &Pacing) -> Self {
        let mut registry = Self::new();
        for id in FlowId::ALL {
            registry.register(Arc::new(catalog::scripted(id, pacing)));
        }
        registry
    }

    /// Add or replace the implementation for `flow.id()`.
    pub fn register(&mut self, flow: Arc<dyn Flow>) {
        self.flows.insert(flow.id(), flow);
    }

    /// `None` for unknown names and for known flows with no implementation.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Flow>> {
        let id = name.parse::<FlowId>().ok()?;
        self.flows.get(&id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = FlowId> + '_ {
        self.flows.keys().copied()
    }
}
