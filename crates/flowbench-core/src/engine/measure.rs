//! One browser load: launch, prepare, measure N iterations, close.

use chrono::Utc;
use flowbench_stats::RawSample;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::driver::{Driver, SessionLauncher};
use crate::errors::{BenchError, BenchResult};
use crate::flows::catalog::{balance, network_menu, network_menu_close, HOME_ROUTE};
use crate::flows::{Flow, FlowContext, FlowId};
use crate::instrumentation::InstrumentationContext;

const SETTLE_AFTER_RESET: Duration = Duration::from_millis(100);
const SETTLE_AFTER_CLEANUP: Duration = Duration::from_millis(300);
const ONBOARDING_SETTLE: Duration = Duration::from_millis(500);
const HOME_BALANCE_TIMEOUT: Duration = Duration::from_millis(10_000);
const MENU_CLEANUP_ATTEMPTS: u32 = 3;

/// How many iterations a browser load runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationPlan {
    pub iterations: u32,
    pub warmups: u32,
}

impl IterationPlan {
    /// Onboarding flows create a wallet, which can only happen once per
    /// session: they always get exactly one measured iteration and no warmups.
    pub fn for_flow(flow: FlowId, iterations: u32, warmups: u32) -> Self {
        if flow.is_onboarding() {
            if iterations > 1 || warmups > 0 {
                info!(
                    flow = flow.as_str(),
                    requested = iterations,
                    warmups,
                    "onboarding flows run once per browser load; raise browser loads for more samples"
                );
            }
            return Self {
                iterations: 1,
                warmups: 0,
            };
        }
        Self {
            iterations,
            warmups,
        }
    }
}

/// Launch a fresh session for `flow`, measure it, and always close it.
///
/// `run_offset` numbers this load's samples after those of earlier loads.
pub async fn measure_browser_load(
    launcher: &dyn SessionLauncher,
    flow: &dyn Flow,
    ctx: &FlowContext,
    plan: IterationPlan,
    load_index: u32,
    run_offset: u32,
) -> BenchResult<Vec<RawSample>> {
    let mut driver = launcher.launch(&flow.id().fixture()).await?;
    debug!(flow = flow.id().as_str(), browser_load = load_index, "session launched");

    let result = run_load(driver.as_mut(), flow, ctx, plan, run_offset).await;

    if let Err(e) = driver.close().await {
        warn!(
            flow = flow.id().as_str(),
            browser_load = load_index,
            error = %e,
            "failed to close browser session"
        );
    }
    result
}

async fn run_load(
    driver: &mut dyn Driver,
    flow: &dyn Flow,
    ctx: &FlowContext,
    plan: IterationPlan,
    run_offset: u32,
) -> BenchResult<Vec<RawSample>> {
    let name = flow.id().as_str();
    flow.prepare(driver, ctx).await?;

    let mut instrumentation = InstrumentationContext::new();
    instrumentation.install(driver).await?;

    for warmup in 1..=plan.warmups {
        debug!(flow = name, warmup, of = plan.warmups, "warmup iteration");
        if let Err(e) = measure_iteration(driver, flow, ctx, &mut instrumentation, 0).await {
            warn!(flow = name, warmup, error = %e, "warmup iteration failed");
        }
    }

    let mut samples = Vec::with_capacity(plan.iterations as usize);
    for i in 0..plan.iterations {
        info!(flow = name, iteration = i + 1, of = plan.iterations, "iteration");
        match measure_iteration(driver, flow, ctx, &mut instrumentation, run_offset + i).await {
            Ok(sample) => samples.push(sample),
            Err(e) => warn!(flow = name, iteration = i + 1, error = %e, "iteration failed"),
        }
        driver
            .delay(Duration::from_millis(ctx.pacing.between_iterations_ms))
            .await;
    }

    if samples.is_empty() {
        return Err(BenchError::NoResults {
            message: format!("All iterations failed for flow {name}. No results to return."),
        });
    }
    Ok(samples)
}

/// One timed run of the flow plus everything needed to isolate it from the
/// previous iteration.
async fn measure_iteration(
    driver: &mut dyn Driver,
    flow: &dyn Flow,
    ctx: &FlowContext,
    instrumentation: &mut InstrumentationContext,
    run: u32,
) -> BenchResult<RawSample> {
    // Listeners are re-attached if a navigation dropped them; reset keeps
    // object identity so attached listeners stay live.
    instrumentation.install(driver).await?;
    instrumentation.reset(driver).await?;
    driver.delay(SETTLE_AFTER_RESET).await;

    close_stray_network_menu(driver).await;
    driver.delay(SETTLE_AFTER_CLEANUP).await;

    driver.clear_network_report().await?;
    driver
        .delay(Duration::from_millis(ctx.pacing.before_flow_ms))
        .await;

    let started = Instant::now();
    flow.run(driver, ctx).await?;
    let interaction_latency = started.elapsed().as_secs_f64() * 1000.0;

    driver
        .delay(Duration::from_millis(ctx.pacing.after_flow_ms))
        .await;

    // Collect before navigating: navigation wipes page state.
    let page = driver.collect_metrics().await?;
    let snapshot = instrumentation.read_and_clear(driver).await?;

    return_home(driver, flow.id()).await;

    let mut metrics = snapshot.map(|s| s.to_metrics()).unwrap_or_default();
    metrics.insert("interactionLatency".into(), Value::from(interaction_latency));
    merge_page_metrics(&mut metrics, page);

    Ok(RawSample::new(
        flow.id().as_str(),
        run,
        Value::Object(metrics),
        Utc::now().timestamp_millis(),
    ))
}

/// Driver-reported values take precedence over derived ones.
fn merge_page_metrics(metrics: &mut Map<String, Value>, page: Value) {
    match page {
        Value::Object(page) => metrics.extend(page),
        Value::Null => {}
        other => warn!(value = %other, "driver returned non-object metrics; ignored"),
    }
}

async fn close_stray_network_menu(driver: &mut dyn Driver) {
    let menu = network_menu();
    for attempt in 1..=MENU_CLEANUP_ATTEMPTS {
        match driver.is_present(&menu).await {
            Ok(false) => return,
            Ok(true) => {}
            Err(e) => {
                debug!(error = %e, "could not check for open network menu");
                return;
            }
        }
        debug!(attempt, "closing network menu left open");
        if let Err(e) = driver.click(&network_menu_close()).await {
            if attempt == MENU_CLEANUP_ATTEMPTS {
                warn!(error = %e, attempts = attempt, "could not close network menu");
            }
        }
        driver.delay(SETTLE_AFTER_CLEANUP).await;
    }
}

async fn return_home(driver: &mut dyn Driver, flow: FlowId) {
    if flow.is_onboarding() {
        // Onboarding already ends on the home screen.
        driver.delay(ONBOARDING_SETTLE).await;
        return;
    }
    if let Err(e) = driver.navigate(HOME_ROUTE).await {
        warn!(error = %e, "could not navigate back to home after flow");
        return;
    }
    if let Err(e) = driver.wait_for(&balance(), HOME_BALANCE_TIMEOUT).await {
        warn!(error = %e, "home screen did not settle after flow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{FixtureSpec, Selector};
    use crate::flows::ScriptedFlow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Scripted page: each `collect_metrics` pops the next value.
    struct FakePage {
        pages: Vec<BenchResult<Value>>,
        menu_open_checks: u32,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Driver for FakePage {
        async fn navigate(&mut self, route: &str) -> BenchResult<()> {
            self.log.lock().unwrap().push(format!("navigate {route}"));
            Ok(())
        }
        async fn wait_for(&mut self, _s: &Selector, _t: Duration) -> BenchResult<()> {
            Ok(())
        }
        async fn is_present(&mut self, _s: &Selector) -> BenchResult<bool> {
            if self.menu_open_checks > 0 {
                self.menu_open_checks -= 1;
                return Ok(true);
            }
            Ok(false)
        }
        async fn click(&mut self, selector: &Selector) -> BenchResult<()> {
            self.log.lock().unwrap().push(format!("click {selector}"));
            Ok(())
        }
        async fn fill(&mut self, _s: &Selector, _t: &str) -> BenchResult<()> {
            Ok(())
        }
        async fn scroll_by(&mut self, _s: &Selector, _p: i64) -> BenchResult<()> {
            Ok(())
        }
        async fn execute_script(&mut self, script: &str, _a: Vec<Value>) -> BenchResult<Value> {
            if script == crate::instrumentation::SNAPSHOT_SCRIPT {
                return Ok(json!({
                    "interactions": [40.0, 80.0],
                    "longTasks": [120.0],
                    "renders": [{ "id": "Home", "actualDuration": 4.0 }],
                    "fcp": 300.0
                }));
            }
            Ok(Value::Null)
        }
        async fn collect_metrics(&mut self) -> BenchResult<Value> {
            if self.pages.is_empty() {
                return Err(BenchError::driver("no page"));
            }
            self.pages.remove(0)
        }
        async fn delay(&mut self, _d: Duration) {}
        async fn close(&mut self) -> BenchResult<()> {
            self.log.lock().unwrap().push("close".into());
            Ok(())
        }
    }

    struct FakeLauncher {
        pages: Mutex<Vec<Vec<BenchResult<Value>>>>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SessionLauncher for FakeLauncher {
        async fn launch(&self, _f: &FixtureSpec) -> BenchResult<Box<dyn Driver>> {
            let pages = self.pages.lock().unwrap().remove(0);
            Ok(Box::new(FakePage {
                pages,
                menu_open_checks: 1,
                log: self.log.clone(),
            }))
        }
    }

    fn launcher(pages: Vec<BenchResult<Value>>) -> FakeLauncher {
        FakeLauncher {
            pages: Mutex::new(vec![pages]),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn flow(id: FlowId) -> ScriptedFlow {
        ScriptedFlow {
            id,
            prelude: Vec::new(),
            body: Vec::new(),
        }
    }

    #[test]
    fn onboarding_plan_is_single_iteration() {
        let plan = IterationPlan::for_flow(FlowId::ImportSrp, 10, 2);
        assert_eq!(plan, IterationPlan { iterations: 1, warmups: 0 });
        let plan = IterationPlan::for_flow(FlowId::TokenSend, 10, 2);
        assert_eq!(plan, IterationPlan { iterations: 10, warmups: 2 });
    }

    #[tokio::test]
    async fn samples_merge_page_and_instrumentation() {
        let fake = launcher(vec![
            Ok(json!({ "numNetworkReqs": 7, "paint": { "first-contentful-paint": 250.0 } })),
            Ok(json!({ "numNetworkReqs": 3, "interactionLatency": 999.0 })),
        ]);
        let plan = IterationPlan { iterations: 2, warmups: 0 };
        let samples = measure_browser_load(
            &fake,
            &flow(FlowId::TabSwitching),
            &FlowContext::default(),
            plan,
            2,
            4,
        )
        .await
        .unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].run, 4);
        assert_eq!(samples[1].run, 5);
        assert_eq!(samples[0].flow, "tab-switching");
        assert_eq!(samples[0].metrics["numNetworkReqs"], 7);
        assert_eq!(samples[0].metrics["inp"], 80.0);
        assert_eq!(samples[0].metrics["tbt"], 120.0);
        assert!(samples[0].metrics["interactionLatency"].as_f64().unwrap() < 999.0);
        // recorded values win over locally measured ones
        assert_eq!(samples[1].metrics["interactionLatency"], 999.0);

        let log = fake.log.lock().unwrap();
        assert!(log.iter().any(|l| l.contains("modal-header-close-button")));
        assert!(log.iter().any(|l| l == "navigate home.html"));
        assert_eq!(log.last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn partial_failures_keep_successful_iterations() {
        let fake = launcher(vec![Err(BenchError::driver("boom")), Ok(json!({ "uiStartup": 1.0 }))]);
        let plan = IterationPlan { iterations: 2, warmups: 0 };
        let samples = measure_browser_load(
            &fake,
            &flow(FlowId::TokenSearch),
            &FlowContext::default(),
            plan,
            1,
            0,
        )
        .await
        .unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].run, 1);
    }

    #[tokio::test]
    async fn all_iterations_failing_is_an_error_and_still_closes() {
        let fake = launcher(vec![Err(BenchError::driver("a")), Err(BenchError::driver("b"))]);
        let plan = IterationPlan { iterations: 2, warmups: 0 };
        let err = measure_browser_load(
            &fake,
            &flow(FlowId::TokenSend),
            &FlowContext::default(),
            plan,
            1,
            0,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "All iterations failed for flow token-send. No results to return."
        );
        assert!(err.is_retryable());
        assert_eq!(
            fake.log.lock().unwrap().last().map(String::as_str),
            Some("close")
        );
    }

    #[tokio::test]
    async fn onboarding_skips_navigation_home() {
        let fake = launcher(vec![Ok(json!({}))]);
        let plan = IterationPlan::for_flow(FlowId::ImportSrp, 5, 0);
        let samples = measure_browser_load(
            &fake,
            &flow(FlowId::ImportSrp),
            &FlowContext::default(),
            plan,
            1,
            0,
        )
        .await
        .unwrap();
        assert_eq!(samples.len(), 1);
        assert!(!fake
            .log
            .lock()
            .unwrap()
            .iter()
            .any(|l| l.starts_with("navigate")));
    }
}
