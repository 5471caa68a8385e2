//! Declarative flow steps and their executor.

use futures::future::{BoxFuture, FutureExt};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::FlowContext;
use crate::driver::{Driver, Selector};
use crate::errors::BenchResult;
use crate::instrumentation::{NOW_SCRIPT, PAINT_WAIT_SCRIPT};

/// Settle time between a tracked click and the paint wait.
const CLICK_SETTLE: Duration = Duration::from_millis(50);

/// Values resolved from [`FlowContext`] at execution time so they never
/// end up in step listings or logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret {
    Password,
    Srp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Navigate(String),
    WaitFor {
        selector: Selector,
        timeout_ms: u64,
    },
    Click(Selector),
    /// Click, then record the time to the next paint as an interaction.
    TrackedClick(Selector),
    Fill {
        selector: Selector,
        text: String,
    },
    FillSecret {
        selector: Selector,
        secret: Secret,
    },
    /// Type one character at a time, pausing between keystrokes.
    TypeChars {
        selector: Selector,
        text: String,
        per_char_ms: u64,
    },
    Scroll {
        selector: Selector,
        pixels: i64,
        times: u32,
        pause_ms: u64,
    },
    Delay(u64),
    /// Run `steps`; if any fails, log it and run `fallback` instead.
    Attempt {
        steps: Vec<Step>,
        fallback: Vec<Step>,
    },
}

impl Step {
    pub fn click(selector: Selector) -> Self {
        Step::Click(selector)
    }

    pub fn tracked(selector: Selector) -> Self {
        Step::TrackedClick(selector)
    }

    pub fn wait(selector: Selector, timeout_ms: u64) -> Self {
        Step::WaitFor {
            selector,
            timeout_ms,
        }
    }

    pub fn fill(selector: Selector, text: impl Into<String>) -> Self {
        Step::Fill {
            selector,
            text: text.into(),
        }
    }

    /// Best-effort steps: failures are logged and ignored.
    pub fn optional(steps: Vec<Step>) -> Self {
        Step::Attempt {
            steps,
            fallback: Vec::new(),
        }
    }
}

/// Execute steps in order, stopping at the first hard failure.
pub fn run_steps<'a>(
    driver: &'a mut dyn Driver,
    steps: &'a [Step],
    ctx: &'a FlowContext,
) -> BoxFuture<'a, BenchResult<()>> {
    async move {
        for step in steps {
            match step {
                Step::Attempt { steps, fallback } => {
                    if let Err(e) = run_steps(&mut *driver, steps, ctx).await {
                        debug!(error = %e, "optional step failed, using fallback");
                        run_steps(&mut *driver, fallback, ctx).await?;
                    }
                }
                other => run_step(&mut *driver, other, ctx).await?,
            }
        }
        Ok(())
    }
    .boxed()
}

async fn run_step(driver: &mut dyn Driver, step: &Step, ctx: &FlowContext) -> BenchResult<()> {
    match step {
        Step::Navigate(route) => driver.navigate(route).await,
        Step::WaitFor {
            selector,
            timeout_ms,
        } => {
            driver
                .wait_for(selector, Duration::from_millis(*timeout_ms))
                .await
        }
        Step::Click(selector) => driver.click(selector).await,
        Step::TrackedClick(selector) => {
            tracked_click(driver, selector, ctx.paint_timeout).await?;
            Ok(())
        }
        Step::Fill { selector, text } => driver.fill(selector, text).await,
        Step::FillSecret { selector, secret } => driver.fill(selector, ctx.secret(*secret)).await,
        Step::TypeChars {
            selector,
            text,
            per_char_ms,
        } => {
            let mut typed = String::new();
            for c in text.chars() {
                typed.push(c);
                driver.fill(selector, &typed).await?;
                driver.delay(Duration::from_millis(*per_char_ms)).await;
            }
            Ok(())
        }
        Step::Scroll {
            selector,
            pixels,
            times,
            pause_ms,
        } => {
            for _ in 0..*times {
                driver.scroll_by(selector, *pixels).await?;
                driver.delay(Duration::from_millis(*pause_ms)).await;
            }
            Ok(())
        }
        Step::Delay(ms) => {
            driver.delay(Duration::from_millis(*ms)).await;
            Ok(())
        }
        Step::Attempt { .. } => run_steps(driver, std::slice::from_ref(step), ctx).await,
    }
}

/// Click and wait for the next paint (bounded by `paint_timeout`).
///
/// Returns the measured duration; `Some(-1.0)` when no paint happened in
/// time, `None` when the page reported nothing.
pub async fn tracked_click(
    driver: &mut dyn Driver,
    selector: &Selector,
    paint_timeout: Duration,
) -> BenchResult<Option<f64>> {
    let start = driver
        .execute_script(NOW_SCRIPT, Vec::new())
        .await?
        .as_f64()
        .unwrap_or(0.0);
    driver.click(selector).await?;
    driver.delay(CLICK_SETTLE).await;

    let waited = driver
        .execute_script(
            PAINT_WAIT_SCRIPT,
            vec![json!(start), json!(paint_timeout.as_millis() as u64)],
        )
        .await?;
    let duration = waited.as_f64();
    if duration.is_some_and(|d| d < 0.0) {
        warn!(
            selector = %selector,
            timeout_ms = paint_timeout.as_millis() as u64,
            "no paint after tracked click"
        );
    }
    Ok(duration)
}
