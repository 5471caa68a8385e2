//! In-page instrumentation: interaction timings, long tasks, React renders.
//!
//! Listeners are attached once per browser session. Between iterations only
//! the collected arrays are emptied; the objects the listeners write into
//! stay the same, otherwise events fired after a reset would land in a
//! detached object and vanish.

use flowbench_stats::percentile;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::driver::Driver;
use crate::errors::BenchResult;

/// Attach interaction, scroll and long-task listeners (no-op when present).
pub const INSTALL_SCRIPT: &str = r#"
if (!Array.isArray(window.__REACT_RENDER_METRICS__)) {
  window.__REACT_RENDER_METRICS__ = [];
}
if (!window.__inpMetrics) {
  window.__inpMetrics = { interactions: [] };
}
if (!window.__tbtMetrics) {
  window.__tbtMetrics = { longTasks: [], totalBlockingTime: 0 };
}
if (!window.__inpListenersAttached) {
  ['click', 'keydown', 'tap'].forEach((type) => {
    document.addEventListener(type, () => {
      const start = performance.now();
      requestAnimationFrame(() => requestAnimationFrame(() => {
        const end = performance.now();
        window.__inpMetrics.interactions.push({ start, end, duration: end - start, type });
      }));
    }, { passive: true });
  });
  let scrollStart = null;
  let scrollTimer = null;
  window.addEventListener('scroll', () => {
    if (scrollStart === null) scrollStart = performance.now();
    clearTimeout(scrollTimer);
    scrollTimer = setTimeout(() => {
      const end = performance.now();
      window.__inpMetrics.interactions.push({ start: scrollStart, end, duration: end - scrollStart, type: 'scroll' });
      scrollStart = null;
    }, 150);
  }, { passive: true });
  window.__inpListenersAttached = true;
}
if (!window.__tbtObserverAttached) {
  try {
    if (window.PerformanceObserver && PerformanceObserver.supportedEntryTypes.includes('longtask')) {
      new PerformanceObserver((list) => {
        for (const entry of list.getEntries()) {
          const blockingTime = Math.max(0, entry.duration - 50);
          window.__tbtMetrics.longTasks.push({ duration: entry.duration, blockingTime, startTime: entry.startTime });
          window.__tbtMetrics.totalBlockingTime += blockingTime;
        }
      }).observe({ entryTypes: ['longtask'], buffered: false });
    }
  } catch (e) {
    console.warn('[flowbench] long task observer unavailable', e);
  }
  window.__tbtObserverAttached = true;
}
return {
  inpListenersAttached: !!window.__inpListenersAttached,
  tbtObserverAttached: !!window.__tbtObserverAttached,
};
"#;

/// Empty the collected arrays in place and report whether the objects the
/// listeners hold are still the live ones.
pub const RESET_SCRIPT: &str = r#"
const inp = window.__inpMetrics;
const tbt = window.__tbtMetrics;
if (Array.isArray(window.__REACT_RENDER_METRICS__)) {
  window.__REACT_RENDER_METRICS__.length = 0;
} else {
  window.__REACT_RENDER_METRICS__ = [];
}
if (inp) { inp.interactions.length = 0; } else { window.__inpMetrics = { interactions: [] }; }
if (tbt) { tbt.longTasks.length = 0; tbt.totalBlockingTime = 0; } else { window.__tbtMetrics = { longTasks: [], totalBlockingTime: 0 }; }
window.__lazyLoadMetrics = undefined;
return {
  identityPreserved: (!inp || window.__inpMetrics === inp) && (!tbt || window.__tbtMetrics === tbt),
};
"#;

/// Raw collected arrays; reduction to metrics happens on the Rust side.
pub const SNAPSHOT_SCRIPT: &str = r#"
const renders = (Array.isArray(window.__REACT_RENDER_METRICS__) ? window.__REACT_RENDER_METRICS__ : [])
  .filter((e) => e && typeof e.actualDuration === 'number')
  .map((e) => ({ id: e.id || null, actualDuration: e.actualDuration }));
const interactions = ((window.__inpMetrics || {}).interactions || [])
  .map((i) => (typeof i.duration === 'number' && isFinite(i.duration) ? i.duration : -1));
const longTasks = ((window.__tbtMetrics || {}).longTasks || []).map((t) => t.blockingTime);
const fcp = performance.getEntriesByType('paint').find((e) => e.name === 'first-contentful-paint');
return {
  interactions,
  longTasks,
  renders,
  fcp: fcp ? fcp.startTime : null,
  lazyLoad: window.__lazyLoadMetrics || null,
};
"#;

pub const NOW_SCRIPT: &str = "return performance.now();";

/// Resolve after the next paint (double rAF) or after `arguments[1]` ms,
/// whichever comes first. A timeout is recorded as a `-1` duration.
pub const PAINT_WAIT_SCRIPT: &str = r#"
const start = arguments[0];
const timeoutMs = arguments[1];
return new Promise((resolve) => {
  let settled = false;
  const record = (duration) => {
    if (settled) return;
    settled = true;
    if (window.__inpMetrics && window.__inpMetrics.interactions) {
      window.__inpMetrics.interactions.push({ start, end: performance.now(), duration, type: 'click' });
    }
    resolve(duration);
  };
  setTimeout(() => record(-1), timeoutMs);
  requestAnimationFrame(() => requestAnimationFrame(() => record(performance.now() - start)));
});
"#;

/// Scroll the nearest scrollable ancestor of `arguments[0]` by
/// `arguments[1]` pixels and update the lazy-load counters.
pub const SCROLL_SCRIPT: &str = r#"
let el = document.querySelector(arguments[0]);
while (el && el !== document.body) {
  const s = getComputedStyle(el);
  if (/(auto|scroll)/.test(s.overflowY + ' ' + s.overflow)) break;
  el = el.parentElement;
}
if (!el || el === document.body) el = document.scrollingElement || document.documentElement;
const m = window.__lazyLoadMetrics || (window.__lazyLoadMetrics = {
  startedAt: performance.now(),
  scrollToLoadLatencies: [],
  assetsLoadedPerScroll: [],
  scrollEventCount: 0,
  totalScrollDistance: 0,
  cumulativeLoadTime: 0,
  loadedSoFar: Array.from(document.images).filter((i) => i.complete && i.naturalWidth > 0).length,
});
const before = el.scrollTop;
const scrolledAt = performance.now();
el.scrollBy(0, arguments[1]);
m.scrollEventCount += 1;
m.totalScrollDistance += Math.abs(el.scrollTop - before);
return new Promise((resolve) => {
  requestAnimationFrame(() => requestAnimationFrame(() => {
    const loaded = Array.from(document.images).filter((i) => i.complete && i.naturalWidth > 0).length;
    const fresh = Math.max(0, loaded - m.loadedSoFar);
    const latency = performance.now() - scrolledAt;
    m.assetsLoadedPerScroll.push(fresh);
    if (fresh > 0) {
      m.scrollToLoadLatencies.push(latency);
      m.cumulativeLoadTime += latency;
      if (m.timeToFirstVisibleAsset == null) m.timeToFirstVisibleAsset = performance.now() - m.startedAt;
    }
    const total = document.images.length;
    if (m.timeTo75PercentLoaded == null && total > 0 && loaded / total >= 0.75) {
      m.timeTo75PercentLoaded = performance.now() - m.startedAt;
    }
    m.loadedSoFar = loaded;
    resolve(Math.abs(el.scrollTop - before));
  }));
});
"#;

/// Navigation timing, paint entries and custom trace marks.
pub const COLLECT_PAGE_METRICS_SCRIPT: &str = r#"
const results = { paint: {}, navigation: [] };
performance.getEntriesByType('paint').forEach((e) => { results.paint[e.name] = e.startTime; });
performance.getEntriesByType('navigation').forEach((e) => {
  results.navigation.push({
    domContentLoaded: e.domContentLoadedEventEnd,
    load: e.loadEventEnd,
    domInteractive: e.domInteractive,
    redirectCount: e.redirectCount,
    type: e.type,
  });
});
performance.getEntriesByType('measure').forEach((e) => { results[e.name] = e.duration; });
const traces = window.stateHooks && window.stateHooks.getCustomTraces ? window.stateHooks.getCustomTraces() : {};
results.numNetworkReqs = performance.getEntriesByType('resource').length;
return Object.assign(results, traces);
"#;

pub const CLEAR_NETWORK_SCRIPT: &str = "performance.clearResourceTimings(); return null;";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub actual_duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LazyLoadSnapshot {
    pub scroll_to_load_latencies: Vec<f64>,
    pub assets_loaded_per_scroll: Vec<f64>,
    pub time_to_first_visible_asset: Option<f64>,
    #[serde(rename = "timeTo75PercentLoaded")]
    pub time_to_75_percent_loaded: Option<f64>,
    pub scroll_event_count: f64,
    pub total_scroll_distance: f64,
    pub cumulative_load_time: f64,
}

/// Raw arrays read back from the page for one iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstrumentationSnapshot {
    /// Interaction-to-paint durations; `-1` marks a paint wait that timed out.
    pub interactions: Vec<f64>,
    /// Blocking time (duration beyond 50 ms) of each long task.
    pub long_tasks: Vec<f64>,
    pub renders: Vec<RenderEvent>,
    pub fcp: Option<f64>,
    pub lazy_load: Option<LazyLoadSnapshot>,
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl InstrumentationSnapshot {
    /// INP: nearest-rank p75 over positive finite durations, 0 when none.
    pub fn inp(&self) -> f64 {
        let valid: Vec<f64> = self
            .interactions
            .iter()
            .copied()
            .filter(|d| *d > 0.0 && d.is_finite())
            .collect();
        percentile(&valid, 75.0).unwrap_or(0.0)
    }

    pub fn component_render_counts(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for render in &self.renders {
            if let Some(id) = render.id.as_deref().filter(|id| !id.is_empty()) {
                *counts.entry(id.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Reduce to the metric bag merged into each sample.
    pub fn to_metrics(&self) -> Map<String, Value> {
        let render_time: f64 = self.renders.iter().map(|r| r.actual_duration).sum();
        let average_render_time = if self.renders.is_empty() {
            0.0
        } else {
            render_time / self.renders.len() as f64
        };

        let mut metrics = Map::new();
        metrics.insert("inp".into(), json!(self.inp()));
        metrics.insert("inpCount".into(), json!(self.interactions.len()));
        metrics.insert("renderCount".into(), json!(self.renders.len()));
        metrics.insert("renderTime".into(), json!(render_time));
        metrics.insert("averageRenderTime".into(), json!(average_render_time));
        metrics.insert(
            "componentRenderCounts".into(),
            json!(self.component_render_counts()),
        );
        metrics.insert("tbt".into(), json!(self.long_tasks.iter().sum::<f64>()));
        if let Some(fcp) = self.fcp {
            metrics.insert("fcp".into(), json!(fcp));
        }

        if let Some(lazy) = &self.lazy_load {
            metrics.insert(
                "scrollToLoadLatency".into(),
                json!(average(&lazy.scroll_to_load_latencies)),
            );
            if let Some(v) = lazy.time_to_first_visible_asset.filter(|v| *v > 0.0) {
                metrics.insert("timeToFirstVisibleAsset".into(), json!(v));
            }
            if let Some(v) = lazy.time_to_75_percent_loaded.filter(|v| *v > 0.0) {
                metrics.insert("timeTo75PercentLoaded".into(), json!(v));
            }
            metrics.insert("scrollEventCount".into(), json!(lazy.scroll_event_count));
            metrics.insert("totalScrollDistance".into(), json!(lazy.total_scroll_distance));
            metrics.insert(
                "assetsLoadedPerScroll".into(),
                json!(average(&lazy.assets_loaded_per_scroll)),
            );
            metrics.insert("cumulativeLoadTime".into(), json!(lazy.cumulative_load_time));
        }
        metrics
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstallReport {
    #[serde(default)]
    inp_listeners_attached: bool,
    #[serde(default)]
    tbt_observer_attached: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetReport {
    #[serde(default = "yes")]
    identity_preserved: bool,
}

fn yes() -> bool {
    true
}

/// Instrumentation handle for one browser session.
#[derive(Debug, Default)]
pub struct InstrumentationContext;

impl InstrumentationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach listeners. Safe to call before every iteration.
    pub async fn install(&mut self, driver: &mut dyn Driver) -> BenchResult<()> {
        let result = driver.execute_script(INSTALL_SCRIPT, Vec::new()).await?;
        if let Ok(report) = serde_json::from_value::<InstallReport>(result) {
            if !report.inp_listeners_attached || !report.tbt_observer_attached {
                warn!(
                    inp = report.inp_listeners_attached,
                    tbt = report.tbt_observer_attached,
                    "instrumentation only partially attached"
                );
            }
        }
        Ok(())
    }

    pub async fn reset(&mut self, driver: &mut dyn Driver) -> BenchResult<()> {
        let result = driver.execute_script(RESET_SCRIPT, Vec::new()).await?;
        if let Ok(report) = serde_json::from_value::<ResetReport>(result) {
            if !report.identity_preserved {
                warn!("instrumentation objects were replaced during reset; listeners may be detached");
            }
        }
        Ok(())
    }

    /// Read the arrays collected since the last reset, then reset.
    ///
    /// `None` when the page reported nothing (no instrumentation present).
    pub async fn read_and_clear(
        &mut self,
        driver: &mut dyn Driver,
    ) -> BenchResult<Option<InstrumentationSnapshot>> {
        let raw = driver.execute_script(SNAPSHOT_SCRIPT, Vec::new()).await?;
        let snapshot = if raw.is_null() {
            None
        } else {
            Some(serde_json::from_value::<InstrumentationSnapshot>(raw)?)
        };
        self.reset(driver).await?;
        if let Some(s) = &snapshot {
            debug!(
                interactions = s.interactions.len(),
                renders = s.renders.len(),
                long_tasks = s.long_tasks.len(),
                "instrumentation snapshot"
            );
        }
        Ok(snapshot)
    }
}
