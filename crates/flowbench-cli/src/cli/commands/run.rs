use anyhow::Context;
use flowbench_core::config::{BenchConfig, DriverConfig, DriverKind};
use flowbench_core::driver::{ReplayLauncher, SessionLauncher, WebDriverLauncher};
use flowbench_core::report::json::{prepare_output_path, write_partial_results};
use flowbench_core::report::progress::FlowResultsSink;
use flowbench_core::report::ResultsByFlow;
use flowbench_core::telemetry::{JsonlSink, LogSink};
use flowbench_core::BenchmarkRunner;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::super::args::RunArgs;

pub async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let mut cfg = BenchConfig::load(args.config.as_deref())?;
    apply_overrides(&mut cfg, &args);
    cfg.validate()
        .map_err(|e| anyhow::anyhow!("invalid config: {}", e))?;

    if let Some(out) = &args.out {
        prepare_output_path(out)?;
    }

    let launcher = build_launcher(&cfg.driver)?;
    let mut runner = BenchmarkRunner::from_config(&cfg, launcher)?;
    if cfg.telemetry.log {
        runner = runner.with_sink(Arc::new(LogSink));
    }
    if let Some(path) = &cfg.telemetry.jsonl {
        runner = runner.with_sink(Arc::new(JsonlSink::new(path)));
    }
    info!(run_id = %runner.run_id, flows = ?cfg.run.flows, "starting benchmark");

    let progress = args.out.clone().map(partial_writer);
    let artifacts = runner.run(progress).await;

    super::emit_output(&artifacts.into_output(), args.out.as_deref(), args.quiet)
}

/// Command-line flags win over the config file.
fn apply_overrides(cfg: &mut BenchConfig, args: &RunArgs) {
    if !args.flows.is_empty() {
        cfg.run.flows = args.flows.clone();
    }
    if let Some(n) = args.browser_loads {
        cfg.run.browser_loads = n;
    }
    if let Some(n) = args.iterations {
        cfg.run.iterations = n;
    }
    if let Some(n) = args.warmups {
        cfg.run.warmups = n;
    }
    if let Some(n) = args.retries {
        cfg.run.retries = n;
    }
    if let Some(url) = &args.webdriver_url {
        cfg.driver.webdriver_url = url.clone();
    }
    if let Some(url) = &args.extension_url {
        cfg.driver.extension_url = Some(url.clone());
    }
    if let Some(password) = &args.password {
        cfg.driver.password = password.clone();
    }
    if let Some(path) = &args.replay {
        cfg.driver.kind = DriverKind::Replay;
        cfg.driver.replay_file = Some(path.clone());
    }
    if let Some(path) = &args.telemetry_jsonl {
        cfg.telemetry.jsonl = Some(path.clone());
    }
}

fn build_launcher(driver: &DriverConfig) -> anyhow::Result<Arc<dyn SessionLauncher>> {
    match driver.kind {
        DriverKind::Replay => {
            let path = driver
                .replay_file
                .as_deref()
                .context("driver.replay_file is required for replay")?;
            info!(path = %path.display(), "replaying recorded metrics");
            Ok(Arc::new(ReplayLauncher::from_file(path)?))
        }
        DriverKind::Webdriver => Ok(Arc::new(WebDriverLauncher::new(driver)?)),
    }
}

/// Rewrite the results file after every finished flow so an interrupted run
/// still leaves what it measured.
fn partial_writer(out: PathBuf) -> FlowResultsSink {
    let so_far = Mutex::new(ResultsByFlow::new());
    Arc::new(move |name, results| {
        let mut so_far = so_far
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        so_far.insert(name.to_string(), results.clone());
        match write_partial_results(&so_far, &out) {
            Ok(()) => info!(flow = name, path = %out.display(), "partial results written"),
            Err(e) => warn!(flow = name, error = %e, "failed to write partial results"),
        }
    })
}
