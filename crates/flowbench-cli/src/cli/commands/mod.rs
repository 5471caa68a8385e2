use flowbench_core::report::console::print_summary;
use flowbench_core::report::json::{to_json_string, write_json};
use flowbench_core::report::BenchmarkOutput;
use std::path::Path;

use crate::exit_codes;

pub mod analyze;
pub mod dispatch;
pub mod flows;
pub mod run;

pub use dispatch::dispatch;

/// Print the console summary (stderr), persist or print the JSON document,
/// and map the outcome to an exit code.
pub(crate) fn emit_output(
    output: &BenchmarkOutput,
    out: Option<&Path>,
    quiet: bool,
) -> anyhow::Result<i32> {
    if !quiet {
        print_summary(&output.report, &output.results);
    }
    match out {
        Some(path) => {
            write_json(output, path)?;
            tracing::info!(path = %path.display(), "results written");
        }
        None => println!("{}", to_json_string(output)?),
    }
    Ok(if output.report.succeeded() {
        exit_codes::SUCCESS
    } else {
        exit_codes::FLOW_FAILED
    })
}
