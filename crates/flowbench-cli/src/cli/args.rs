use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "flowbench",
    version,
    about = "Benchmark wallet UI flows and report data-quality-filtered statistics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run flows in a browser (or from a recording) and report statistics
    Run(RunArgs),
    /// Run the statistics pipeline over previously recorded samples
    Analyze(AnalyzeArgs),
    /// List the flows this build knows how to run
    Flows,
    Version,
}

#[derive(Parser, Clone, Debug)]
pub struct RunArgs {
    /// Config file; `flowbench.yaml` is used when present
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Flows to run, in order (default: all)
    #[arg(long, num_args = 1..)]
    pub flows: Vec<String>,

    #[arg(long)]
    pub browser_loads: Option<u32>,

    #[arg(long)]
    pub iterations: Option<u32>,

    /// Discarded iterations per browser load
    #[arg(long)]
    pub warmups: Option<u32>,

    /// Extra attempts per browser load
    #[arg(long)]
    pub retries: Option<u32>,

    /// Write `{report, results}` here (results are also written after each flow).
    /// Without it the final document goes to STDOUT.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Replay recorded metric bags instead of driving a browser. Takes
    /// precedence over the WebDriver settings.
    #[arg(long)]
    pub replay: Option<PathBuf>,

    #[arg(long, env = "FLOWBENCH_WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// Base URL of the installed extension, e.g. chrome-extension://<id>
    #[arg(long, env = "FLOWBENCH_EXTENSION_URL")]
    pub extension_url: Option<String>,

    #[arg(long, env = "FLOWBENCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Append every aggregate as a JSON line to this file
    #[arg(long)]
    pub telemetry_jsonl: Option<PathBuf>,

    /// Skip the console summary on stderr
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Parser, Clone, Debug)]
pub struct AnalyzeArgs {
    /// JSON array of recorded samples (`flow`, `run`, `metrics`, `timestamp`)
    pub samples: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long)]
    pub quiet: bool,
}
