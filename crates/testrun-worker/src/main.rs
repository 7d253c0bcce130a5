//! TestRun Worker Daemon
//!
//! Reads task messages as JSON lines on stdin and writes status messages as
//! JSON lines on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::BufReader;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use testrun_core::WorkerId;
use testrun_worker::channel::JsonLinesChannel;
use testrun_worker::collaborators::{CommandTestRunner, GitFetcher, NpmInstaller, SummaryAnalyzer};
use testrun_worker::telemetry::HostTelemetry;
use testrun_worker::{Collaborators, TaskExecutor, Worker, WorkerConfig};

/// TestRun worker - runs test tasks assigned by the dispatcher
#[derive(Parser)]
#[command(name = "testrun-worker")]
#[command(about = "Fetches, provisions and tests repositories", long_about = None)]
struct Cli {
    /// Worker ID (generated when omitted)
    #[arg(long)]
    worker_id: Option<String>,

    /// Directory holding per-task working areas
    #[arg(long, default_value = ".temp")]
    work_root: PathBuf,

    /// Package registry for dependency installs
    #[arg(long)]
    registry: Option<String>,

    /// Source fetch deadline in seconds
    #[arg(long, default_value_t = 600)]
    fetch_timeout_secs: u64,

    /// Dependency install deadline in seconds
    #[arg(long, default_value_t = 600)]
    install_timeout_secs: u64,

    /// Pause before the terminal message after a setup failure (milliseconds)
    #[arg(long, default_value_t = 0)]
    failure_report_delay_ms: u64,

    /// Test directory when the repository does not configure one
    #[arg(long, default_value = "macaca-test")]
    test_directory: String,

    /// Disable coloured test output
    #[arg(long)]
    no_color: bool,

    /// Test runner program
    #[arg(long, default_value = "npx")]
    runner: String,

    /// Test runner arguments (before the test directory)
    #[arg(
        long = "runner-arg",
        allow_hyphen_values = true,
        default_values_t = ["mocha".to_string(), "--recursive".to_string()]
    )]
    runner_args: Vec<String>,

    /// Path to the git CLI
    #[arg(long, default_value = "git")]
    git: String,

    /// Path to the npm CLI
    #[arg(long, default_value = "npm")]
    npm: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: Level,
}

impl Cli {
    fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            worker_id: self
                .worker_id
                .as_deref()
                .map(WorkerId::new)
                .unwrap_or_else(WorkerId::generate),
            work_root: self.work_root.clone(),
            registry: self.registry.clone(),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            install_timeout: Duration::from_secs(self.install_timeout_secs),
            failure_report_delay: Duration::from_millis(self.failure_report_delay_ms),
            test_directory: self.test_directory.clone(),
            colors: !self.no_color,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for status messages
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Arc::new(cli.worker_config());

    info!(
        worker_id = %config.worker_id,
        work_root = %config.work_root.display(),
        registry = ?config.registry,
        "Starting TestRun worker"
    );

    let collaborators = Collaborators {
        fetcher: Arc::new(GitFetcher::new(&cli.git)),
        installer: Arc::new(NpmInstaller::new(&cli.npm)),
        runner: Arc::new(CommandTestRunner::new(&cli.runner).with_args(cli.runner_args.clone())),
        analyzer: Arc::new(SummaryAnalyzer),
        channel: Arc::new(JsonLinesChannel::stdout()),
        telemetry: Arc::new(HostTelemetry::new(config.worker_id.clone())),
    };

    let worker = Worker::new(TaskExecutor::new(config, collaborators));
    worker.serve(BufReader::new(tokio::io::stdin())).await?;

    info!("Input closed, worker exiting");
    Ok(())
}
