//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use testrun_core::WorkerId;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker ID.
    pub worker_id: WorkerId,

    /// Directory under which each task gets its own working area.
    pub work_root: PathBuf,

    /// Package registry passed to the dependency installer.
    pub registry: Option<String>,

    /// Deadline for fetching the source and reading its revision.
    pub fetch_timeout: Duration,

    /// Deadline for installing dependencies.
    pub install_timeout: Duration,

    /// Pause between the error message and the terminal message when a task
    /// fails before its tests start. Only needed for transports that do not
    /// keep send order.
    pub failure_report_delay: Duration,

    /// Test directory used when the repository config does not name one.
    pub test_directory: String,

    /// Ask the test runner for coloured output.
    pub colors: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: WorkerId::generate(),
            work_root: PathBuf::from(".temp"),
            registry: None,
            fetch_timeout: Duration::from_secs(600),
            install_timeout: Duration::from_secs(600),
            failure_report_delay: Duration::ZERO,
            test_directory: "macaca-test".to_string(),
            colors: true,
        }
    }
}
