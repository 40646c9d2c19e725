//! Collaborators handed to each step

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::process::ProcessInfo;
use crate::runlog::RunLog;

/// Everything a step may use, built fresh for every step
#[derive(Debug, Clone)]
pub struct RunContext {
    log: RunLog,
    executable: PathBuf,
    process: Option<ProcessInfo>,
}

impl RunContext {
    pub fn new(log: RunLog, executable: impl Into<PathBuf>, process: Option<ProcessInfo>) -> Self {
        Self {
            log,
            executable: executable.into(),
            process,
        }
    }

    /// Run log for titles, results and notes
    pub fn log(&self) -> &RunLog {
        &self.log
    }

    /// Resolved path of the program under test
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Process started for this step, `None` in CLI mode
    pub fn process(&self) -> Option<&ProcessInfo> {
        self.process.as_ref()
    }

    /// Command for running the program under test with captured output
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}
