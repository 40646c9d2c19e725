//! Test doubles for the runner's collaborators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::common::{Error, Result};
use crate::process::{ProcessControl, ProcessInfo};
use crate::remote::Reporter;
use crate::runlog::LogEntry;

/// Process controller that only counts calls
#[derive(Debug, Default, Clone)]
pub struct FakeProcess {
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    running: bool,
    fail_start: bool,
}

impl FakeProcess {
    pub const PID: u32 = 4242;

    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    /// `(starts, stops)` seen so far, shared across clones
    pub fn counts(&self) -> (usize, usize) {
        (
            self.starts.load(Ordering::SeqCst),
            self.stops.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl ProcessControl for FakeProcess {
    async fn start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(Error::process_spawn(
                "/fake/server",
                std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            ));
        }
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.running.then_some(Self::PID),
        }
    }
}

/// One recorded `report_run` call
#[derive(Debug, Clone)]
pub struct ReportedRun {
    pub project_id: String,
    pub completed_stage: i64,
    pub logs: Vec<LogEntry>,
}

/// Reporter that records calls instead of talking to a backend
#[derive(Debug, Default, Clone)]
pub struct FakeReporter {
    fail_auth: bool,
    fail_report: bool,
    reports: Arc<Mutex<Vec<ReportedRun>>>,
}

impl FakeReporter {
    /// Reporter whose login is rejected
    pub fn failing_auth() -> Self {
        Self {
            fail_auth: true,
            ..Self::default()
        }
    }

    /// Reporter that records runs but answers every report with an error
    pub fn failing_report() -> Self {
        Self {
            fail_report: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<ReportedRun> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reporter for FakeReporter {
    async fn authenticate(&mut self) -> Result<()> {
        if self.fail_auth {
            return Err(Error::Authentication("failed to login: 401".into()));
        }
        Ok(())
    }

    async fn report_run(
        &self,
        project_id: &str,
        completed_stage: i64,
        logs: &[LogEntry],
    ) -> Result<()> {
        self.reports.lock().unwrap().push(ReportedRun {
            project_id: project_id.to_string(),
            completed_stage,
            logs: logs.to_vec(),
        });
        if self.fail_report {
            return Err(Error::Reporting("500: backend down".into()));
        }
        Ok(())
    }
}
