//! Staged runner
//!
//! Executes steps in order up to the configured stage, reports the run to
//! the backend, and stops at the first failing step.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::common::meta::Meta;
use crate::common::Result;
use crate::process::{ManagedProcess, ProcessControl};
use crate::remote::Reporter;
use crate::runlog::RunLog;

use super::executor::StepExecutor;
use super::step::{skip_step, Step};

/// How steps reach the program under test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Steps invoke the executable themselves
    Cli,
    /// The executable is started before every step and killed after it
    Server,
}

/// Progress of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Authenticating,
    /// Login failed, no step ran
    AuthenticationFailed,
    /// Running the step at this index
    Executing(usize),
    Completed,
    /// The step at this index failed
    Aborted(usize),
}

/// Drives one run over an ordered list of steps
pub struct StagedRunner<R> {
    meta: Meta,
    steps: Vec<Box<dyn Step>>,
    skip: BTreeSet<usize>,
    mode: Mode,
    reporter: R,
    executor: StepExecutor,
    log: RunLog,
    process: Option<Box<dyn ProcessControl>>,
    state: RunState,
    completed_stage: i64,
}

impl<R> std::fmt::Debug for StagedRunner<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedRunner")
            .field("meta", &self.meta)
            .field("steps", &self.steps.len())
            .field("skip", &self.skip)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("completed_stage", &self.completed_stage)
            .finish_non_exhaustive()
    }
}

impl<R: Reporter> StagedRunner<R> {
    pub fn new(meta: Meta, steps: Vec<Box<dyn Step>>, mode: Mode, reporter: R) -> Self {
        Self {
            meta,
            steps,
            skip: BTreeSet::new(),
            mode,
            reporter,
            executor: StepExecutor::default(),
            log: RunLog::new(),
            process: None,
            state: RunState::NotStarted,
            completed_stage: -1,
        }
    }

    /// Replace the steps at these indices with a no-op
    pub fn with_skip(mut self, skip: impl IntoIterator<Item = usize>) -> Self {
        self.skip = skip.into_iter().collect();
        self
    }

    /// Raw settle delay override in milliseconds (server mode)
    pub fn with_settle_delay(mut self, settle_delay: Option<String>) -> Self {
        self.executor = StepExecutor::new(settle_delay);
        self
    }

    pub fn with_log(mut self, log: RunLog) -> Self {
        self.log = log;
        self
    }

    /// Use a custom process controller instead of spawning the executable
    ///
    /// Only consulted in [`Mode::Server`].
    pub fn with_process_control(mut self, process: Box<dyn ProcessControl>) -> Self {
        self.process = Some(process);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Highest step index that completed, `-1` if none did
    pub fn completed_stage(&self) -> i64 {
        self.completed_stage
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Log in, execute steps up to the configured stage, and report
    ///
    /// Returns the first failing step's error unchanged. Reporting failures
    /// are logged and never change the result.
    pub async fn run(&mut self) -> Result<()> {
        let executable = self.meta.executable_path();
        info!(
            executable = %executable.display(),
            stage = self.meta.stage,
            steps = self.steps.len(),
            mode = ?self.mode,
            "starting staged run"
        );

        self.state = RunState::Authenticating;
        if let Err(e) = self.reporter.authenticate().await {
            error!(error = %e, "failed to login");
            self.state = RunState::AuthenticationFailed;
            return Err(e);
        }

        let mut process = match self.mode {
            Mode::Cli => None,
            Mode::Server => Some(self.process.take().unwrap_or_else(|| {
                Box::new(ManagedProcess::new(&executable, self.log.clone()))
                    as Box<dyn ProcessControl>
            })),
        };

        let result = self.execute_steps(&executable, process.as_deref_mut()).await;
        self.process = process;
        result
    }

    async fn execute_steps(
        &mut self,
        executable: &Path,
        mut process: Option<&mut (dyn ProcessControl + '_)>,
    ) -> Result<()> {
        self.completed_stage = -1;

        for (index, step) in self.steps.iter().enumerate() {
            if index > self.meta.stage {
                debug!(index, stage = self.meta.stage, "stage limit reached");
                break;
            }

            self.state = RunState::Executing(index);
            let step: &dyn Step = if self.skip.contains(&index) {
                info!(index, "skipping step");
                &skip_step
            } else {
                step.as_ref()
            };

            let outcome = self
                .executor
                .execute(step, &self.log, executable, process.as_deref_mut())
                .await;

            if let Err(e) = outcome {
                warn!(index, error = %e, "step failed, aborting run");
                self.state = RunState::Aborted(index);
                self.report(self.completed_stage).await;
                return Err(e);
            }

            self.log.next_step();
            self.completed_stage = index as i64;
        }

        self.report(self.completed_stage).await;
        self.state = RunState::Completed;
        info!(completed_stage = self.completed_stage, "run completed");
        Ok(())
    }

    async fn report(&self, completed_stage: i64) {
        let logs = self.log.entries();
        if let Err(e) = self
            .reporter
            .report_run(&self.meta.project_id, completed_stage, &logs)
            .await
        {
            warn!(error = %e, "failed to report run");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use crate::runlog::LogKind;
    use crate::testing::fakes::{FakeProcess, FakeReporter};
    use crate::testing::step::step;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<usize>>>;

    fn meta(stage: usize) -> Meta {
        Meta {
            stage,
            entrypoint: "app".into(),
            executable_dir: PathBuf::from("/test/path"),
            project_id: "test-project-123".into(),
        }
    }

    /// Steps that record their index; indices in `failing` return an error
    fn steps(count: usize, failing: &[usize], calls: &Calls) -> Vec<Box<dyn Step>> {
        (0..count)
            .map(|index| {
                let calls = Arc::clone(calls);
                let fail = failing.contains(&index);
                step(move |ctx| {
                    calls.lock().unwrap().push(index);
                    ctx.log().log_title(&format!("Step {index}"));
                    async move {
                        if fail {
                            Err(Error::step_failed(format!("step {index} failed")))
                        } else {
                            Ok(())
                        }
                    }
                })
            })
            .collect()
    }

    fn runner(
        stage: usize,
        steps: Vec<Box<dyn Step>>,
        reporter: FakeReporter,
    ) -> StagedRunner<FakeReporter> {
        StagedRunner::new(meta(stage), steps, Mode::Cli, reporter).with_log(RunLog::quiet())
    }

    fn server_runner(
        steps: Vec<Box<dyn Step>>,
        settle_delay: &str,
        process: FakeProcess,
    ) -> StagedRunner<FakeReporter> {
        StagedRunner::new(meta(2), steps, Mode::Server, FakeReporter::default())
            .with_log(RunLog::quiet())
            .with_settle_delay(Some(settle_delay.to_string()))
            .with_process_control(Box::new(process))
    }

    fn calls() -> Calls {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_all_steps_pass() {
        let calls = calls();
        let mut runner = runner(2, steps(3, &[], &calls), FakeReporter::default());

        runner.run().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(runner.state(), RunState::Completed);
        assert_eq!(runner.completed_stage(), 2);
        assert_eq!(runner.log().current_step(), 3);

        let reports = runner.reporter().reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].project_id, "test-project-123");
        assert_eq!(reports[0].completed_stage, 2);
    }

    #[tokio::test]
    async fn test_stops_at_stage() {
        let calls = calls();
        let mut runner = runner(1, steps(4, &[], &calls), FakeReporter::default());

        runner.run().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![0, 1]);
        assert_eq!(runner.reporter().reports()[0].completed_stage, 1);
    }

    #[tokio::test]
    async fn test_stage_zero_runs_only_first_step() {
        let calls = calls();
        let mut runner = runner(0, steps(3, &[], &calls), FakeReporter::default());

        runner.run().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![0]);
        assert_eq!(runner.reporter().reports()[0].completed_stage, 0);
    }

    #[tokio::test]
    async fn test_high_stage_runs_all_available_steps() {
        let calls = calls();
        let mut runner = runner(10, steps(2, &[], &calls), FakeReporter::default());

        runner.run().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![0, 1]);
        assert_eq!(runner.reporter().reports()[0].completed_stage, 1);
    }

    #[tokio::test]
    async fn test_steps_executed_is_min_of_stage_and_count() {
        for stage in 0..5 {
            for count in 0..5 {
                let calls = calls();
                let mut runner = runner(stage, steps(count, &[], &calls), FakeReporter::default());
                runner.run().await.unwrap();
                assert_eq!(
                    calls.lock().unwrap().len(),
                    (stage + 1).min(count),
                    "stage {stage}, {count} steps"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_failing_step_aborts_and_reports_previous_stage() {
        let calls = calls();
        let mut runner = runner(2, steps(3, &[1], &calls), FakeReporter::default());

        let err = runner.run().await.unwrap_err();

        assert!(matches!(err, Error::StepFailed(ref m) if m == "step 1 failed"));
        assert_eq!(*calls.lock().unwrap(), vec![0, 1]);
        assert_eq!(runner.state(), RunState::Aborted(1));
        assert_eq!(runner.completed_stage(), 0);

        let reports = runner.reporter().reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].completed_stage, 0);
        let last = reports[0].logs.last().unwrap();
        assert_eq!(last.kind, LogKind::Failure);
        assert_eq!(last.message, "Test failed");
        assert_eq!(last.stage, 1);
    }

    #[tokio::test]
    async fn test_first_step_failure_reports_minus_one() {
        let calls = calls();
        let mut runner = runner(2, steps(3, &[0], &calls), FakeReporter::default());

        assert!(runner.run().await.is_err());
        assert_eq!(*calls.lock().unwrap(), vec![0]);
        assert_eq!(runner.reporter().reports()[0].completed_stage, -1);
    }

    #[tokio::test]
    async fn test_no_steps_reports_minus_one() {
        let mut runner = runner(0, Vec::new(), FakeReporter::default());

        runner.run().await.unwrap();

        assert_eq!(runner.state(), RunState::Completed);
        assert_eq!(runner.reporter().reports()[0].completed_stage, -1);
    }

    #[tokio::test]
    async fn test_authentication_failure_runs_nothing() {
        let calls = calls();
        let reporter = FakeReporter::failing_auth();
        let mut runner = runner(2, steps(3, &[], &calls), reporter);

        let err = runner.run().await.unwrap_err();

        assert!(matches!(err, Error::Authentication(_)));
        assert_eq!(runner.state(), RunState::AuthenticationFailed);
        assert!(calls.lock().unwrap().is_empty());
        assert!(runner.reporter().reports().is_empty());
    }

    #[tokio::test]
    async fn test_skip_set_replaces_step_without_shifting_indices() {
        let calls = calls();
        let mut runner = runner(2, steps(3, &[], &calls), FakeReporter::default()).with_skip([1]);

        runner.run().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![0, 2]);
        assert_eq!(runner.completed_stage(), 2);

        let entries = runner.log().entries();
        let skipped: Vec<_> = entries.iter().filter(|e| e.stage == 1).collect();
        assert_eq!(skipped[0].kind, LogKind::Header);
        assert_eq!(skipped[0].message, "Skipping Step");
        assert_eq!(skipped[1].kind, LogKind::Info);
        assert_eq!(skipped[1].message, "Skipping step");
        assert!(entries.iter().any(|e| e.stage == 2 && e.message == "Step 2"));
    }

    #[tokio::test]
    async fn test_skipped_failing_step_does_not_fail() {
        let calls = calls();
        let mut runner = runner(2, steps(3, &[1], &calls), FakeReporter::default()).with_skip([1]);

        runner.run().await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_reporting_failure_does_not_change_result() {
        let reporter = FakeReporter::failing_report();

        let mut passing = runner(1, steps(2, &[], &calls()), reporter.clone());
        passing.run().await.unwrap();
        assert_eq!(passing.state(), RunState::Completed);

        let mut failing = runner(1, steps(2, &[0], &calls()), reporter.clone());
        let err = failing.run().await.unwrap_err();
        assert!(matches!(err, Error::StepFailed(_)));
        assert_eq!(reporter.reports().len(), 2);
    }

    #[tokio::test]
    async fn test_cli_mode_passes_executable_and_no_process() {
        let seen = Arc::new(Mutex::new(None));
        let seen_in_step = Arc::clone(&seen);
        let check = step(move |ctx| {
            *seen_in_step.lock().unwrap() =
                Some((ctx.executable().to_path_buf(), ctx.process().is_some()));
            async { Ok(()) }
        });
        let mut runner = runner(0, vec![check], FakeReporter::default());

        runner.run().await.unwrap();

        let (executable, has_process) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(executable, PathBuf::from("/test/path/app"));
        assert!(!has_process);
    }

    #[tokio::test]
    async fn test_server_mode_starts_and_stops_every_step() {
        let calls = calls();
        let process = FakeProcess::default();
        let mut runner = server_runner(steps(3, &[], &calls), "0", process.clone());

        runner.run().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(process.counts(), (3, 3));
    }

    #[tokio::test]
    async fn test_server_mode_stops_after_failing_step() {
        let calls = calls();
        let process = FakeProcess::default();
        let mut runner = server_runner(steps(3, &[1], &calls), "0", process.clone());

        assert!(runner.run().await.is_err());
        assert_eq!(process.counts(), (2, 2));
    }

    #[tokio::test]
    async fn test_invalid_settle_delay_fails_first_step() {
        let calls = calls();
        let process = FakeProcess::default();
        let mut runner = server_runner(steps(3, &[], &calls), "not-a-number", process.clone());

        let err = runner.run().await.unwrap_err();

        assert!(err.is_config());
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(process.counts(), (1, 1));
        assert_eq!(runner.reporter().reports()[0].completed_stage, -1);
    }

    #[tokio::test]
    async fn test_spawn_failure_reported_as_step_failure() {
        let calls = calls();
        let mut runner = server_runner(steps(3, &[], &calls), "0", FakeProcess::failing());

        let err = runner.run().await.unwrap_err();

        assert!(matches!(err, Error::ProcessSpawn { .. }));
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(runner.state(), RunState::Aborted(0));
    }
}
