//! Execution envelope around a single step

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::common::{Error, Result};
use crate::process::ProcessControl;
use crate::runlog::RunLog;

use super::context::RunContext;
use super::step::Step;

/// Wait between starting the process and running the step
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Parse a settle delay override in milliseconds
///
/// `None` and the empty string fall back to [`DEFAULT_SETTLE_DELAY`].
/// Negative values mean no wait; anything that is not an integer is an error.
pub fn parse_settle_delay(raw: Option<&str>) -> Result<Duration> {
    match raw {
        None | Some("") => Ok(DEFAULT_SETTLE_DELAY),
        Some(value) => value
            .parse::<i64>()
            .map(|ms| Duration::from_millis(ms.max(0).unsigned_abs()))
            .map_err(|e| Error::Config(format!("invalid server startup time: {}", e))),
    }
}

/// Runs steps, records their outcome, and manages the process around them
#[derive(Debug, Clone, Default)]
pub struct StepExecutor {
    settle_delay: Option<String>,
}

impl StepExecutor {
    /// Create an executor with a raw settle delay override
    ///
    /// The override is validated each time a server-mode step runs.
    pub fn new(settle_delay: Option<String>) -> Self {
        Self { settle_delay }
    }

    /// Run one step
    ///
    /// With `process`, it is started before the step and stopped exactly
    /// once afterwards, whatever the outcome. The step's own error is
    /// returned unchanged.
    pub async fn execute(
        &self,
        step: &dyn Step,
        log: &RunLog,
        executable: &Path,
        process: Option<&mut (dyn ProcessControl + '_)>,
    ) -> Result<()> {
        match process {
            None => {
                let ctx = RunContext::new(log.clone(), executable, None);
                self.invoke(step, ctx).await
            }
            Some(process) => {
                let outcome = self
                    .execute_supervised(step, log, executable, &mut *process)
                    .await;
                process.stop().await;
                outcome
            }
        }
    }

    async fn execute_supervised(
        &self,
        step: &dyn Step,
        log: &RunLog,
        executable: &Path,
        process: &mut (dyn ProcessControl + '_),
    ) -> Result<()> {
        process.start().await?;

        let delay = match parse_settle_delay(self.settle_delay.as_deref()) {
            Ok(delay) => delay,
            Err(e) => {
                log.log_error(&e.to_string());
                return Err(e);
            }
        };
        debug!(delay_ms = delay.as_millis() as u64, "waiting for process to settle");
        tokio::time::sleep(delay).await;

        let ctx = RunContext::new(log.clone(), executable, Some(process.info()));
        self.invoke(step, ctx).await
    }

    async fn invoke(&self, step: &dyn Step, ctx: RunContext) -> Result<()> {
        let log = ctx.log().clone();
        match step.run(ctx).await {
            Ok(()) => {
                log.log_success("Test passed");
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "step failed");
                log.log_error("Test failed");
                Err(e)
            }
        }
    }
}
