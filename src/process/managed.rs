//! Supervised external process
//!
//! `start` spawns the executable and hands it to a background supervisor
//! task. `stop` cancels the supervisor and joins it, so when `stop` returns
//! the whole process group has been killed and its output drained into the
//! run log.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::{Error, Result};
use crate::runlog::{ClientSink, RunLog};

use super::tree::ProcessTree;
use super::{ProcessControl, ProcessInfo};

/// Upper bound on waiting for output pipes to close after the kill
///
/// A process that escaped the group can hold the pipes open; its pumps are
/// aborted once this expires.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Read size for process output
const PUMP_BUFFER_SIZE: usize = 8192;

/// Handle to a running supervisor task
#[derive(Debug)]
struct Supervisor {
    pid: Option<u32>,
    cancel: CancellationToken,
    done: JoinHandle<()>,
}

/// Owns at most one running process tree at a time
#[derive(Debug)]
pub struct ManagedProcess {
    executable: PathBuf,
    log: RunLog,
    supervisor: Option<Supervisor>,
}

impl ManagedProcess {
    pub fn new(executable: impl Into<PathBuf>, log: RunLog) -> Self {
        Self {
            executable: executable.into(),
            log,
            supervisor: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.supervisor.is_some()
    }

    /// Process id of the running tree's root
    pub fn pid(&self) -> Option<u32> {
        self.supervisor.as_ref().and_then(|s| s.pid)
    }

    /// Spawn the executable and start supervising it
    ///
    /// A process left running by an earlier `start` is stopped first.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("restarting managed process");
            self.stop().await;
        }

        let mut tree = match ProcessTree::spawn(&self.executable) {
            Ok(tree) => tree,
            Err(e) => {
                error!(
                    executable = %self.executable.display(),
                    error = %e,
                    "failed to spawn managed process"
                );
                self.log.log_error(&e.to_string());
                return Err(Error::process_spawn(&self.executable, e));
            }
        };

        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = tree.take_stdout() {
            pumps.push(tokio::spawn(pump(stdout, self.log.client_sink())));
        }
        if let Some(stderr) = tree.take_stderr() {
            pumps.push(tokio::spawn(pump(stderr, self.log.client_sink())));
        }

        let pid = tree.id();
        let cancel = CancellationToken::new();
        let done = tokio::spawn(supervise(tree, cancel.clone(), pumps));

        info!(
            pid = ?pid,
            executable = %self.executable.display(),
            "managed process started"
        );

        self.supervisor = Some(Supervisor { pid, cancel, done });
        Ok(())
    }

    /// Kill the process group and wait for the supervisor to finish
    ///
    /// Does nothing if the process is not running.
    pub async fn stop(&mut self) {
        let Some(supervisor) = self.supervisor.take() else {
            return;
        };

        supervisor.cancel.cancel();
        if let Err(e) = supervisor.done.await {
            warn!(error = %e, "managed process supervisor failed");
        }
        debug!(pid = ?supervisor.pid, "managed process stopped");
    }
}

#[async_trait]
impl ProcessControl for ManagedProcess {
    async fn start(&mut self) -> Result<()> {
        ManagedProcess::start(self).await
    }

    async fn stop(&mut self) {
        ManagedProcess::stop(self).await;
    }

    fn is_running(&self) -> bool {
        ManagedProcess::is_running(self)
    }

    fn info(&self) -> ProcessInfo {
        ProcessInfo { pid: self.pid() }
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        // Can't await here; the supervisor still kills the group if the runtime is alive
        if let Some(supervisor) = &self.supervisor {
            supervisor.cancel.cancel();
        }
    }
}

/// Wait for cancellation, then kill the tree and drain its output
///
/// A process that exits on its own is still waited on until cancellation,
/// since children it forked may keep running in the group.
async fn supervise(
    mut tree: ProcessTree,
    cancel: CancellationToken,
    mut pumps: Vec<JoinHandle<()>>,
) {
    tokio::select! {
        () = cancel.cancelled() => {}
        status = tree.wait() => {
            match status {
                Ok(status) => debug!(%status, "managed process exited before stop"),
                Err(e) => warn!(error = %e, "failed to wait on managed process"),
            }
            cancel.cancelled().await;
        }
    }

    if let Err(e) = tree.terminate_tree() {
        debug!(error = %e, "process group already gone");
    }
    if let Err(e) = tree.wait().await {
        debug!(error = %e, "failed to reap managed process");
    }

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, join_all(pumps.iter_mut())).await;
    if drained.is_err() {
        warn!("timed out draining managed process output, dropping the rest");
        for pump in &pumps {
            pump.abort();
        }
        // Nothing may reach the log once stop returns
        join_all(pumps).await;
    }
}

/// Copy a process output stream into the run log
async fn pump<R>(mut reader: R, mut sink: ClientSink)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = sink.write_all(&buf[..n]) {
                    debug!(error = %e, "failed to record process output");
                }
            }
            Err(e) => {
                debug!(error = %e, "process output stream closed");
                break;
            }
        }
    }
    let _ = sink.flush();
}
