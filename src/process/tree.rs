//! Spawning and killing a whole process tree
//!
//! On Unix the child leads a fresh process group, so anything it forks can be
//! killed with one signal to the negated group id. Elsewhere only the direct
//! child is killed.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// A spawned child process and every process it starts
#[derive(Debug)]
pub struct ProcessTree {
    child: Child,
    pid: Option<u32>,
    /// The root has exited and been waited on, so its pid may be recycled
    reaped: bool,
}

impl ProcessTree {
    /// Spawn `executable` with piped stdout/stderr in its own process group
    pub fn spawn(executable: &Path) -> io::Result<Self> {
        let mut cmd = std::process::Command::new(executable);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut cmd = Command::from(cmd);
        cmd.kill_on_drop(true);

        let child = cmd.spawn()?;
        let pid = child.id();
        Ok(Self {
            child,
            pid,
            reaped: false,
        })
    }

    /// OS process id of the tree's root, captured at spawn time
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Forcefully kill the root and all of its descendants
    #[cfg(unix)]
    pub fn terminate_tree(&mut self) -> io::Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        let pgid = i32::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

        // Once the root is reaped the group only exists while a descendant
        // is still in it, and the kernel will not hand out a pid that is in
        // use as a group id. An empty group is left alone. If it emptied and
        // the id was recycled between this probe and the kill, the signal
        // can still reach a stranger; that window is accepted.
        if self.reaped && unsafe { libc::killpg(pgid, 0) } != 0 {
            return Ok(());
        }

        // The child called setpgid(0, 0) before exec, so its pid is the group id
        let result = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Forcefully kill the root and all of its descendants
    #[cfg(not(unix))]
    pub fn terminate_tree(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    /// Wait for the root process to exit
    ///
    /// Safe to call again after it has returned once.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(status)
    }
}
