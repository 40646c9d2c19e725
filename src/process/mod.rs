//! Lifecycle of the external process a server-mode step talks to

mod managed;
mod tree;

use async_trait::async_trait;

use crate::common::Result;

pub use managed::ManagedProcess;

/// What a step can see about the process started for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessInfo {
    /// Process id of the tree's root, `None` when nothing is running
    pub pid: Option<u32>,
}

/// Start/stop control over one supervised process
///
/// [`ManagedProcess`] is the OS implementation. The runner only needs this
/// trait, so other process backends can be dropped in.
#[async_trait]
pub trait ProcessControl: Send {
    /// Launch the process; it is running when this returns `Ok`
    async fn start(&mut self) -> Result<()>;

    /// Tear the process down and wait until it is gone
    ///
    /// Must be a no-op when nothing is running.
    async fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn info(&self) -> ProcessInfo;
}
