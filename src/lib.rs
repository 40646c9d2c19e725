//! Stage harness - staged test runner for client programs
//!
//! Drives a client executable through an ordered list of test steps, one
//! stage at a time, and reports each run's log to the reporting backend.
//! In server mode the client is started fresh for every step and its whole
//! process tree is killed afterwards.

pub mod cli;
pub mod common;
pub mod process;
pub mod remote;
pub mod runlog;
pub mod testing;

// Re-export commonly used types for test programs
pub use cli::{run_cli_test, run_server_test, HarnessArgs};
pub use common::{Error, Result};
pub use process::{ManagedProcess, ProcessControl, ProcessInfo};
pub use runlog::{LogEntry, LogKind, RunLog};
pub use testing::{step, Mode, RunContext, StagedRunner, Step};
