//! Run log: the ordered pass/fail record of one harness run
//!
//! Every entry is tagged with the step counter at the time it was written.
//! The log is a cheap handle over shared state so the control task and the
//! process output pumps can append to the same sequence. Entries are echoed
//! to the console as they are recorded.

mod sink;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use colored::Colorize;
use serde::{Deserialize, Serialize};

pub use sink::ClientSink;

/// Kind of a log entry, serialized in upper snake case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    Header,
    Success,
    Failure,
    Info,
    ClientCode,
}

/// A single recorded log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub stage: usize,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
}

#[derive(Debug, Default)]
struct State {
    step: usize,
    entries: Vec<LogEntry>,
}

/// Shared, append-only log for one run
#[derive(Debug, Clone)]
pub struct RunLog {
    inner: Arc<Mutex<State>>,
    echo: bool,
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLog {
    /// Create an empty log that echoes entries to stdout
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State::default())),
            echo: true,
        }
    }

    /// Create an empty log that only records
    pub fn quiet() -> Self {
        Self {
            echo: false,
            ..Self::new()
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Entries are plain data, a panic while holding the lock cannot corrupt them
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current step number used to tag new entries
    pub fn current_step(&self) -> usize {
        self.state().step
    }

    /// Advance the step number after a completed step
    pub fn next_step(&self) {
        self.state().step += 1;
    }

    /// Snapshot of every entry recorded so far, in order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.state().entries.clone()
    }

    pub fn log_title(&self, title: &str) {
        self.push(LogKind::Header, title);
    }

    pub fn log_success(&self, message: &str) {
        self.push(LogKind::Success, message);
    }

    pub fn log_error(&self, message: &str) {
        self.push(LogKind::Failure, message);
    }

    pub fn log_info(&self, message: &str) {
        self.push(LogKind::Info, message);
    }

    /// Record output of the code under test, one entry per non-empty line
    pub fn log_client_code(&self, output: &str) {
        for line in output.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if !line.is_empty() {
                self.push(LogKind::ClientCode, line);
            }
        }
    }

    /// Byte sink that feeds process output into this log
    pub fn client_sink(&self) -> ClientSink {
        ClientSink::new(self.clone())
    }

    fn push(&self, kind: LogKind, message: &str) {
        let mut state = self.state();
        let stage = state.step;
        if self.echo {
            print_entry(stage, kind, message);
        }
        state.entries.push(LogEntry {
            stage,
            message: message.to_string(),
            kind,
        });
    }
}

fn print_entry(stage: usize, kind: LogKind, message: &str) {
    match kind {
        LogKind::Header => {
            let rule = "--------------------------------";
            println!("{}", format!("{rule}Test {stage}: {message}{rule}").bold());
        }
        LogKind::Success => {
            println!("{}", format!("[Test {stage}] [Success]: {message}").green())
        }
        LogKind::Failure => println!("{}", format!("[Test {stage}] [Error]: {message}").red()),
        LogKind::Info => println!("{}", format!("[Test {stage}] [Info]: {message}").blue()),
        LogKind::ClientCode => {
            println!("{}", format!("[Test {stage}] [Your Code]: {message}").yellow())
        }
    }
}
