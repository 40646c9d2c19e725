//! Staged test execution
//!
//! A run is an ordered list of [`Step`]s executed up to the project's
//! current stage. In server mode every step gets a freshly started copy of
//! the program under test, killed again once the step finishes.

mod context;
mod executor;
mod runner;
mod step;

#[cfg(test)]
pub(crate) mod fakes;

pub use context::RunContext;
pub use executor::{parse_settle_delay, StepExecutor, DEFAULT_SETTLE_DELAY};
pub use runner::{Mode, RunState, StagedRunner};
pub use step::{step, Step};
