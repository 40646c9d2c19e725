//! Common utilities shared by the runner, the process supervisor and the CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod meta;

pub use error::{Error, Result};
