//! Reporting backend
//!
//! A run logs in before any step executes and posts its log once at the end
//! (or at the first failure).

mod client;

use async_trait::async_trait;

use crate::common::Result;
use crate::runlog::LogEntry;

pub use client::BuildiumClient;

/// Destination for run results
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Obtain whatever session the backend needs for `report_run`
    async fn authenticate(&mut self) -> Result<()>;

    /// Record a run; `completed_stage` is `-1` when no step completed
    async fn report_run(
        &self,
        project_id: &str,
        completed_stage: i64,
        logs: &[LogEntry],
    ) -> Result<()>;
}
