//! Test steps

use std::future::Future;

use async_trait::async_trait;

use crate::common::Result;

use super::context::RunContext;

/// One unit of test logic
///
/// Any `Fn(RunContext) -> impl Future<Output = Result<()>>` is a step, so
/// plain async functions and closures returning `async move` blocks work.
/// The returned future must own what it uses.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, ctx: RunContext) -> Result<()>;
}

#[async_trait]
impl<F, Fut> Step for F
where
    F: Fn(RunContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: RunContext) -> Result<()> {
        (self)(ctx).await
    }
}

/// Box a step function for a runner's step list
pub fn step<F, Fut>(f: F) -> Box<dyn Step>
where
    F: Fn(RunContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(f)
}

/// Stand-in for steps listed in the skip set
pub(crate) async fn skip_step(ctx: RunContext) -> Result<()> {
    ctx.log().log_title("Skipping Step");
    ctx.log().log_info("Skipping step");
    Ok(())
}
