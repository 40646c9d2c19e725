//! Command-line entry points
//!
//! A test program builds its step list and hands it to [`run_cli_test`] or
//! [`run_server_test`], which take care of arguments, configuration,
//! reporting and the final project link.

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, error};

use crate::common::config::Config;
use crate::common::meta::Meta;
use crate::common::{logging, Error, Result};
use crate::remote::{BuildiumClient, Reporter};
use crate::testing::{Mode, RunState, StagedRunner, Step};

/// Arguments accepted by every test program
#[derive(Parser, Debug, Clone)]
#[command(about = "Run staged tests against a client program")]
pub struct HarnessArgs {
    /// Directory containing the client executable and meta.json
    #[arg(long, default_value = "client_bin")]
    pub path: PathBuf,

    /// Step indices to skip, comma separated (e.g. --skip 1,3)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<usize>,
}

/// Run steps that invoke the client executable themselves
pub async fn run_cli_test(steps: Vec<Box<dyn Step>>) -> Result<()> {
    run_from_env(Mode::Cli, steps).await
}

/// Run steps against a freshly started client server per step
pub async fn run_server_test(steps: Vec<Box<dyn Step>>) -> Result<()> {
    run_from_env(Mode::Server, steps).await
}

async fn run_from_env(mode: Mode, steps: Vec<Box<dyn Step>>) -> Result<()> {
    logging::init();
    let args = HarnessArgs::parse();
    let config = Config::from_env();

    let result = run_with_args(&args, &config, mode, steps).await;
    if let Err(e) = &result {
        error!(error = %e, "test run failed");
    }
    result
}

/// Run with pre-parsed arguments and configuration
pub async fn run_with_args(
    args: &HarnessArgs,
    config: &Config,
    mode: Mode,
    steps: Vec<Box<dyn Step>>,
) -> Result<()> {
    let meta = load_meta(args)?;
    let client = BuildiumClient::new(config);
    run_with_reporter(args, config, meta, mode, steps, client).await
}

/// Same as [`run_with_args`] with an already loaded descriptor and a custom reporter
pub async fn run_with_reporter<R: Reporter>(
    args: &HarnessArgs,
    config: &Config,
    meta: Meta,
    mode: Mode,
    steps: Vec<Box<dyn Step>>,
    reporter: R,
) -> Result<()> {
    let project_id = meta.project_id.clone();
    let mut runner = StagedRunner::new(meta, steps, mode, reporter)
        .with_skip(args.skip.iter().copied())
        .with_settle_delay(config.settle_delay.clone());

    let result = runner.run().await;
    debug!(state = ?runner.state(), completed_stage = runner.completed_stage(), "run finished");

    if runner.state() != RunState::AuthenticationFailed {
        println!("{}", config.environment.project_url(&project_id));
    }
    result
}

/// Load `meta.json` from the directory named by `--path`
pub fn load_meta(args: &HarnessArgs) -> Result<Meta> {
    if args.path.as_os_str().is_empty() {
        return Err(Error::Config("Path to client binary required".to_string()));
    }
    Meta::load(&args.path)
}
