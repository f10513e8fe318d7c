//! Command line interface of the `scanload` binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;

use crate::config::Config;
use crate::http::HttpRemote;
use crate::metrics::Counters;
use crate::profile::harness_options;
use crate::scenario::Scenario;
use crate::{observability, run};

/// Load test scenario for the block explorer API.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Options(OptionsCommand),
    Version(VersionCommand),
}

/// run the scenario with a fixed number of virtual users
///
/// This is meant for checking a target and configuration. Ramping and thresholds are left to the
/// load-test harness.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// number of concurrent virtual users
    #[argh(option, short = 'u', default = "1")]
    users: u64,

    /// iterations per virtual user
    #[argh(option, short = 'i', default = "1")]
    iterations: u64,

    /// seed for target selection, random if omitted
    #[argh(option)]
    seed: Option<u64>,
}

/// print the ramp profile and thresholds as harness options JSON
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "options")]
struct OptionsCommand {}

/// print the scanload version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();
    let load_config = || {
        Config::load(args.config.as_deref()).context("failed to load configuration")
    };

    match args.command {
        Command::Version(_) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Options(_) => {
            let config = load_config()?;
            let options = harness_options(&config.stages, &config.thresholds);
            println!("{}", serde_json::to_string_pretty(&options)?);
            Ok(())
        }
        Command::Run(command) => smoke_run(load_config()?, command),
    }
}

fn smoke_run(config: Config, command: RunCommand) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("scanload-rt")
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config.logging);
    tracing::debug!(?config);

    let transport = Arc::new(HttpRemote::new(config.http.timeout)?);
    let counters = Arc::new(Counters::new());
    let scenario = Scenario::from_config(&config, transport, counters.clone())
        .context("invalid target pools")?;

    let seed = command.seed.unwrap_or_else(rand::random);
    tracing::info!(
        host = %config.host,
        hard_mode = config.hard_mode,
        users = command.users,
        iterations = command.iterations,
        seed,
        "starting smoke run"
    );

    let stats = runtime.block_on(run::run(
        Arc::new(scenario),
        command.users,
        command.iterations,
        seed,
    ))?;

    run::print_summary(&stats, &counters.snapshot());
    Ok(())
}
