//! Command line interface of the `txbench` binary.

use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;

use crate::bench::Benchmark;
use crate::config::Config;
use crate::{observability, report};

/// Transactional key-value workload benchmark.
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
    Load(LoadCommand),
    Run(RunCommand),
    Version(VersionCommand),
}

/// insert the initial records into a fresh store
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "load")]
struct LoadCommand {}

/// load the initial records, then run the measured transaction phase
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {}

/// print the txbench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .max_blocking_threads(config.threads.max(1))
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing();
    tracing::debug!(?config);

    runtime.block_on(async move {
        let bench = Benchmark::new(config);

        let load = bench.load().await?;
        report::print_phase(&load);

        if let Command::Run(RunCommand {}) = args.command {
            let run = bench.run().await?;
            report::print_phase(&run);
        }

        println!();
        Ok(())
    })
}
