use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod engine;
mod error;
mod governance;
mod paths;
mod plans;
mod policy;
mod publish;
mod record;
mod stage;
mod stages;
mod workflow;

use cli::{Command, RootArgs};

const LOG_ENV: &str = "DOCFLOW_LOG";

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let result = match &args.command {
        Command::Run(run) => workflow::run_plan(&args, run),
        Command::List(_) => workflow::list_plans(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(workflow::exit_code(&err))
        }
    }
}
