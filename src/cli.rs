//! CLI argument parsing for the documentation pipeline.
//!
//! Every behavior flag has an environment override so unattended runs can be
//! configured without editing command lines.
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "docflow",
    version,
    about = "Governed documentation pipeline",
    after_help = "Examples:\n  docflow list\n  docflow run --all\n  docflow run --plan kb-update --dry-run\n  docflow run --plan tech-release --exclude factual --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Project root holding intake, policies, and outputs
    #[arg(long, global = true, value_name = "DIR", env = "DOCFLOW_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Enable the optional web ingestion stage
    #[arg(long, global = true, env = "DOCFLOW_WEB_INGEST", value_parser = BoolishValueParser::new())]
    pub web: bool,

    /// Emit debug logs and stage names in listings
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    List(ListArgs),
}

/// Run inputs: which plan plus per-run behavior switches.
#[derive(Args, Debug)]
#[command(about = "Run the full plan or one named plan")]
pub struct RunArgs {
    /// Run the full plan
    #[arg(long, conflicts_with = "plan", required_unless_present = "plan")]
    pub all: bool,

    /// Run one named plan
    #[arg(long, value_name = "NAME")]
    pub plan: Option<String>,

    /// Abort at the first failing stage
    #[arg(
        long,
        value_name = "BOOL",
        env = "DOCFLOW_STOP_ON_ERROR",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub stop_on_error: bool,

    /// Run everything except the publish stage
    #[arg(
        long,
        value_name = "BOOL",
        env = "DOCFLOW_DRY_RUN",
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub dry_run: bool,

    /// Only run these stages
    #[arg(long, value_name = "A,B", env = "DOCFLOW_INCLUDE", value_delimiter = ',')]
    pub include: Vec<String>,

    /// Never run these stages
    #[arg(long, value_name = "A,B", env = "DOCFLOW_EXCLUDE", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Fail governance stages on malformed or unknown policy keys
    #[arg(long, env = "DOCFLOW_STRICT_POLICY", value_parser = BoolishValueParser::new())]
    pub strict_policy: bool,

    /// Print the report and summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn plan_name(&self) -> &str {
        match &self.plan {
            Some(name) if !self.all => name,
            _ => crate::plans::FULL_PLAN,
        }
    }
}

#[derive(Args, Debug)]
#[command(about = "List registered plans")]
pub struct ListArgs {}
