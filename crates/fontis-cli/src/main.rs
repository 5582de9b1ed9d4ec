//! fontis: secure fetch-and-verify of component sources.
//!
//! Fetches a component from its git remote, checks that the revision is
//! signed by a quorum of trusted maintainers, and only then moves the
//! working branch onto it.

mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use color_eyre::eyre::Result;

use crate::config::ToolConfig;

/// fontis: fetch a component's sources and verify their provenance.
///
/// Exits 0 on success, on a missing remote with --ignore-missing, and when
/// --fetch-versions-only finds no version tag. Any other failure prints
/// its cause to standard output and exits 1.
#[derive(Parser)]
#[command(name = "fontis", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    fetch: commands::fetch::FetchArgs,

    /// Tool configuration file (TOML).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more detail: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output logs as JSON (for machine consumption).
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if let Err(report) = run(cli) {
        println!("{report}");
        process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = ToolConfig::load(cli.config.as_deref())?;
    commands::fetch::execute(cli.fetch, config.into_tooling())
}
