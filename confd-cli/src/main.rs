//! confd — render Apollo configuration into local files.
//!
//! # Usage
//!
//! ```text
//! confd run   [--config apollo-confd.yaml]
//! confd once  [--config apollo-confd.yaml]
//! confd diff  [--config apollo-confd.yaml]
//! confd check [--config apollo-confd.yaml] [--json] [--print-config]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, diff::DiffArgs, once::OnceArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(
    name = "confd",
    version,
    about = "Keep local config files in sync with an Apollo config service",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load everything, then watch for changes until interrupted.
    Run(RunArgs),

    /// Load and render every watched file once, then exit.
    Once(OnceArgs),

    /// Show unified diffs of what a render would write.
    Diff(DiffArgs),

    /// Validate the config and print the watch index.
    Check(CheckArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Once(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Check(args) => args.run(),
    }
}
