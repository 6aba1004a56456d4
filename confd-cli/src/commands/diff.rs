//! `confd diff` — show unified diffs for what a render would write.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use confd_daemon::{init_tracing, preview_diff};

use super::ConfigArg;

/// Arguments for `confd diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        init_tracing();
        let config = self.config.load()?;
        let report = preview_diff(&config).context("diff failed")?;

        if report.is_clean() {
            println!("No differences.");
            return Ok(());
        }

        for diff in &report.diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        for (address, error) in &report.failures {
            eprintln!("{} {address}: {error}", "failed".red().bold());
        }

        Ok(())
    }
}
