//! `confd once` — one initial load and render pass, no hooks.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use confd_daemon::{init_tracing, run_once};

use super::ConfigArg;

#[derive(Args, Debug)]
pub struct OnceArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

impl OnceArgs {
    pub fn run(self) -> Result<()> {
        init_tracing();
        let config = self.config.load()?;
        let summary = run_once(&config).context("initial load failed")?;

        let mark = if summary.failed == 0 {
            "✓".green().bold()
        } else {
            "✗".red().bold()
        };
        println!(
            "{mark} rendered {} file(s): {} changed, {} unchanged, {} failed",
            summary.rendered + summary.failed,
            summary.changed,
            summary.rendered - summary.changed,
            summary.failed,
        );

        if summary.failed > 0 {
            bail!("{} file(s) failed to render; see log output", summary.failed);
        }
        Ok(())
    }
}
