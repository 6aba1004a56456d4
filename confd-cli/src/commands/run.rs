//! `confd run` — foreground agent.

use anyhow::{Context, Result};
use clap::Args;

use confd_daemon::start_blocking;

use super::ConfigArg;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        start_blocking(config).context("agent stopped with an error")
    }
}
