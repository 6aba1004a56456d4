pub mod check;
pub mod diff;
pub mod once;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use confd_core::config::{self, ConfdConfig, DEFAULT_CONFIG_FILE};

/// `--config` flag shared by every subcommand.
#[derive(Args, Debug)]
pub struct ConfigArg {
    /// Path to the agent config file.
    #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

impl ConfigArg {
    pub fn load(&self) -> Result<ConfdConfig> {
        config::load_at(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))
    }
}
