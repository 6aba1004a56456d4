//! `confd check` — offline config validation and watch index listing.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use confd_core::{address, config::ConfdConfig};
use confd_sync::{writer::target_path, WatchIndex};

/// Arguments for `confd check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: super::ConfigArg,

    /// Emit the watch index as JSON.
    #[arg(long)]
    pub json: bool,

    /// Echo the parsed config (secret masked) before the index.
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct IndexRow {
    #[tabled(rename = "group")]
    group: usize,
    #[tabled(rename = "address")]
    address: String,
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "file")]
    file: String,
    #[tabled(rename = "onchange")]
    on_change: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let rows = index_rows(&config);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }

        if self.print_config {
            print!("{}", config.to_redacted_yaml()?);
            println!();
        }

        println!(
            "{} {} ({} namespace(s), {} watched address(es))",
            "✓".green().bold(),
            self.config.config.display(),
            config.apollo.namespaces.len(),
            WatchIndex::from_config(&config).address_count(),
        );
        for namespace in &config.apollo.namespaces {
            let kind = if address::is_data_namespace(namespace) {
                "data".cyan()
            } else {
                "templates".normal()
            };
            println!("  {namespace} [{kind}]");
        }

        if rows.is_empty() {
            println!("{}", "No watched keys configured.".yellow());
            return Ok(());
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn index_rows(config: &ConfdConfig) -> Vec<IndexRow> {
    let index = WatchIndex::from_config(config);
    let mut rows = Vec::new();
    for (addr, indices) in index.entries() {
        let (namespace, _) = address::split(addr);
        for &i in indices {
            let Some(group) = index.group(i) else { continue };
            rows.push(IndexRow {
                group: i,
                address: addr.to_string(),
                kind: if address::is_data_namespace(&namespace) {
                    "data"
                } else {
                    "template"
                },
                file: target_path(&group.path, addr).display().to_string(),
                on_change: if group.has_hook() {
                    group.on_change.clone()
                } else {
                    "-".to_string()
                },
            });
        }
    }
    rows
}
