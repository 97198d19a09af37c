//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and seed a datarepo SQLite database.
#[derive(Parser, Debug)]
#[command(name = "datarepo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file; defaults apply when it is missing
    #[arg(long, global = true, default_value = "./datarepo.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check core linkage and print the core version
    Ping,

    /// Insert the sample branches and employees
    Seed,

    /// List branches
    Branches {
        /// Only branches located in this town
        #[arg(long)]
        town: Option<String>,

        /// Sort field (name, town, revenue); prefix with `-` for descending
        #[arg(long, allow_hyphen_values = true)]
        sort: Option<String>,
    },

    /// Print branch and employee statistics
    Stats,

    /// List one page of employees
    Employees {
        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Page size; the configured default when omitted
        #[arg(long)]
        size: Option<u32>,
    },
}
