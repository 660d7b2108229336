//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Customer name
    #[arg(short, long)]
    pub name: String,

    /// Customer email (stored encrypted)
    #[arg(short, long)]
    pub email: String,

    /// Customer phone, exactly 10 digits
    #[arg(short, long)]
    pub phone: String,

    /// Photo to attach (jpg, jpeg or png)
    #[arg(short, long, value_name = "FILE")]
    pub image: Option<PathBuf>,
}

/// Search command arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Email to look up
    pub email: String,

    /// Override the configured search strategy
    #[arg(short, long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// XML command arguments.
#[derive(Debug, Args)]
pub struct XmlCommand {
    /// Email of the customer to generate XML for
    pub email: String,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Customer id
    pub id: i64,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Search strategy argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Fingerprint index lookup
    Index,
    /// Decrypt every row
    Scan,
}

impl From<StrategyArg> for crate::registry::SearchStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Index => Self::Index,
            StrategyArg::Scan => Self::Scan,
        }
    }
}
