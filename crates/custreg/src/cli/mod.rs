//! Command-line interface for custreg.
//!
//! This module provides the CLI structure and the interactive shell for the
//! `custreg` binary.

mod commands;
pub mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, ConfigCommand, SearchCommand, ShowCommand, StatusCommand, StrategyArg, XmlCommand,
};

/// custreg - Customer records with encrypted emails
///
/// Stores customers in a local `SQLite` database. Emails are encrypted with a
/// key kept in a separate key file and can be searched without being stored
/// in clear.
#[derive(Debug, Parser)]
#[command(name = "custreg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a customer
    Add(AddCommand),

    /// Find a customer by email
    Search(SearchCommand),

    /// Generate and store the XML snippet for a customer
    Xml(XmlCommand),

    /// Show a stored customer by id
    Show(ShowCommand),

    /// Show database and key status
    Status(StatusCommand),

    /// Fill in the customer form interactively
    Shell,

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}
