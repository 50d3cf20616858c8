//! CLI module for the data factory toolkit
//!
//! Provides administration subcommands against the configured backends:
//! - `cache`: inspect and purge cache entries
//! - `config`: print the effective configuration

pub mod cache;
pub mod config;

use clap::{Parser, Subcommand};

/// Data factory - cache-aside data access administration
#[derive(Parser)]
#[command(name = "data-factory")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Inspect or purge the configured cache backend
    Cache(cache::CacheArgs),

    /// Print the effective configuration
    Config(config::ConfigArgs),
}
