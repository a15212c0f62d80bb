//! Command-line entry points

pub mod serve;

use clap::{Parser, Subcommand};

/// TeamUp assistant - cached AI chat and post summaries
#[derive(Parser)]
#[command(name = "teamup-assistant")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(serve::ServeArgs),
}
