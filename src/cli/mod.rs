pub mod explain;
pub mod generate;
pub mod init;
pub mod serve;
pub mod validate;

use clap::{Parser, Subcommand};

use crate::client::DEFAULT_SERVER_URL;

/// A3S Cron Relay - Stream cron expression explanations from an LLM
#[derive(Debug, Parser)]
#[command(name = "a3s-cron-relay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP relay server
    Serve {
        /// Host address to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Explain a cron expression, printing rows as they stream in
    Explain {
        /// Cron expression, quoted (e.g. "0 5 * * *"). Omit for interactive mode
        expression: Option<String>,

        /// Ask for a short `value: description` list instead of the detailed table
        #[arg(long)]
        terse: bool,

        /// Relay server URL
        #[arg(long, default_value = DEFAULT_SERVER_URL)]
        server: String,

        /// Print each row as a JSON object
        #[arg(long)]
        json: bool,
    },

    /// Generate a cron expression from a description
    Generate {
        /// What the schedule should do (e.g. "every Monday at 9am")
        description: String,

        /// Relay server URL
        #[arg(long, default_value = DEFAULT_SERVER_URL)]
        server: String,
    },

    /// Check cron expression syntax without contacting the server
    Validate {
        /// Cron expression, quoted
        expression: String,
    },

    /// Write the default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}
