pub mod commands;

use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::interval::parse_interval;

#[derive(Parser)]
#[command(name = "jsonpoll")]
#[command(about = "Poll JSON REST resources and print what comes back", long_about = None)]
pub struct Cli {
    /// Base URL resource paths are resolved against (overrides the config file)
    #[arg(long, global = true)]
    pub base: Option<String>,

    /// Bearer token (overrides the config file and JSONPOLL_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Log request and decode details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll one or more resources
    Watch {
        /// Resource paths relative to the base URL
        #[arg(required = true)]
        paths: Vec<String>,

        /// Repeat interval (e.g., "30s", "5m", "1h"); polls once when omitted
        #[arg(short, long, value_parser = parse_interval)]
        every: Option<Duration>,

        /// Send this ETag with the first request
        #[arg(long)]
        etag: Option<String>,
    },
    /// Print the config file location
    ConfigPath,
}
