//! CLI module for Augur
//!
//! # Commands
//!
//! - `serve` - Start the HTTP server and health monitor
//! - `run` - Execute one pipeline file against the configured services
//! - `services` - List configured services, optionally probing them
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! augur serve -c augur.toml
//! augur run pipeline.toml --json
//! augur services --probe
//! augur completions bash > ~/.bash_completion.d/augur
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod run;
pub mod serve;
pub mod services;

pub use completions::handle_completions;
pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Augur - resilient multi-provider pipeline orchestrator
#[derive(Parser, Debug)]
#[command(
    name = "augur",
    version,
    about = "Resilient multi-provider AI pipeline orchestrator"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Augur server
    Serve(ServeArgs),
    /// Run a pipeline file once and print the result
    Run(RunArgs),
    /// List configured services
    Services(ServicesArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "augur.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "AUGUR_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "AUGUR_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "AUGUR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Disable health checks
    #[arg(long)]
    pub no_health_check: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pipeline definition (.toml or .json)
    pub pipeline: PathBuf,

    /// Path to configuration file
    #[arg(short, long, default_value = "augur.toml")]
    pub config: PathBuf,

    /// Overall deadline in milliseconds (overrides the file)
    #[arg(short, long)]
    pub deadline_ms: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ServicesArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "augur.toml")]
    pub config: PathBuf,

    /// Run one health probe against every service
    #[arg(long)]
    pub probe: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "augur.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
