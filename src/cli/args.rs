use clap::{Args, Subcommand};

/// Services command arguments
#[derive(Args, Debug)]
pub struct ServicesArgs {
    /// Service to describe
    pub name: Option<String>,
}

/// Models command arguments
#[derive(Args, Debug)]
pub struct ModelsArgs {
    /// Model to describe
    pub name: Option<String>,
}

/// Call command arguments
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Service name, e.g. ProjectService
    pub service: String,

    /// Method name, e.g. list or retrieve
    pub method: String,

    /// Parameter as KEY=VALUE; VALUE is parsed as JSON when it is valid JSON
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// JSON payload passed as the `data` parameter
    #[arg(short, long)]
    pub data: Option<String>,

    /// Walk every page of a paginated result
    #[arg(short, long)]
    pub all: bool,

    /// Do not report request errors through the error sink
    #[arg(long)]
    pub ignore_errors: bool,

    /// Share identical in-flight GET requests
    #[arg(long)]
    pub cache: bool,
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., server.base_url)
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show configuration file path
    Path,

    /// Initialize configuration
    Init,
}
