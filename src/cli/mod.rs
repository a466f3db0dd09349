pub mod args;
pub mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::error::GatewayError;

/// Command-line client for science gateway portals
#[derive(Parser, Debug)]
#[command(
    name = "gateway",
    about = "Call the REST services of a science gateway portal from the terminal",
    version,
    author,
    long_about = None
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress the progress spinner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Catalog file or built-in catalog name (overrides server.catalog)
    #[arg(long, global = true, env = "GATEWAY_CATALOG")]
    pub catalog: Option<String>,

    /// Portal URL (overrides server.base_url)
    #[arg(long, global = true, env = "GATEWAY_BASE_URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List services, or the methods of one service
    #[command(alias = "s")]
    Services(args::ServicesArgs),

    /// List models and enums, or the fields of one model
    #[command(alias = "m")]
    Models(args::ModelsArgs),

    /// Call a service method
    #[command(alias = "c")]
    Call(args::CallArgs),

    /// Manage configuration
    Config(args::ConfigArgs),

    /// Show version information
    Version,

    /// Generate shell completion scripts
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Global options every command sees.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub verbose: bool,
    pub quiet: bool,
    pub format: OutputFormat,
    pub catalog: Option<String>,
    pub base_url: Option<String>,
}

impl Cli {
    /// Generate shell completion scripts
    fn generate_completions(shell: Shell) {
        use clap::CommandFactory;
        use clap_complete::generate;
        use std::io;

        let mut cmd = Self::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
    }

    /// Run the CLI application
    pub async fn run() -> crate::error::Result<()> {
        let cli = Self::parse();

        // Set up logging
        let default_filter = if cli.verbose { "debug" } else { "warn" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

        let options = GlobalOptions {
            verbose: cli.verbose,
            quiet: cli.quiet,
            format: cli.format,
            catalog: cli.catalog,
            base_url: cli.base_url,
        };

        let result = match cli.command {
            Commands::Services(args) => commands::services::execute(args, &options).await,
            Commands::Models(args) => commands::models::execute(args, &options).await,
            Commands::Call(args) => commands::call::execute(args, &options).await,
            Commands::Config(args) => commands::config::execute(args).await,
            Commands::Version => {
                commands::version::execute();
                Ok(())
            }
            Commands::Completions { shell } => {
                Self::generate_completions(shell);
                Ok(())
            }
        };

        // Handle errors with better messaging
        if let Err(e) = &result {
            report_error(e, options.verbose);
        }
        result
    }
}

fn report_error(e: &GatewayError, verbose: bool) {
    match e.as_request_error() {
        Some(err) => {
            eprintln!("Error: {}", err.message);
            if let Some(fields) = err.field_errors() {
                for (field, messages) in fields {
                    eprintln!("  {}: {}", field, messages.join(" "));
                }
            }
            if verbose {
                eprintln!("Kind: {:?}", err.kind);
                eprintln!("URL: {}", err.details.url);
                if let Some(status) = err.details.status {
                    eprintln!("Status: {}", status);
                }
            }
        }
        None => eprintln!("Error: {}", e),
    }
    if let Some(hint) = e.hint() {
        eprintln!("\nHint: {}", hint);
    } else if !verbose {
        eprintln!("\nRun with --verbose for more details.");
    }
}
