//! Manifold CLI
//!
//! Main entry point for the manifold command-line tool.
//! Compiles prompt source trees into manifests and renders manifests
//! against demo datasets.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CompileCommand, DemoRunCommand};
use manifold_core::{config::AppConfig, logging, AppResult};

/// Manifold - prompt template compiler and runtime registry
#[derive(Parser, Debug)]
#[command(name = "manifold")]
#[command(about = "Compile prompt templates into content-addressed manifests", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile prompts to a manifest
    Compile(CompileCommand),

    /// Render a manifest with demo data to validate prompt outputs
    DemoRun(DemoRunCommand),
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(None, None, cli.log_level, cli.verbose, cli.no_color);

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::debug!("Manifold CLI starting");

    let command_name = match &cli.command {
        Commands::Compile(_) => "compile",
        Commands::DemoRun(_) => "demo-run",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Compile(cmd) => cmd.execute(&config),
        Commands::DemoRun(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::debug!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
