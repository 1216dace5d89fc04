//! Grounded CLI
//!
//! Operator surface for the knowledge index: status, health, rebuild,
//! refresh, search and query augmentation. The surrounding application
//! (HTTP layer, chat pipeline) consumes the same service interfaces these
//! commands exercise.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    EnhanceCommand, HealthCommand, RebuildCommand, RefreshCommand, SearchCommand, StatusCommand,
};
use grounded_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Grounded - knowledge index lifecycle manager
#[derive(Parser, Debug)]
#[command(name = "grounded")]
#[command(about = "Searchable knowledge index for grounding assistant answers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "GROUNDED_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "GROUNDED_CONFIG")]
    config: Option<PathBuf>,

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
    /// Show service status (initialized, available, index path)
    Status(StatusCommand),

    /// Check durable index artifact health
    Health(HealthCommand),

    /// Force a full index rebuild
    Rebuild(RebuildCommand),

    /// Detect source changes and rebuild if needed
    Refresh(RefreshCommand),

    /// Search the index for similar chunks
    Search(SearchCommand),

    /// Print the augmented prompt for a query
    Enhance(EnhanceCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Grounded CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);

    config.ensure_grounded_dir()?;

    let command_name = match &cli.command {
        Commands::Status(_) => "status",
        Commands::Health(_) => "health",
        Commands::Rebuild(_) => "rebuild",
        Commands::Refresh(_) => "refresh",
        Commands::Search(_) => "search",
        Commands::Enhance(_) => "enhance",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Status(cmd) => cmd.execute(&config).await,
        Commands::Health(cmd) => cmd.execute(&config).await,
        Commands::Rebuild(cmd) => cmd.execute(&config).await,
        Commands::Refresh(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Enhance(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
