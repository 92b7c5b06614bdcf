use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use growfolio::core::log::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for growfolio::AppCommand {
    fn from(cmd: Commands) -> growfolio::AppCommand {
        match cmd {
            Commands::Serve { bind } => growfolio::AppCommand::Serve { bind },
            Commands::Calc { request } => growfolio::AppCommand::Calc {
                request_path: request,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Serve the portfolio growth endpoint over HTTP
    Serve {
        /// Address to listen on, overrides the configured one
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Calculate portfolio growth for a request JSON file
    Calc {
        /// Request file with stocks, startDate, endDate and investmentAmount
        request: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => growfolio::cli::setup::setup(),
        Some(cmd) => growfolio::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
