pub mod api;
pub mod cli;
pub mod core;
pub mod providers;

use crate::core::{PortfolioCalculator, config::AppConfig};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    /// Run the HTTP endpoint, optionally overriding the configured address
    Serve { bind: Option<String> },
    /// Calculate a request stored in a JSON file
    Calc { request_path: PathBuf },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("growfolio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let provider = Arc::new(providers::YahooFinanceProvider::new(
        &config.providers.yahoo,
    )?);
    let calculator = Arc::new(PortfolioCalculator::new(provider, &config.calculator));

    match command {
        AppCommand::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            cli::serve::run(calculator, &bind).await
        }
        AppCommand::Calc { request_path } => cli::calc::run(&calculator, &request_path).await,
    }
}
