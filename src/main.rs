mod api;
mod cli;
mod config;
mod db;
mod models;
mod services;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;

#[derive(Parser)]
#[command(name = "plpredict")]
#[command(about = "Premier League match outcome predictions from rolling team form")]
struct Cli {
    /// Match CSV (overrides MATCHES_CSV)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// First date predicted rather than trained on, YYYY-MM-DD (overrides TRAIN_CUTOFF)
    #[arg(long, global = true)]
    cutoff: Option<NaiveDate>,

    /// Rolling window in matches (overrides ROLLING_WINDOW)
    #[arg(long, global = true)]
    window: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "5050")]
        port: u16,
    },
    /// List upcoming fixtures
    Fixtures {
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "10")]
        page_size: usize,
    },
    /// Predict one fixture, or every upcoming fixture
    Predict {
        #[arg(short, long)]
        id: Option<String>,
    },
    /// Score predictions against known results after the cutoff
    Backtest {
        /// Write per-fixture predictions to this CSV file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
    /// Show form and upcoming fixtures for a team
    Team {
        #[arg(short, long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env()?;
    if let Some(data) = cli.data {
        config.data_path = data;
    }
    if let Some(cutoff) = cli.cutoff {
        config.cutoff = cutoff;
    }
    if let Some(window) = cli.window {
        anyhow::ensure!(window > 0, "--window must be at least 1");
        config.window = window;
    }

    match cli.command {
        Some(Commands::Serve { port }) => {
            tracing::info!("Starting predictor API server on port {}", port);
            api::serve(port, config).await?;
        }
        Some(Commands::Fixtures { page, page_size }) => {
            cli::list_fixtures(&config, page, page_size)?;
        }
        Some(Commands::Predict { id }) => {
            tracing::info!("Generating predictions...");
            cli::predict(&config, id.as_deref())?;
        }
        Some(Commands::Backtest { export }) => {
            tracing::info!("Running backtest with cutoff {}", config.cutoff);
            cli::backtest(&config, export.as_deref())?;
        }
        Some(Commands::Team { name }) => {
            tracing::info!("Querying team: {}", name);
            cli::query_team(&config, &name)?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting predictor API server on port 5050");
            api::serve(5050, config).await?;
        }
    }

    Ok(())
}
