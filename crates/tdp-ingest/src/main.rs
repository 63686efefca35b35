//! TDP Ingest - Transaction data ingestion tool

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tdp_common::logging::{init_logging, LogConfig, LogLevel};
use tdp_ingest::{IngestConfig, IngestPipeline, StatsReporter};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tdp-ingest")]
#[command(author, version, about = "TDP transaction data ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Load a transaction CSV export into the destination table
    Load {
        /// Path to the CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Display name for the dataset (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Report post-load statistics for the latest completed run
    Stats {
        /// Minimum per-category transaction count for the fraud-rate
        /// breakdown
        #[arg(long)]
        min_count: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging: environment configuration first, explicit CLI flag wins
    let mut log_config = LogConfig::from_env()?;
    log_config.log_file_prefix = "tdp-ingest".to_string();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }

    let _log_guard = init_logging(&log_config)?;

    let config = IngestConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(&config.database.url)
        .await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;

    match cli.command {
        Command::Load { file, name } => {
            let name = name.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "dataset".to_string())
            });

            let pipeline = IngestPipeline::new(config, pool);
            let report = pipeline.run(&file, &name).await?;

            info!(
                dataset_id = %report.dataset_id,
                total_rows = report.total_rows,
                batches = report.batches_flushed,
                "load finished"
            );
            info!(report = %serde_json::to_string_pretty(&report.stats)?, "dataset report");
        },
        Command::Stats { min_count } => {
            let min_count = min_count.unwrap_or(config.min_category_count);
            let report = StatsReporter::new(pool).report_latest(min_count).await?;

            info!(report = %serde_json::to_string_pretty(&report)?, "dataset report");
        },
    }

    Ok(())
}
