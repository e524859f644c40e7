mod config;
mod data;
mod error;
mod logging;
mod pipeline;

use config::EtlConfig;
use data::CoinGeckoClient;
use dotenv::dotenv;
use pipeline::Pipeline;

/// Entry point of the crypto price ETL job.
///
/// Runs a single extract-transform-load cycle:
/// 1. Load environment overrides from a `.env` file, if present
/// 2. Create the `data/` and `logs/` folders
/// 3. Install the log file subscriber
/// 4. Fetch the top 10 assets by market cap, reshape them and write
///    `data/crypto_data.csv`
///
/// # Returns
/// Returns `Ok(())` when the snapshot was written, otherwise the stage error
/// that aborted the run
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = EtlConfig::from_env()?;
    config.prepare_dirs()?;
    logging::init(&config.log_path(), config.log_level)?;

    let source = CoinGeckoClient::new(&config)?;
    let mut pipeline = Pipeline::new(config, source);
    let summary = pipeline.run().await?;

    tracing::debug!(
        "Wrote {} rows to {} in {:?}",
        summary.rows,
        summary.output.display(),
        summary.elapsed
    );

    Ok(())
}
