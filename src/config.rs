use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::Level;

pub const DEFAULT_MARKETS_URL: &str = "https://api.coingecko.com/api/v3/coins/markets";
const DATA_DIR: &str = "data";
const LOGS_DIR: &str = "logs";
const OUTPUT_FILE: &str = "crypto_data.csv";
const LOG_FILE: &str = "crypto_etl.log";

/// Settings for one ETL run.
///
/// The defaults are the fixed parameters of the pipeline: the CoinGecko markets
/// endpoint, the top 10 assets in USD ordered by market cap, and the `data/` and
/// `logs/` folders under the current directory.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub markets_url: String,
    pub vs_currency: String,
    pub order: String,
    pub per_page: u32,
    pub page: u32,
    pub sparkline: bool,
    /// Optional CoinGecko demo API key.
    pub api_key: Option<String>,
    pub base_dir: PathBuf,
    pub log_level: Level,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            markets_url: DEFAULT_MARKETS_URL.to_string(),
            vs_currency: "usd".to_string(),
            order: "market_cap_desc".to_string(),
            per_page: 10,
            page: 1,
            sparkline: false,
            api_key: None,
            base_dir: PathBuf::from("."),
            log_level: Level::INFO,
        }
    }
}

impl EtlConfig {
    /// Builds the configuration from the defaults plus optional environment overrides.
    ///
    /// Only `COINGECKO_API_KEY` and `CRYPTO_ETL_LOG_LEVEL` are read. The endpoint,
    /// query and paths are fixed and cannot be moved from the environment. Unset or
    /// empty variables keep the default.
    ///
    /// # Errors
    /// Returns an error if `CRYPTO_ETL_LOG_LEVEL` is not a valid tracing level
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self {
            api_key: get("COINGECKO_API_KEY"),
            ..Self::default()
        };

        if let Some(level) = get("CRYPTO_ETL_LOG_LEVEL") {
            config.log_level = level
                .trim()
                .parse()
                .with_context(|| format!("Invalid CRYPTO_ETL_LOG_LEVEL: {}", level))?;
        }

        Ok(config)
    }

    /// Folder holding the CSV snapshot.
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join(DATA_DIR)
    }

    /// Folder holding the log file.
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join(LOGS_DIR)
    }

    /// Destination of the CSV snapshot.
    pub fn output_path(&self) -> PathBuf {
        self.data_dir().join(OUTPUT_FILE)
    }

    /// Append-only log file shared by every run.
    pub fn log_path(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE)
    }

    /// Creates the data and logs folders if they don't exist.
    pub fn prepare_dirs(&self) -> Result<()> {
        for dir in [self.data_dir(), self.logs_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}
