use crate::config::EtlConfig;
use crate::data::{processing, storage, MarketSource, PriceRow};
use crate::error::EtlError;
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Progress of a single pipeline run.
///
/// A run moves strictly forward through the stages; any failure is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Extracting,
    Transforming,
    Loading,
    Done,
    Failed,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rows: usize,
    pub output: PathBuf,
    pub elapsed: Duration,
}

/// Runs extract, transform and load once, in sequence.
///
/// Each stage returns an explicit result. On failure the stage's error is
/// logged once at ERROR level and returned unchanged; later stages never
/// start, so a failed extraction or transformation leaves the previous
/// snapshot untouched.
pub struct Pipeline<S> {
    config: EtlConfig,
    source: S,
    state: RunState,
}

impl<S: MarketSource> Pipeline<S> {
    /// Creates an idle pipeline that writes to `config.output_path()`.
    ///
    /// # Arguments
    /// * `config` - Paths and request parameters of the run
    /// * `source` - Where the markets payload is fetched from
    pub fn new(config: EtlConfig, source: S) -> Self {
        Self {
            config,
            source,
            state: RunState::Idle,
        }
    }

    /// Current stage of the run, `Failed` once any stage has failed.
    pub fn state(&self) -> RunState {
        self.state
    }

    fn enter(&mut self, state: RunState) {
        debug!("ETL state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Logs and records a stage failure, then hands the error back.
    fn fail(&mut self, err: EtlError) -> EtlError {
        error!("{}: {}", err.stage_message(), err.cause());
        self.enter(RunState::Failed);
        err
    }

    async fn extract(&mut self) -> Result<Value, EtlError> {
        self.enter(RunState::Extracting);
        let fetched = self.source.fetch_markets().await;
        match fetched {
            Ok(payload) => {
                info!("Data extraction successful.");
                Ok(payload)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn transform(&mut self, payload: &Value) -> Result<Vec<PriceRow>, EtlError> {
        self.enter(RunState::Transforming);
        match processing::transform(payload) {
            Ok(rows) => {
                info!("Data transformation successful.");
                Ok(rows)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn load(&mut self, rows: &[PriceRow]) -> Result<PathBuf, EtlError> {
        self.enter(RunState::Loading);
        let output = self.config.output_path();
        match storage::write_snapshot(&output, rows) {
            Ok(()) => {
                info!(
                    "Data loading successful. Data saved to {}",
                    output.display()
                );
                println!("Data successfully saved to {}", output.display());
                Ok(output)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Performs one full extract-transform-load cycle.
    ///
    /// # Errors
    /// Returns the first stage error encountered; the run is then in
    /// [`RunState::Failed`], which is terminal: later calls return
    /// [`EtlError::Halted`] without running any stage
    pub async fn run(&mut self) -> Result<RunSummary, EtlError> {
        if self.state == RunState::Failed {
            let err = EtlError::Halted;
            error!("{}: {}", err.stage_message(), err);
            return Err(err);
        }

        let started = Instant::now();
        self.enter(RunState::Idle);
        info!("ETL process started.");

        let payload = self.extract().await?;
        let rows = self.transform(&payload)?;
        let output = self.load(&rows)?;

        self.enter(RunState::Done);
        let elapsed = started.elapsed();
        info!(
            "ETL process completed in {:.2} seconds.",
            elapsed.as_secs_f64()
        );

        Ok(RunSummary {
            rows: rows.len(),
            output,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::storage::read_snapshot;
    use crate::error::{ExtractionError, TransformError};
    use crate::logging::file_subscriber;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::Level;

    enum StubSource {
        Payload(Value),
        ServerError,
    }

    #[async_trait]
    impl MarketSource for StubSource {
        async fn fetch_markets(&self) -> Result<Value, ExtractionError> {
            match self {
                StubSource::Payload(payload) => Ok(payload.clone()),
                StubSource::ServerError => Err(ExtractionError::Status {
                    url: "http://localhost/api/v3/coins/markets".to_string(),
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                }),
            }
        }
    }

    struct CountingSource {
        calls: AtomicUsize,
        payload: Value,
    }

    #[async_trait]
    impl MarketSource for CountingSource {
        async fn fetch_markets(&self) -> Result<Value, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    fn bitcoin_payload() -> Value {
        json!([{
            "id": "bitcoin",
            "symbol": "btc",
            "current_price": 65000,
            "market_cap": 1.2e12,
            "total_volume": 3e10,
            "circulating_supply": 19_600_000.0
        }])
    }

    fn temp_config(tmp: &tempfile::TempDir) -> EtlConfig {
        let config = EtlConfig {
            base_dir: tmp.path().to_path_buf(),
            ..EtlConfig::default()
        };
        config.prepare_dirs().unwrap();
        config
    }

    fn log_lines(config: &EtlConfig, level: &str) -> Vec<String> {
        let marker = format!(" - {} - ", level);
        fs::read_to_string(config.log_path())
            .unwrap_or_default()
            .lines()
            .filter(|line| line.contains(&marker))
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_successful_run_writes_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let config = temp_config(&tmp);
        let _guard = tracing::subscriber::set_default(
            file_subscriber(&config.log_path(), Level::INFO).unwrap(),
        );

        let mut pipeline = Pipeline::new(config.clone(), StubSource::Payload(bitcoin_payload()));
        let summary = pipeline.run().await.unwrap();

        assert_eq!(pipeline.state(), RunState::Done);
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.output, config.output_path());

        let contents = fs::read_to_string(config.output_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "crypto_name,symbol,price_usd,market_cap_usd,volume_usd,timestamp"
        );
        assert!(lines[1].starts_with("bitcoin,btc,65000.0,1200000000000.0,30000000000.0,"));

        let info = log_lines(&config, "INFO");
        assert!(info[0].ends_with("ETL process started."));
        assert!(info.iter().any(|l| l.ends_with("Data extraction successful.")));
        assert!(info.iter().any(|l| l.ends_with("Data transformation successful.")));
        assert!(info.iter().any(|l| l.contains("Data loading successful. Data saved to")));
        assert!(info.last().unwrap().contains("ETL process completed in"));
        assert!(log_lines(&config, "ERROR").is_empty());
    }

    #[tokio::test]
    async fn test_server_error_aborts_and_keeps_previous_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let config = temp_config(&tmp);
        fs::write(config.output_path(), "previous snapshot\n").unwrap();
        let _guard = tracing::subscriber::set_default(
            file_subscriber(&config.log_path(), Level::INFO).unwrap(),
        );

        let mut pipeline = Pipeline::new(config.clone(), StubSource::ServerError);
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, EtlError::Extraction(ExtractionError::Status { .. })));
        assert_eq!(pipeline.state(), RunState::Failed);
        assert_eq!(
            fs::read_to_string(config.output_path()).unwrap(),
            "previous snapshot\n"
        );

        let errors = log_lines(&config, "ERROR");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Error in data extraction:"));
        assert!(errors[0].contains("500"));
    }

    #[tokio::test]
    async fn test_missing_field_never_reaches_writer() {
        let tmp = tempfile::tempdir().unwrap();
        let config = temp_config(&tmp);
        let _guard = tracing::subscriber::set_default(
            file_subscriber(&config.log_path(), Level::INFO).unwrap(),
        );
        let payload = json!([{
            "id": "bitcoin",
            "symbol": "btc",
            "current_price": 65000,
            "market_cap": 1.2e12
        }]);

        let mut pipeline = Pipeline::new(config.clone(), StubSource::Payload(payload));
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(
            err,
            EtlError::Transformation(TransformError::Record { index: 0, .. })
        ));
        assert_eq!(pipeline.state(), RunState::Failed);
        assert!(!config.output_path().exists());

        let errors = log_lines(&config, "ERROR");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Error in data transformation:"));
        assert!(!fs::read_to_string(config.log_path())
            .unwrap()
            .contains("Data loading"));
    }

    #[tokio::test]
    async fn test_unwritable_destination_is_load_failure() {
        let tmp = tempfile::tempdir().unwrap();
        // data/ is never created, logs/ is
        let config = EtlConfig {
            base_dir: tmp.path().to_path_buf(),
            ..EtlConfig::default()
        };
        fs::create_dir_all(config.logs_dir()).unwrap();
        let _guard = tracing::subscriber::set_default(
            file_subscriber(&config.log_path(), Level::INFO).unwrap(),
        );

        let mut pipeline = Pipeline::new(config.clone(), StubSource::Payload(bitcoin_payload()));
        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, EtlError::Load(_)));
        assert_eq!(err.stage_message(), "Error in data loading");
        assert_eq!(pipeline.state(), RunState::Failed);
        assert!(!config.output_path().exists());

        let errors = log_lines(&config, "ERROR");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Error in data loading:"));
        assert!(!fs::read_to_string(config.log_path())
            .unwrap()
            .contains("ETL process completed"));
    }

    #[tokio::test]
    async fn test_failed_pipeline_does_not_run_again() {
        let tmp = tempfile::tempdir().unwrap();
        let config = temp_config(&tmp);
        let _guard = tracing::subscriber::set_default(
            file_subscriber(&config.log_path(), Level::INFO).unwrap(),
        );
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            payload: json!([{"id": "bitcoin", "symbol": "btc"}]),
        };

        let mut pipeline = Pipeline::new(config.clone(), source);
        let first = pipeline.run().await.unwrap_err();
        assert!(matches!(first, EtlError::Transformation(_)));

        let second = pipeline.run().await.unwrap_err();
        assert!(matches!(second, EtlError::Halted));
        assert_eq!(pipeline.state(), RunState::Failed);
        assert_eq!(pipeline.source.calls.load(Ordering::SeqCst), 1);

        let started = log_lines(&config, "INFO")
            .iter()
            .filter(|line| line.ends_with("ETL process started."))
            .count();
        assert_eq!(started, 1);
        let errors = log_lines(&config, "ERROR");
        assert_eq!(errors.len(), 2);
        assert!(errors[1].contains("ETL process not started:"));
    }

    #[tokio::test]
    async fn test_each_run_fetches_once_and_replaces_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let config = temp_config(&tmp);
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            payload: bitcoin_payload(),
        };

        let mut pipeline = Pipeline::new(config.clone(), source);
        pipeline.run().await.unwrap();
        pipeline.run().await.unwrap();

        assert_eq!(pipeline.source.calls.load(Ordering::SeqCst), 2);
        let rows = read_snapshot(&config.output_path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].crypto_name, "bitcoin");
    }
}
