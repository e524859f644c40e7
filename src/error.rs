use reqwest::StatusCode;
use thiserror::Error;

/// Failure while retrieving the market payload from the remote API.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("malformed response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure while reshaping the payload into price rows.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("expected a JSON array of market records, got {found}")]
    NotASequence { found: &'static str },

    #[error("market record {index} is invalid: {source}")]
    Record {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure while writing the snapshot file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Stage-tagged error returned by a pipeline run.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("extraction failed")]
    Extraction(#[from] ExtractionError),

    #[error("transformation failed")]
    Transformation(#[from] TransformError),

    #[error("load failed")]
    Load(#[from] LoadError),

    #[error("a previous run failed; the pipeline does not restart")]
    Halted,
}

impl EtlError {
    /// Prefix used for the ERROR log line of the failing stage.
    pub fn stage_message(&self) -> &'static str {
        match self {
            EtlError::Extraction(_) => "Error in data extraction",
            EtlError::Transformation(_) => "Error in data transformation",
            EtlError::Load(_) => "Error in data loading",
            EtlError::Halted => "ETL process not started",
        }
    }

    /// The stage error underneath the tag.
    pub fn cause(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            EtlError::Extraction(e) => e,
            EtlError::Transformation(e) => e,
            EtlError::Load(e) => e,
            EtlError::Halted => self,
        }
    }
}
