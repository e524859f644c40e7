use crate::config::EtlConfig;
use crate::error::ExtractionError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// A single asset entry of the `/coins/markets` response.
///
/// Only the fields the pipeline keeps are declared; everything else in the
/// payload (images, ATH figures, supply...) is ignored during decoding.
///
/// # Fields
/// * `id`: CoinGecko asset identifier, e.g. `bitcoin`
/// * `symbol`: Ticker symbol, e.g. `btc`
/// * `current_price`: Spot price in the quote currency
/// * `market_cap`: Market capitalization in the quote currency
/// * `total_volume`: 24h traded volume in the quote currency
#[derive(Debug, Deserialize)]
pub struct MarketRecord {
    pub id: String,
    pub symbol: String,
    pub current_price: f64,
    pub market_cap: f64,
    pub total_volume: f64,
}

/// Query string of the markets request.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MarketQuery {
    pub vs_currency: String,
    pub order: String,
    pub per_page: u32,
    pub page: u32,
    pub sparkline: bool,
}

impl MarketQuery {
    pub fn from_config(config: &EtlConfig) -> Self {
        Self {
            vs_currency: config.vs_currency.clone(),
            order: config.order.clone(),
            per_page: config.per_page,
            page: config.page,
            sparkline: config.sparkline,
        }
    }
}

/// Source of the raw markets payload.
///
/// The pipeline only needs one call per run; implementations return the parsed
/// JSON body untouched so the transform step owns all field handling.
#[async_trait]
pub trait MarketSource {
    async fn fetch_markets(&self) -> Result<Value, ExtractionError>;
}

/// Fetches the top assets by market cap from the CoinGecko API.
pub struct CoinGeckoClient {
    markets_url: String,
    query: MarketQuery,
    client: reqwest::Client,
}

impl CoinGeckoClient {
    /// Creates a client for the endpoint and query parameters in `config`.
    ///
    /// A user agent is always sent; the demo API key header is added when
    /// `config.api_key` is set.
    ///
    /// # Errors
    /// Returns an error if the API key is not a valid header value or the HTTP
    /// client cannot be built
    pub fn new(config: &EtlConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("crypto_etl/", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(key) = &config.api_key {
            let mut value = HeaderValue::from_str(key)?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self::with_client(config, client))
    }

    /// Creates a client around an already configured `reqwest::Client`.
    pub fn with_client(config: &EtlConfig, client: reqwest::Client) -> Self {
        Self {
            markets_url: config.markets_url.clone(),
            query: MarketQuery::from_config(config),
            client,
        }
    }
}

#[async_trait]
impl MarketSource for CoinGeckoClient {
    /// Issues one GET to the markets endpoint.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The request cannot be sent or the connection drops
    /// - The server answers with a non-2xx status
    /// - The body is not valid JSON
    async fn fetch_markets(&self) -> Result<Value, ExtractionError> {
        let response = self
            .client
            .get(&self.markets_url)
            .query(&self.query)
            .send()
            .await
            .map_err(|source| ExtractionError::Request {
                url: self.markets_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Status {
                url: self.markets_url.clone(),
                status,
            });
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|source| ExtractionError::Decode {
                url: self.markets_url.clone(),
                source,
            })?;

        tracing::debug!(
            "Received {} market records",
            payload.as_array().map_or(0, Vec::len)
        );

        Ok(payload)
    }
}
