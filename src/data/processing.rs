use super::ingestion::MarketRecord;
use crate::error::TransformError;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format of the collection timestamp stamped on every row.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
/// One row of the snapshot file.
///
/// Field order is the column order of the CSV output.
///
/// # Fields
/// * `crypto_name`: Asset identifier (`id` in the API payload)
/// * `symbol`: Ticker symbol
/// * `price_usd`: Spot price (`current_price`)
/// * `market_cap_usd`: Market capitalization (`market_cap`)
/// * `volume_usd`: 24h volume (`total_volume`)
/// * `timestamp`: Local collection time, shared by all rows of a run
pub struct PriceRow {
    pub crypto_name: String,
    pub symbol: String,
    pub price_usd: f64,
    pub market_cap_usd: f64,
    pub volume_usd: f64,
    pub timestamp: String,
}

impl PriceRow {
    pub const COLUMNS: [&'static str; 6] = [
        "crypto_name",
        "symbol",
        "price_usd",
        "market_cap_usd",
        "volume_usd",
        "timestamp",
    ];

    fn from_record(record: MarketRecord, timestamp: &str) -> Self {
        Self {
            crypto_name: record.id,
            symbol: record.symbol,
            price_usd: record.current_price,
            market_cap_usd: record.market_cap,
            volume_usd: record.total_volume,
            timestamp: timestamp.to_string(),
        }
    }
}

/// Reshapes the markets payload into price rows stamped with the current local time.
pub fn transform(payload: &Value) -> Result<Vec<PriceRow>, TransformError> {
    transform_at(payload, Local::now().naive_local())
}

/// Reshapes the markets payload into price rows stamped with `collected_at`.
///
/// Rows keep the order of the input records. The timestamp is formatted once
/// and shared by every row.
///
/// # Errors
/// Returns an error if:
/// - The payload is not a JSON array
/// - A record lacks one of `id`, `symbol`, `current_price`, `market_cap`,
///   `total_volume`, or holds a value of the wrong type
pub fn transform_at(
    payload: &Value,
    collected_at: NaiveDateTime,
) -> Result<Vec<PriceRow>, TransformError> {
    let records = payload.as_array().ok_or(TransformError::NotASequence {
        found: json_kind(payload),
    })?;

    let timestamp = collected_at.format(TIMESTAMP_FORMAT).to_string();
    let mut rows = Vec::with_capacity(records.len());

    for (index, raw) in records.iter().enumerate() {
        let record = MarketRecord::deserialize(raw)
            .map_err(|source| TransformError::Record { index, source })?;
        rows.push(PriceRow::from_record(record, &timestamp));
    }

    Ok(rows)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
