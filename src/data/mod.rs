pub mod ingestion;
pub mod processing;
pub mod storage;

pub use ingestion::{CoinGeckoClient, MarketSource};
pub use processing::PriceRow;
