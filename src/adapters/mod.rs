//! Concrete adapter implementations for ports.

pub mod csv_market_data;
pub mod ini_config;
pub mod json_record_store;
pub mod retry;
#[cfg(feature = "sqlite")]
pub mod sqlite_market_data;

pub use csv_market_data::CsvMarketData;
pub use ini_config::IniConfig;
pub use json_record_store::JsonRecordStore;
pub use retry::RetryingMarketData;
#[cfg(feature = "sqlite")]
pub use sqlite_market_data::SqliteMarketData;
