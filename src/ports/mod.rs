//! Port traits decoupling the domain and engine from data sources,
//! storage, and configuration.

pub mod config_port;
pub mod market_data;
pub mod record_store;

pub use config_port::ConfigPort;
pub use market_data::MarketData;
pub use record_store::RecordStore;
