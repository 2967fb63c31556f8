//! stockscan: strategy scanning engine with backtest evaluation.
//!
//! Hexagonal architecture: market/indicator/strategy logic in [`domain`],
//! port traits in [`ports`], concrete implementations in [`adapters`]. The
//! concurrent run machinery lives in [`engine`]; [`service`] ties catalog,
//! engine, provider, and record store together behind the operations the
//! CLI exposes.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ports;
pub mod service;
