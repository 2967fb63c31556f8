//! Core domain types and logic.

pub mod backtest;
pub mod direction;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod kline;
pub mod stock;
pub mod strategy;
pub mod universe;
