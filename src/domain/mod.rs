//! Core domain types and logic.

pub mod symbol;
pub mod ohlcv;
pub mod market;
pub mod output;
pub mod timeframe;
pub mod history;
pub mod rolling_window;
pub mod average;
pub mod strategy;
pub mod summary;
pub mod config_validation;
pub mod error;
