//! Concrete adapter implementations for ports.

pub mod backtest_timer;
pub mod binance_adapter;
pub mod csv_dataset_adapter;
pub mod file_config_adapter;
pub mod interval_timer;
pub mod provider;
pub mod replay_adapter;
pub mod svg_chart_adapter;
