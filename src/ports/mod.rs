//! Port traits: the boundaries between domain logic and the outside world.

pub mod chart_port;
pub mod config_port;
pub mod dataset_port;
pub mod market_data_port;
pub mod timer_port;
