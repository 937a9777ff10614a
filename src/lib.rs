//! candlebot: moving-average crossover trading bot with live and replayed data.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], run loops in [`runner`] and the
//! command line in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod runner;
pub mod cli;
