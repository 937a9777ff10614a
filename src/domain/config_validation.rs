//! Configuration validation.
//!
//! Validates every strategy and market setting before a run starts, then
//! resolves them into a [`CrossoverConfig`].

use crate::domain::error::CandlebotError;
use crate::domain::strategy::{
    CrossoverConfig, DEFAULT_FMA_WINDOW, DEFAULT_JITTER, DEFAULT_SMA_WINDOW,
    DEFAULT_TIMEFRAME_MINUTES, DEFAULT_TRANSACTION_COST,
};
use crate::domain::symbol::{Symbol, parse_symbols};
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), CandlebotError> {
    validate_symbols(config)?;
    validate_windows(config)?;
    validate_fraction(config, "jitter", DEFAULT_JITTER)?;
    validate_fraction(config, "transaction_cost", DEFAULT_TRANSACTION_COST)?;
    validate_timeframe(config)?;
    Ok(())
}

/// Validate, then resolve the strategy settings with defaults applied.
pub fn build_crossover_config(config: &dyn ConfigPort) -> Result<CrossoverConfig, CandlebotError> {
    validate_config(config)?;
    let mut resolved = CrossoverConfig::new(validate_symbols(config)?);
    resolved.sma_window = config.get_int("strategy", "sma_window", DEFAULT_SMA_WINDOW as i64) as usize;
    resolved.fma_window = config.get_int("strategy", "fma_window", DEFAULT_FMA_WINDOW as i64) as usize;
    resolved.jitter = config.get_double("strategy", "jitter", DEFAULT_JITTER);
    resolved.transaction_cost =
        config.get_double("strategy", "transaction_cost", DEFAULT_TRANSACTION_COST);
    resolved.timeframe_minutes = config.get_int(
        "market",
        "timeframe_minutes",
        DEFAULT_TIMEFRAME_MINUTES as i64,
    ) as u32;
    Ok(resolved)
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> CandlebotError {
    CandlebotError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// A present but unparseable number is an error rather than a silent default.
fn checked_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, CandlebotError> {
    match config.get_string(section, key) {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(section, key, format!("{:?} is not an integer", raw))),
        None => Ok(default),
    }
}

fn checked_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, CandlebotError> {
    match config.get_string(section, key) {
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(section, key, format!("{:?} is not a number", raw))),
        None => Ok(default),
    }
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<Vec<Symbol>, CandlebotError> {
    let raw = config
        .get_string("strategy", "symbols")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| CandlebotError::ConfigMissing {
            section: "strategy".to_string(),
            key: "symbols".to_string(),
        })?;
    parse_symbols(&raw).map_err(|e| invalid("strategy", "symbols", e.to_string()))
}

fn validate_windows(config: &dyn ConfigPort) -> Result<(), CandlebotError> {
    let sma = checked_int(config, "strategy", "sma_window", DEFAULT_SMA_WINDOW as i64)?;
    let fma = checked_int(config, "strategy", "fma_window", DEFAULT_FMA_WINDOW as i64)?;
    if sma < 1 {
        return Err(invalid("strategy", "sma_window", "sma_window must be at least 1"));
    }
    if fma < 1 {
        return Err(invalid("strategy", "fma_window", "fma_window must be at least 1"));
    }
    if fma > sma {
        return Err(invalid(
            "strategy",
            "fma_window",
            "fma_window must not exceed sma_window",
        ));
    }
    Ok(())
}

fn validate_fraction(config: &dyn ConfigPort, key: &str, default: f64) -> Result<(), CandlebotError> {
    let value = checked_double(config, "strategy", key, default)?;
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "strategy",
            key,
            format!("{} must be between 0 and 1", key),
        ));
    }
    Ok(())
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), CandlebotError> {
    let minutes = checked_int(
        config,
        "market",
        "timeframe_minutes",
        DEFAULT_TIMEFRAME_MINUTES as i64,
    )?;
    let minutes = u32::try_from(minutes)
        .map_err(|_| invalid("market", "timeframe_minutes", "must be positive"))?;
    Timeframe::try_from(minutes)?;
    Ok(())
}
