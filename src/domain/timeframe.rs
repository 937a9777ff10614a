//! Supported candle timeframes.

use crate::domain::error::CandlebotError;
use std::time::Duration;

/// `(minutes, exchange interval)` pairs accepted by the providers.
pub const SUPPORTED_TIMEFRAMES: [(u32, &str); 11] = [
    (1, "1m"),
    (3, "3m"),
    (5, "5m"),
    (15, "15m"),
    (30, "30m"),
    (60, "1h"),
    (120, "2h"),
    (240, "4h"),
    (360, "6h"),
    (480, "8h"),
    (720, "12h"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeframe(u32);

impl Timeframe {
    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn seconds(&self) -> i64 {
        self.0 as i64 * 60
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.0 as u64 * 60)
    }

    pub fn interval(&self) -> &'static str {
        SUPPORTED_TIMEFRAMES
            .iter()
            .find(|(m, _)| *m == self.0)
            .map(|(_, s)| *s)
            .unwrap_or("1m")
    }
}

impl TryFrom<u32> for Timeframe {
    type Error = CandlebotError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        if SUPPORTED_TIMEFRAMES.iter().any(|(m, _)| *m == minutes) {
            Ok(Timeframe(minutes))
        } else {
            Err(CandlebotError::UnsupportedTimeframe { minutes })
        }
    }
}
