//! Market data source port.

use crate::domain::error::CandlebotError;
use crate::domain::history::HistoryRequest;
use crate::domain::market::{Market, MarketFrame};
use crate::domain::symbol::Symbol;
use async_trait::async_trait;

/// A source of candles for a set of symbols.
///
/// Implementations reject an unsupported `timeframe_minutes` with
/// [`CandlebotError::UnsupportedTimeframe`] before touching the network or
/// any replay state.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// The latest candle for every symbol, exactly one each.
    async fn get_current(
        &self,
        symbols: &[Symbol],
        timeframe_minutes: u32,
    ) -> Result<MarketFrame, CandlebotError>;

    /// Historical frames, oldest first, excluding the current candle.
    async fn get_history(
        &self,
        symbols: &[Symbol],
        request: HistoryRequest,
        timeframe_minutes: u32,
    ) -> Result<Market, CandlebotError>;
}
