//! The two market data sources behind one type.

use crate::adapters::binance_adapter::BinanceAdapter;
use crate::adapters::replay_adapter::ReplayAdapter;
use crate::domain::error::CandlebotError;
use crate::domain::history::HistoryRequest;
use crate::domain::market::{Market, MarketFrame};
use crate::domain::symbol::Symbol;
use crate::ports::market_data_port::MarketDataPort;
use async_trait::async_trait;

pub enum Provider {
    Live(BinanceAdapter),
    Replay(ReplayAdapter),
}

impl Provider {
    /// Advance the replay cursor; a no-op for live data.
    pub fn tick(&mut self) {
        if let Provider::Replay(replay) = self {
            replay.tick();
        }
    }

    /// Replay cursor position; `None` for live data.
    pub fn cursor(&self) -> Option<usize> {
        match self {
            Provider::Live(_) => None,
            Provider::Replay(replay) => Some(replay.cursor()),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Provider::Live(_))
    }
}

#[async_trait]
impl MarketDataPort for Provider {
    async fn get_current(
        &self,
        symbols: &[Symbol],
        timeframe_minutes: u32,
    ) -> Result<MarketFrame, CandlebotError> {
        match self {
            Provider::Live(live) => live.get_current(symbols, timeframe_minutes).await,
            Provider::Replay(replay) => replay.get_current(symbols, timeframe_minutes).await,
        }
    }

    async fn get_history(
        &self,
        symbols: &[Symbol],
        request: HistoryRequest,
        timeframe_minutes: u32,
    ) -> Result<Market, CandlebotError> {
        match self {
            Provider::Live(live) => live.get_history(symbols, request, timeframe_minutes).await,
            Provider::Replay(replay) => {
                replay
                    .get_history(symbols, request, timeframe_minutes)
                    .await
            }
        }
    }
}
