//! Deterministic replay of a preloaded market.
//!
//! The cursor only moves on [`ReplayAdapter::tick`]; the wall clock is never
//! consulted, so two runs over the same market produce the same frames.

use crate::domain::error::CandlebotError;
use crate::domain::history::{HistoryRequest, HistorySelection};
use crate::domain::market::{Market, MarketFrame};
use crate::domain::symbol::Symbol;
use crate::domain::timeframe::Timeframe;
use crate::ports::market_data_port::MarketDataPort;
use async_trait::async_trait;
use std::sync::Arc;

pub const DEFAULT_START_INDEX: usize = 100;

#[derive(Debug, Clone)]
pub struct ReplayAdapter {
    market: Arc<Market>,
    cursor: usize,
}

impl ReplayAdapter {
    pub fn new(market: Arc<Market>, start_index: usize) -> Self {
        Self {
            market,
            cursor: start_index,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn tick(&mut self) {
        self.cursor += 1;
    }

    fn current_frame(&self) -> Result<&MarketFrame, CandlebotError> {
        self.market.frame(self.cursor).ok_or_else(|| {
            CandlebotError::data(format!(
                "replay cursor {} past end of market ({} frames)",
                self.cursor,
                self.market.len()
            ))
        })
    }
}

#[async_trait]
impl MarketDataPort for ReplayAdapter {
    async fn get_current(
        &self,
        symbols: &[Symbol],
        timeframe_minutes: u32,
    ) -> Result<MarketFrame, CandlebotError> {
        Timeframe::try_from(timeframe_minutes)?;
        let frame = self.current_frame()?;
        if let Some(missing) = symbols.iter().find(|s| !frame.ohlcv.contains_key(*s)) {
            return Err(CandlebotError::data(format!(
                "no candle for {} at {}",
                missing, frame.timestamp
            )));
        }
        Ok(frame.clone())
    }

    async fn get_history(
        &self,
        _symbols: &[Symbol],
        request: HistoryRequest,
        timeframe_minutes: u32,
    ) -> Result<Market, CandlebotError> {
        Timeframe::try_from(timeframe_minutes)?;
        let count = match request.selection()? {
            HistorySelection::Count(count) => count,
            HistorySelection::Between { .. } => {
                return Err(CandlebotError::HistorySelection {
                    reason: "replay history supports count only".into(),
                });
            }
        };

        // Up to `count` frames strictly before the cursor; fewer near the start.
        let end = self.cursor.min(self.market.len());
        Ok(self.market.slice(end.saturating_sub(count)..end))
    }
}
