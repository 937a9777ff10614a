//! Timer that walks a preloaded market one frame per step.

use crate::adapters::replay_adapter::DEFAULT_START_INDEX;
use crate::domain::error::CandlebotError;
use crate::domain::market::{Market, MarketFrame};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::timer_port::FrameTimer;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BacktestTimer {
    market: Arc<Market>,
    index: usize,
}

impl BacktestTimer {
    pub fn new(market: Arc<Market>, start_index: usize) -> Self {
        Self {
            market,
            index: start_index,
        }
    }

    pub fn with_default_start(market: Arc<Market>) -> Self {
        Self::new(market, DEFAULT_START_INDEX)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn tick(&mut self) {
        self.index += 1;
    }
}

#[async_trait]
impl FrameTimer for BacktestTimer {
    async fn next_frame(
        &mut self,
        _provider: &dyn MarketDataPort,
    ) -> Result<Option<MarketFrame>, CandlebotError> {
        Ok(self.market.frame(self.index).cloned())
    }
}
