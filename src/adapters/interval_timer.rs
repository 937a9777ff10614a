//! Wall-clock timer for live trading: one pull per timeframe.

use crate::domain::error::CandlebotError;
use crate::domain::market::MarketFrame;
use crate::domain::symbol::Symbol;
use crate::domain::timeframe::Timeframe;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::timer_port::FrameTimer;
use async_trait::async_trait;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

pub struct IntervalTimer {
    symbols: Vec<Symbol>,
    timeframe: Timeframe,
    last_run: Option<Instant>,
}

impl IntervalTimer {
    pub fn new(symbols: Vec<Symbol>, timeframe: Timeframe) -> Self {
        Self {
            symbols,
            timeframe,
            last_run: None,
        }
    }
}

#[async_trait]
impl FrameTimer for IntervalTimer {
    /// First call fetches immediately; later calls wait for the next deadline.
    async fn next_frame(
        &mut self,
        provider: &dyn MarketDataPort,
    ) -> Result<Option<MarketFrame>, CandlebotError> {
        if let Some(last_run) = self.last_run {
            let deadline = last_run + self.timeframe.duration();
            let wait = deadline.saturating_duration_since(Instant::now());
            debug!(wait_ms = wait.as_millis() as u64, "waiting for next candle");
            sleep_until(deadline).await;
        }
        let frame = provider
            .get_current(&self.symbols, self.timeframe.minutes())
            .await?;
        self.last_run = Some(Instant::now());
        Ok(Some(frame))
    }
}
