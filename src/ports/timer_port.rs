//! Frame timer port: drives a run by producing market frames.

use crate::domain::error::CandlebotError;
use crate::domain::market::MarketFrame;
use crate::ports::market_data_port::MarketDataPort;
use async_trait::async_trait;

/// A forward-only, single-pass sequence of frames.
#[async_trait]
pub trait FrameTimer: Send {
    /// The next frame, or `None` when the sequence is exhausted.
    async fn next_frame(
        &mut self,
        provider: &dyn MarketDataPort,
    ) -> Result<Option<MarketFrame>, CandlebotError>;
}
