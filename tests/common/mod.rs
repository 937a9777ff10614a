#![allow(dead_code)]

use async_trait::async_trait;
use candlebot::domain::error::CandlebotError;
use candlebot::domain::history::{HistoryRequest, HistorySelection};
use candlebot::domain::market::{Market, MarketFrame};
pub use candlebot::domain::ohlcv::Ohlcv;
use candlebot::domain::strategy::CrossoverConfig;
pub use candlebot::domain::symbol::Symbol;
use candlebot::ports::market_data_port::MarketDataPort;
use std::io::Write;
use std::sync::Mutex;

/// Provider serving a fixed market: `get_current` returns the last frame,
/// `get_history` the newest `count` frames. Every history request is recorded.
pub struct MockMarketDataPort {
    pub market: Market,
    pub history_requests: Mutex<Vec<usize>>,
    pub error: Option<String>,
}

impl MockMarketDataPort {
    pub fn new(market: Market) -> Self {
        Self {
            market,
            history_requests: Mutex::new(Vec::new()),
            error: None,
        }
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    pub fn history_calls(&self) -> usize {
        self.history_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl MarketDataPort for MockMarketDataPort {
    async fn get_current(
        &self,
        _symbols: &[Symbol],
        _timeframe_minutes: u32,
    ) -> Result<MarketFrame, CandlebotError> {
        if let Some(reason) = &self.error {
            return Err(CandlebotError::data(reason.clone()));
        }
        self.market
            .frame(self.market.len().saturating_sub(1))
            .cloned()
            .ok_or_else(|| CandlebotError::data("empty market"))
    }

    async fn get_history(
        &self,
        _symbols: &[Symbol],
        request: HistoryRequest,
        _timeframe_minutes: u32,
    ) -> Result<Market, CandlebotError> {
        if let Some(reason) = &self.error {
            return Err(CandlebotError::data(reason.clone()));
        }
        let count = match request.selection()? {
            HistorySelection::Count(count) => count,
            HistorySelection::Between { .. } => {
                return Err(CandlebotError::HistorySelection {
                    reason: "mock supports count only".into(),
                });
            }
        };
        self.history_requests.lock().unwrap().push(count);
        Ok(self.market.tail(count))
    }
}

pub fn btc() -> Symbol {
    Symbol::pair("BTC", "USDT")
}

pub fn eth() -> Symbol {
    Symbol::pair("ETH", "USDT")
}

pub fn candle(close: f64) -> Ohlcv {
    Ohlcv {
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
    }
}

pub fn frame(timestamp: i64, candles: &[(Symbol, f64)]) -> MarketFrame {
    candles
        .iter()
        .fold(MarketFrame::new(timestamp), |f, (s, c)| f.with(s.clone(), candle(*c)))
}

/// One frame per close, 60 seconds apart, starting at t=0.
pub fn market_from_closes(symbol: &Symbol, closes: &[f64]) -> Market {
    closes
        .iter()
        .enumerate()
        .map(|(i, c)| frame(i as i64 * 60, &[(symbol.clone(), *c)]))
        .collect()
}

/// sma 5, fma 3, no band: the smallest setup that trades on a short series.
pub fn small_config(symbols: Vec<Symbol>) -> CrossoverConfig {
    let mut config = CrossoverConfig::new(symbols);
    config.sma_window = 5;
    config.fma_window = 3;
    config.jitter = 0.0;
    config.transaction_cost = 0.0;
    config
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
