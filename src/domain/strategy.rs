//! Moving-average crossover strategy.
//!
//! Per symbol and per tick:
//!   FMA = trailing_mean(closes, fma_window)
//!   SMA = trailing_mean(closes, sma_window)
//!   band = 1 + transaction_cost + jitter
//!   BUY  when FMA > SMA * band and not holding
//!   SELL when SMA > FMA * band and holding
//!
//! `closes` is the rolling history for the symbol followed by the current
//! frame's close.

use crate::domain::average::trailing_mean;
use crate::domain::error::CandlebotError;
use crate::domain::history::HistoryRequest;
use crate::domain::market::MarketFrame;
use crate::domain::output::{FunctionPlot, Operation, OutputFrame, PlotColor, Transaction};
use crate::domain::rolling_window::RollingWindow;
use crate::domain::symbol::Symbol;
use crate::domain::timeframe::Timeframe;
use crate::ports::market_data_port::MarketDataPort;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_SMA_WINDOW: usize = 50;
pub const DEFAULT_FMA_WINDOW: usize = 10;
pub const DEFAULT_TIMEFRAME_MINUTES: u32 = 1;
pub const DEFAULT_JITTER: f64 = 0.001;
pub const DEFAULT_TRANSACTION_COST: f64 = 0.00075;

#[derive(Debug, Clone, PartialEq)]
pub struct CrossoverConfig {
    pub symbols: Vec<Symbol>,
    pub sma_window: usize,
    pub fma_window: usize,
    pub timeframe_minutes: u32,
    pub jitter: f64,
    pub transaction_cost: f64,
}

impl CrossoverConfig {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            sma_window: DEFAULT_SMA_WINDOW,
            fma_window: DEFAULT_FMA_WINDOW,
            timeframe_minutes: DEFAULT_TIMEFRAME_MINUTES,
            jitter: DEFAULT_JITTER,
            transaction_cost: DEFAULT_TRANSACTION_COST,
        }
    }

    /// Multiplier applied to the opposite average to form a trigger threshold.
    pub fn band(&self) -> f64 {
        1.0 + self.transaction_cost + self.jitter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Holding {
    #[default]
    NotHolding,
    Holding,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Averages {
    pub fma: f64,
    pub sma: f64,
}

/// One step of the per-symbol state machine. At most one trade per call.
pub fn decide(holding: Holding, averages: Averages, band: f64) -> (Option<Operation>, Holding) {
    let buy_threshold = averages.sma * band;
    let sell_threshold = averages.fma * band;

    if averages.fma > buy_threshold && holding == Holding::NotHolding {
        (Some(Operation::Buy), Holding::Holding)
    } else if averages.sma > sell_threshold && holding == Holding::Holding {
        (Some(Operation::Sell), Holding::NotHolding)
    } else {
        (None, holding)
    }
}

pub struct CrossoverStrategy {
    config: CrossoverConfig,
    history: RollingWindow<MarketFrame>,
    holdings: HashMap<Symbol, Holding>,
}

impl CrossoverStrategy {
    pub fn new(config: CrossoverConfig) -> Result<Self, CandlebotError> {
        for (key, value) in [
            ("sma_window", config.sma_window),
            ("fma_window", config.fma_window),
        ] {
            if value == 0 {
                return Err(CandlebotError::ConfigInvalid {
                    section: "strategy".into(),
                    key: key.into(),
                    reason: format!("{key} must be at least 1"),
                });
            }
        }
        Timeframe::try_from(config.timeframe_minutes)?;

        Ok(Self {
            history: RollingWindow::new(config.sma_window),
            holdings: HashMap::new(),
            config,
        })
    }

    pub fn config(&self) -> &CrossoverConfig {
        &self.config
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn holding(&self, symbol: &Symbol) -> Holding {
        self.holdings.get(symbol).copied().unwrap_or_default()
    }

    /// Process one tick and return everything it produced.
    pub async fn execute(
        &mut self,
        provider: &dyn MarketDataPort,
        frame: &MarketFrame,
    ) -> Result<OutputFrame, CandlebotError> {
        if self.history.len() < self.config.sma_window {
            debug!(
                have = self.history.len(),
                need = self.config.sma_window,
                "refilling history window"
            );
            let warmup = provider
                .get_history(
                    &self.config.symbols,
                    HistoryRequest::count(self.config.sma_window),
                    self.config.timeframe_minutes,
                )
                .await?;
            self.history.replace(warmup.into_frames());
        }

        let band = self.config.band();
        let mut output = OutputFrame::new(frame.timestamp);

        for symbol in &self.config.symbols {
            let close = frame.get(symbol)?.close;
            let averages = self.averages(symbol, close)?;
            debug!(%symbol, fma = averages.fma, sma = averages.sma, "averages");

            output.function_plots.push(FunctionPlot {
                timestamp: frame.timestamp,
                label: format!("{} FMA", symbol),
                value: averages.fma,
                color: PlotColor::Blue,
                symbol: Some(symbol.clone()),
            });
            output.function_plots.push(FunctionPlot {
                timestamp: frame.timestamp,
                label: format!("{} SMA", symbol),
                value: averages.sma,
                color: PlotColor::Purple,
                symbol: Some(symbol.clone()),
            });

            let current = self.holdings.get(symbol).copied().unwrap_or_default();
            let (operation, next) = decide(current, averages, band);
            self.holdings.insert(symbol.clone(), next);

            if let Some(operation) = operation {
                let notes = match operation {
                    Operation::Buy => format!(
                        "fma {:.6} > buy threshold {:.6}",
                        averages.fma,
                        averages.sma * band
                    ),
                    Operation::Sell => format!(
                        "sma {:.6} > sell threshold {:.6}",
                        averages.sma,
                        averages.fma * band
                    ),
                    Operation::Skip => format!(
                        "fma {:.6} sma {:.6} within band",
                        averages.fma, averages.sma
                    ),
                };
                output.transactions.push(Transaction::new(
                    frame.timestamp,
                    operation,
                    symbol.clone(),
                    Some(notes),
                ));
            }
        }

        self.history.push(frame.clone());
        Ok(output)
    }

    fn averages(&self, symbol: &Symbol, current_close: f64) -> Result<Averages, CandlebotError> {
        let mut closes = Vec::with_capacity(self.history.len() + 1);
        for past in self.history.iter() {
            closes.push(past.get(symbol)?.close);
        }
        closes.push(current_close);

        // Both windows are >= 1 and `closes` is never empty.
        let fma = trailing_mean(&closes, self.config.fma_window).unwrap_or(current_close);
        let sma = trailing_mean(&closes, self.config.sma_window).unwrap_or(current_close);
        Ok(Averages { fma, sma })
    }
}
