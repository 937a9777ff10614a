//! Market snapshots and ordered sequences of them.

use crate::domain::error::CandlebotError;
use crate::domain::ohlcv::Ohlcv;
use crate::domain::output::OutputFrame;
use crate::domain::symbol::Symbol;
use std::collections::BTreeMap;
use std::ops::Range;

/// Every symbol's candle at one point in time (unix seconds).
#[derive(Debug, Clone, PartialEq)]
pub struct MarketFrame {
    pub timestamp: i64,
    pub ohlcv: BTreeMap<Symbol, Ohlcv>,
}

impl MarketFrame {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            ohlcv: BTreeMap::new(),
        }
    }

    pub fn with(mut self, symbol: Symbol, candle: Ohlcv) -> Self {
        self.ohlcv.insert(symbol, candle);
        self
    }

    pub fn get(&self, symbol: &Symbol) -> Result<&Ohlcv, CandlebotError> {
        self.ohlcv
            .get(symbol)
            .ok_or_else(|| CandlebotError::MissingSymbol {
                symbol: symbol.to_string(),
                timestamp: self.timestamp,
            })
    }

    pub fn contains_all(&self, symbols: &[Symbol]) -> bool {
        symbols.iter().all(|s| self.ohlcv.contains_key(s))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.ohlcv.keys()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketEntry {
    pub frame: MarketFrame,
    pub output: Option<OutputFrame>,
}

/// Chronological, append-only sequence of frames.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Market {
    entries: Vec<MarketEntry>,
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: impl IntoIterator<Item = MarketFrame>) -> Self {
        Self {
            entries: frames
                .into_iter()
                .map(|frame| MarketEntry {
                    frame,
                    output: None,
                })
                .collect(),
        }
    }

    pub fn push(&mut self, frame: MarketFrame) {
        self.entries.push(MarketEntry {
            frame,
            output: None,
        });
    }

    pub fn push_with_output(&mut self, frame: MarketFrame, output: OutputFrame) {
        self.entries.push(MarketEntry {
            frame,
            output: Some(output),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&MarketFrame> {
        self.entries.get(index).map(|e| &e.frame)
    }

    pub fn frames(&self) -> impl Iterator<Item = &MarketFrame> {
        self.entries.iter().map(|e| &e.frame)
    }

    pub fn entries(&self) -> &[MarketEntry] {
        &self.entries
    }

    pub fn into_frames(self) -> Vec<MarketFrame> {
        self.entries.into_iter().map(|e| e.frame).collect()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &OutputFrame> {
        self.entries.iter().filter_map(|e| e.output.as_ref())
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.frames().map(|f| f.timestamp).collect()
    }

    /// Close prices for `symbol`, oldest first.
    pub fn closes(&self, symbol: &Symbol) -> Result<Vec<f64>, CandlebotError> {
        self.frames()
            .map(|f| f.get(symbol).map(|c| c.close))
            .collect()
    }

    /// The last `n` entries (all of them if fewer exist).
    pub fn tail(&self, n: usize) -> Market {
        let start = self.entries.len().saturating_sub(n);
        Market {
            entries: self.entries[start..].to_vec(),
        }
    }

    /// Entries in `range`, clamped to the available length.
    pub fn slice(&self, range: Range<usize>) -> Market {
        let end = range.end.min(self.entries.len());
        let start = range.start.min(end);
        Market {
            entries: self.entries[start..end].to_vec(),
        }
    }
}

impl FromIterator<MarketFrame> for Market {
    fn from_iter<I: IntoIterator<Item = MarketFrame>>(iter: I) -> Self {
        Market::from_frames(iter)
    }
}
