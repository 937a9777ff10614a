//! Per-tick strategy output: transactions, logs and plot samples.

use crate::domain::symbol::Symbol;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Buy,
    Sell,
    Skip,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Buy => "BUY",
            Operation::Sell => "SELL",
            Operation::Skip => "SKIP",
        };
        f.write_str(s)
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Operation::Buy),
            "SELL" => Ok(Operation::Sell),
            "SKIP" => Ok(Operation::Skip),
            other => Err(format!("unknown operation {other:?}")),
        }
    }
}

/// A simulated trade decision. Never mutated after emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub timestamp: i64,
    pub operation: Operation,
    pub symbol: Symbol,
    /// An empty note is stored as `None`; datasets cannot tell the two apart.
    pub notes: Option<String>,
}

impl Transaction {
    pub fn new(timestamp: i64, operation: Operation, symbol: Symbol, notes: Option<String>) -> Self {
        Self {
            timestamp,
            operation,
            symbol,
            notes: notes.filter(|n| !n.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Text,
    /// `value` holds a JSON document.
    Structured,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::Text => f.write_str("TEXT"),
            LogKind::Structured => f.write_str("STRUCTURED"),
        }
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(LogKind::Text),
            "STRUCTURED" => Ok(LogKind::Structured),
            other => Err(format!("unknown log kind {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Log {
    pub timestamp: i64,
    pub kind: LogKind,
    pub value: String,
    pub symbol: Option<Symbol>,
}

impl Log {
    pub fn text(timestamp: i64, value: impl Into<String>, symbol: Option<Symbol>) -> Self {
        Self {
            timestamp,
            kind: LogKind::Text,
            value: value.into(),
            symbol,
        }
    }

    pub fn structured(
        timestamp: i64,
        value: &serde_json::Value,
        symbol: Option<Symbol>,
    ) -> Self {
        Self {
            timestamp,
            kind: LogKind::Structured,
            value: value.to_string(),
            symbol,
        }
    }

    /// Parsed JSON payload for structured logs.
    pub fn json(&self) -> Option<serde_json::Value> {
        match self.kind {
            LogKind::Structured => serde_json::from_str(&self.value).ok(),
            LogKind::Text => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlotColor {
    Blue,
    Purple,
    Green,
    Red,
    Grey,
}

impl fmt::Display for PlotColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlotColor::Blue => "blue",
            PlotColor::Purple => "purple",
            PlotColor::Green => "green",
            PlotColor::Red => "red",
            PlotColor::Grey => "grey",
        };
        f.write_str(s)
    }
}

impl FromStr for PlotColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blue" => Ok(PlotColor::Blue),
            "purple" => Ok(PlotColor::Purple),
            "green" => Ok(PlotColor::Green),
            "red" => Ok(PlotColor::Red),
            "grey" => Ok(PlotColor::Grey),
            other => Err(format!("unknown color {other:?}")),
        }
    }
}

/// One sample of a named function, e.g. `"BTC/USDT FMA"`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionPlot {
    pub timestamp: i64,
    pub label: String,
    pub value: f64,
    pub color: PlotColor,
    pub symbol: Option<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputFrame {
    pub timestamp: i64,
    pub logs: Vec<Log>,
    pub transactions: Vec<Transaction>,
    pub function_plots: Vec<FunctionPlot>,
}

impl OutputFrame {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.transactions.is_empty() && self.function_plots.is_empty()
    }
}
