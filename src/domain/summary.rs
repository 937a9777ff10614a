//! Per-symbol trade counts over a finished run.

use crate::domain::market::Market;
use crate::domain::output::Operation;
use crate::domain::symbol::Symbol;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTrades {
    pub buys: usize,
    pub sells: usize,
    pub skips: usize,
    /// The last BUY/SELL seen was a BUY.
    pub holding_at_end: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeSummary {
    pub frames: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub per_symbol: BTreeMap<Symbol, SymbolTrades>,
}

impl TradeSummary {
    pub fn compute(market: &Market) -> Self {
        let mut per_symbol: BTreeMap<Symbol, SymbolTrades> = BTreeMap::new();
        for output in market.outputs() {
            for t in &output.transactions {
                let entry = per_symbol.entry(t.symbol.clone()).or_default();
                match t.operation {
                    Operation::Buy => {
                        entry.buys += 1;
                        entry.holding_at_end = true;
                    }
                    Operation::Sell => {
                        entry.sells += 1;
                        entry.holding_at_end = false;
                    }
                    Operation::Skip => entry.skips += 1,
                }
            }
        }

        let timestamps = market.timestamps();
        Self {
            frames: market.len(),
            first_timestamp: timestamps.first().copied(),
            last_timestamp: timestamps.last().copied(),
            per_symbol,
        }
    }

    pub fn total_transactions(&self) -> usize {
        self.per_symbol
            .values()
            .map(|t| t.buys + t.sells + t.skips)
            .sum()
    }
}

impl fmt::Display for TradeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Run Summary ===")?;
        writeln!(f, "Frames:        {}", self.frames)?;
        if let (Some(first), Some(last)) = (self.first_timestamp, self.last_timestamp) {
            writeln!(f, "Range:         {} .. {}", first, last)?;
        }
        writeln!(f, "Transactions:  {}", self.total_transactions())?;
        for (symbol, t) in &self.per_symbol {
            writeln!(
                f,
                "  {}:  {} buys, {} sells{}",
                symbol,
                t.buys,
                t.sells,
                if t.holding_at_end { ", holding" } else { "" }
            )?;
        }
        Ok(())
    }
}
