//! Tradeable instrument identity.
//!
//! Equality, ordering and hashing all go through the rendered string, so a
//! `Ticker("BTC/USDT")` and a `Pair { BTC, USDT }` are the same map key.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub enum Symbol {
    Pair { base: String, quote: String },
    Ticker(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid symbol: {0:?}")]
pub struct SymbolParseError(pub String);

impl Symbol {
    pub fn pair(base: &str, quote: &str) -> Self {
        Symbol::Pair {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
        }
    }

    pub fn ticker(code: &str) -> Self {
        Symbol::Ticker(code.to_uppercase())
    }

    /// Exchange-native spelling: pair halves concatenated, tickers as-is.
    pub fn exchange_code(&self) -> String {
        match self {
            Symbol::Pair { base, quote } => format!("{}{}", base, quote),
            Symbol::Ticker(code) => code.clone(),
        }
    }

    /// Rendered form safe for use in file names.
    pub fn file_stem(&self) -> String {
        self.to_string().replace('/', "_")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Pair { base, quote } => write!(f, "{}/{}", base, quote),
            Symbol::Ticker(code) => write!(f, "{}", code),
        }
    }
}

impl FromStr for Symbol {
    type Err = SymbolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SymbolParseError(s.to_string()));
        }
        match trimmed.split_once('/') {
            Some((base, quote)) => {
                let (base, quote) = (base.trim(), quote.trim());
                if base.is_empty() || quote.is_empty() || quote.contains('/') {
                    return Err(SymbolParseError(s.to_string()));
                }
                Ok(Symbol::pair(base, quote))
            }
            None => Ok(Symbol::ticker(trimmed)),
        }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

/// Parse a comma-separated symbol list, rejecting empty tokens and duplicates.
pub fn parse_symbols(input: &str) -> Result<Vec<Symbol>, SymbolParseError> {
    let mut symbols: Vec<Symbol> = Vec::new();
    for token in input.split(',') {
        let symbol: Symbol = token.parse()?;
        if symbols.contains(&symbol) {
            return Err(SymbolParseError(token.trim().to_string()));
        }
        symbols.push(symbol);
    }
    Ok(symbols)
}
