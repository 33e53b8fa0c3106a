//! Investable universes, their benchmark symbols, and the built-in ticker registry.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::QuantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Universe {
    Benchmark,
    Nasdaq100,
    Sp500,
    Ftse250,
}

/// Universes scored by the regime model, in scoring order.
pub const SCORED_UNIVERSES: [Universe; 3] =
    [Universe::Nasdaq100, Universe::Sp500, Universe::Ftse250];

impl Universe {
    pub fn name(&self) -> &'static str {
        match self {
            Universe::Benchmark => "BENCHMARK",
            Universe::Nasdaq100 => "NASDAQ100",
            Universe::Sp500 => "SP500",
            Universe::Ftse250 => "FTSE250",
        }
    }

    /// Designated benchmark symbol. `Benchmark` holds the defensive assets and has none.
    pub fn benchmark_symbol(&self) -> Option<&'static str> {
        match self {
            Universe::Nasdaq100 => Some("QQQ"),
            Universe::Sp500 => Some("SPY"),
            Universe::Ftse250 => Some("VMID"),
            Universe::Benchmark => None,
        }
    }
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Universe {
    type Err = QuantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BENCHMARK" => Ok(Universe::Benchmark),
            "NASDAQ100" => Ok(Universe::Nasdaq100),
            "SP500" => Ok(Universe::Sp500),
            "FTSE250" => Ok(Universe::Ftse250),
            _ => Err(QuantError::UnknownUniverse { name: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickerType {
    Etf,
    Equity,
}

impl TickerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickerType::Etf => "ETF",
            TickerType::Equity => "EQUITY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerInfo {
    pub symbol: &'static str,
    pub name: &'static str,
    pub asset_type: TickerType,
    pub universe: Universe,
    pub currency: &'static str,
}

const fn ticker(
    symbol: &'static str,
    name: &'static str,
    asset_type: TickerType,
    universe: Universe,
    currency: &'static str,
) -> TickerInfo {
    TickerInfo {
        symbol,
        name,
        asset_type,
        universe,
        currency,
    }
}

/// Benchmarks, defensive assets and a sample of constituents per universe.
pub const REGISTRY: &[TickerInfo] = &[
    ticker("QQQ", "Invesco QQQ Trust", TickerType::Etf, Universe::Nasdaq100, "USD"),
    ticker("SPY", "SPDR S&P 500 ETF", TickerType::Etf, Universe::Sp500, "USD"),
    ticker("VMID", "Vanguard FTSE 250 UCITS ETF", TickerType::Etf, Universe::Ftse250, "GBP"),
    ticker("GLD", "SPDR Gold Shares", TickerType::Etf, Universe::Benchmark, "USD"),
    ticker("IAU", "iShares Gold Trust", TickerType::Etf, Universe::Benchmark, "USD"),
    ticker(
        "BIL",
        "SPDR Bloomberg 1-3 Month T-Bill ETF",
        TickerType::Etf,
        Universe::Benchmark,
        "USD",
    ),
    ticker("AAPL", "Apple Inc.", TickerType::Equity, Universe::Nasdaq100, "USD"),
    ticker("MSFT", "Microsoft Corporation", TickerType::Equity, Universe::Nasdaq100, "USD"),
    ticker("AMZN", "Amazon.com Inc.", TickerType::Equity, Universe::Sp500, "USD"),
    ticker("GOOGL", "Alphabet Inc. Class A", TickerType::Equity, Universe::Sp500, "USD"),
    ticker("TSCO.L", "Tesco PLC", TickerType::Equity, Universe::Ftse250, "GBP"),
    ticker("BVIC.L", "Britvic PLC", TickerType::Equity, Universe::Ftse250, "GBP"),
];

pub fn registry_entry(symbol: &str) -> Option<&'static TickerInfo> {
    REGISTRY.iter().find(|t| t.symbol == symbol)
}

/// Registry constituents of `universe`, excluding ETFs, sorted by symbol.
pub fn registry_members(universe: Universe) -> Vec<String> {
    let mut members: Vec<String> = REGISTRY
        .iter()
        .filter(|t| t.universe == universe && t.asset_type == TickerType::Equity)
        .map(|t| t.symbol.to_string())
        .collect();
    members.sort();
    members
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ListError {
    #[error("empty token in list")]
    EmptyToken,

    #[error("duplicate entry: {0}")]
    Duplicate(String),
}

/// Split a comma-separated list, upper-casing entries and rejecting blanks and duplicates.
pub fn parse_list(input: &str) -> Result<Vec<String>, ListError> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(ListError::EmptyToken);
        }
        let item = trimmed.to_uppercase();
        if !seen.insert(item.clone()) {
            return Err(ListError::Duplicate(item));
        }
        items.push(item);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_universe_names() {
        assert_eq!("NASDAQ100".parse::<Universe>().unwrap(), Universe::Nasdaq100);
        assert_eq!("sp500".parse::<Universe>().unwrap(), Universe::Sp500);
        assert!(matches!(
            "DAX".parse::<Universe>(),
            Err(QuantError::UnknownUniverse { name }) if name == "DAX"
        ));
    }

    #[test]
    fn benchmark_table() {
        assert_eq!(Universe::Nasdaq100.benchmark_symbol(), Some("QQQ"));
        assert_eq!(Universe::Sp500.benchmark_symbol(), Some("SPY"));
        assert_eq!(Universe::Ftse250.benchmark_symbol(), Some("VMID"));
        assert_eq!(Universe::Benchmark.benchmark_symbol(), None);
    }

    #[test]
    fn registry_members_exclude_etfs() {
        assert_eq!(registry_members(Universe::Nasdaq100), vec!["AAPL", "MSFT"]);
        assert_eq!(registry_members(Universe::Ftse250), vec!["BVIC.L", "TSCO.L"]);
        assert!(registry_members(Universe::Benchmark).is_empty());
    }

    #[test]
    fn parse_list_basic() {
        let result = parse_list(" qqq, SPY ,gld").unwrap();
        assert_eq!(result, vec!["QQQ", "SPY", "GLD"]);
    }

    #[test]
    fn parse_list_empty_token() {
        assert!(matches!(parse_list("QQQ,,SPY"), Err(ListError::EmptyToken)));
    }

    #[test]
    fn parse_list_duplicate() {
        let result = parse_list("QQQ,SPY,qqq");
        assert!(matches!(result, Err(ListError::Duplicate(s)) if s == "QQQ"));
    }
}
